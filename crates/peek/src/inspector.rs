//! Converts [`Value`]s into [`Entity`] trees.
//!
//! One [`Inspector`] covers one pass. Composite values are tracked by
//! allocation address: the first occurrence becomes a full entity and every
//! later occurrence, including a value reached from inside itself, becomes a
//! [`EntityKind::Reference`] sharing the original's id.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::{
    ArrayRef, ClassInfo, Entity, EntityId, EntityKind, EntityValue, Field, ObjectRef, Registry,
    ResourceRef, Scalar, Throwable, Trace, TypeKind, Value,
};

struct Seen {
    id: EntityId,
    class_name: Option<String>,
    // Held so the address cannot be reused by a new allocation mid-pass.
    _pin: Value,
}

/// A single inspection pass.
pub struct Inspector<'ctx> {
    registry: &'ctx Registry,
    seen: FxHashMap<usize, Seen>,
    classes: FxHashMap<String, EntityId>,
    next_id: u64,
    next_object: u64,
    depth: usize,
}

impl<'ctx> Inspector<'ctx> {
    pub fn new(registry: &'ctx Registry) -> Self {
        Self {
            registry,
            seen: FxHashMap::default(),
            classes: FxHashMap::default(),
            next_id: 0,
            next_object: 0,
            depth: 0,
        }
    }

    pub fn registry(&self) -> &'ctx Registry {
        self.registry
    }

    /// Nesting depth of the entity currently being filled.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Inspect a value. Scalars pass through, everything else becomes an entity.
    pub fn inspect(&mut self, value: &Value) -> EntityValue {
        match value {
            Value::Null => Scalar::Null.into(),
            Value::Bool(b) => Scalar::Bool(*b).into(),
            Value::Int(n) => Scalar::Int(*n).into(),
            Value::Float(n) => Scalar::Float(*n).into(),
            Value::Str(s) => self.inspect_string(s),
            Value::Binary(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => self.inspect_string(text),
                Err(_) => self.inspect_binary(bytes).into(),
            },
            Value::Array(array) => self.inspect_array(array),
            Value::Object(object) => self.inspect_object(object),
            Value::Resource(resource) => self.inspect_resource(resource),
            Value::Const { name, value } => {
                let mut entity = self.new_entity(EntityKind::Const);
                entity
                    .set_name(name)
                    .set_show_value_keys(false)
                    .push_value(value.clone());
                entity.into()
            }
        }
    }

    /// Inspect a value under a label. Named scalars become const entities so
    /// the label has somewhere to live.
    pub fn inspect_named(&mut self, name: &str, value: &Value) -> Entity {
        match self.inspect(value) {
            EntityValue::Entity(mut entity) => {
                if entity.name().is_none() {
                    entity.set_name(name);
                }
                *entity
            }
            EntityValue::Scalar(scalar) => {
                let mut entity = self.new_entity(EntityKind::Const);
                entity
                    .set_name(name)
                    .set_show_value_keys(false)
                    .push_value(scalar);
                entity
            }
        }
    }

    /// Strings naming a registered type become a description of that type.
    pub fn inspect_string(&mut self, text: &str) -> EntityValue {
        match self.registry.class(text) {
            Some(info) => self.inspect_class(info).into(),
            None => Scalar::Str(text.to_owned()).into(),
        }
    }

    pub fn inspect_binary(&mut self, bytes: &[u8]) -> Entity {
        let hex: Vec<String> = bytes.iter().map(|b| format!("{b:02x}")).collect();
        let mut entity = self.new_entity(EntityKind::Binary);
        entity.set_length(bytes.len()).set_text(hex.join(" "));
        entity
    }

    pub fn inspect_class(&mut self, info: &ClassInfo) -> Entity {
        if let Some(id) = self.classes.get(&info.name) {
            return Entity::reference(id, Some(info.name.clone()));
        }

        let kind = match info.kind {
            TypeKind::Class => EntityKind::Class,
            TypeKind::Interface => EntityKind::Interface,
            TypeKind::Trait => EntityKind::Trait,
        };
        let mut entity = self.new_entity(kind);
        self.classes.insert(info.name.clone(), entity.id().clone());

        entity
            .set_name(&info.name)
            .set_class_name(&info.name)
            .set_parent_classes(info.parents.clone())
            .set_interfaces(info.interfaces.clone())
            .set_traits(info.traits.clone())
            .set_definition(info.definition());
        if let Some(file) = &info.file {
            entity.set_source(file, info.start_line, info.end_line);
        }
        entity
    }

    /// A stack entity for a trace; renderers draw its frames.
    pub fn inspect_trace(&mut self, trace: &Trace) -> Entity {
        let mut entity = self.new_entity(EntityKind::Stack);
        entity
            .set_open(true)
            .set_length(trace.len())
            .set_stack_trace(trace.clone());
        entity
    }

    fn inspect_array(&mut self, array: &ArrayRef) -> EntityValue {
        let addr = Rc::as_ptr(array).cast::<()>().addr();
        if let Some(reference) = self.reference_to(addr) {
            return reference.into();
        }

        let mut entity = self.new_entity(EntityKind::Array);
        self.remember(addr, &entity, Value::Array(Rc::clone(array)));

        let Ok(items) = array.try_borrow() else {
            entity.set_text("<borrowed>");
            return entity.into();
        };

        entity.set_length(items.len());
        self.depth += 1;
        for (key, value) in items.iter() {
            let child = self.inspect(value);
            entity.append_value(key.clone(), child);
        }
        self.depth -= 1;
        entity.into()
    }

    fn inspect_object(&mut self, object: &ObjectRef) -> EntityValue {
        let addr = Rc::as_ptr(object).cast::<()>().addr();
        if let Some(reference) = self.reference_to(addr) {
            return reference.into();
        }

        let class_name = object.class_name();
        let throwable = object.as_throwable();
        let kind = if throwable.is_some() {
            EntityKind::Exception
        } else {
            EntityKind::Object
        };

        let mut entity = self.new_entity(kind);
        self.next_object += 1;
        entity
            .set_class_name(&*class_name)
            .set_object_id(self.next_object)
            .set_hash(format!("{addr:#x}"))
            .set_parent_classes(object.parent_classes())
            .set_interfaces(object.interfaces());
        if let Some(info) = self.registry.class(&class_name) {
            entity.set_traits(info.traits.clone());
            if let Some(file) = &info.file {
                entity.set_source(file, info.start_line, info.end_line);
            }
        }
        self.remember(addr, &entity, Value::Object(Rc::clone(object)));

        self.depth += 1;
        if let Some(throwable) = throwable {
            self.fill_exception(throwable, &mut entity);
        }

        let registry = self.registry;
        if let Some(custom) = registry.object_inspector(&class_name) {
            custom(&**object, &mut entity, self);
        } else if object.inspect(&mut entity, self).is_continue() {
            if let Some(fields) = object.debug_info() {
                self.apply_fields(&mut entity, fields, true);
            }
            self.apply_fields(&mut entity, object.fields(), false);
        }
        self.depth -= 1;

        entity.into()
    }

    fn fill_exception(&mut self, throwable: &dyn Throwable, entity: &mut Entity) {
        entity.set_text(throwable.message()).set_open(true);
        if let Some(code) = throwable.code() {
            entity.set_meta("code", code);
        }
        if let Some(location) = throwable.location() {
            entity
                .set_meta("file", location.file.as_str())
                .set_meta("line", location.line)
                .set_source(location.file, Some(location.line), None);
        }
        if let Some(previous) = throwable.previous() {
            let previous = self.inspect(&previous);
            entity.set_meta("previous", previous);
        }
        if let Some(trace) = throwable.trace() {
            entity.set_stack_trace(trace.clone());
        }
    }

    fn apply_fields(&mut self, entity: &mut Entity, fields: Vec<Field>, overwrite: bool) {
        for field in fields {
            if !overwrite && entity.has_property(&field.name) {
                continue;
            }
            let value = self.inspect(&field.value);
            entity.set_property(field.name, field.visibility, value);
        }
    }

    fn inspect_resource(&mut self, resource: &ResourceRef) -> EntityValue {
        let addr = Rc::as_ptr(resource).cast::<()>().addr();
        if let Some(reference) = self.reference_to(addr) {
            return reference.into();
        }

        let mut entity = self.new_entity(EntityKind::Resource);
        entity
            .set_class_name(resource.kind())
            .set_object_id(resource.id());
        self.remember(addr, &entity, Value::Resource(Rc::clone(resource)));

        let kind = resource.normalized_kind();
        if let Some(extract) = self.registry.resource_inspector(&kind) {
            let mut scratch = entity.clone();
            match extract(resource, &mut scratch) {
                Ok(()) => entity = scratch,
                Err(err) => tracing::debug!(%kind, error = %err, "handle metadata unavailable"),
            }
        }
        entity.into()
    }

    fn reference_to(&self, addr: usize) -> Option<Entity> {
        self.seen
            .get(&addr)
            .map(|seen| Entity::reference(&seen.id, seen.class_name.clone()))
    }

    fn remember(&mut self, addr: usize, entity: &Entity, pin: Value) {
        self.seen.insert(
            addr,
            Seen {
                id: entity.id().clone(),
                class_name: entity.class_name().map(str::to_owned),
                _pin: pin,
            },
        );
    }

    /// A fresh entity with the next id of the pass.
    ///
    /// Top-level entities, exceptions and stacks start open.
    pub fn new_entity(&mut self, kind: EntityKind) -> Entity {
        self.next_id += 1;
        let mut entity = Entity::new(kind, EntityId::new(kind, self.next_id));
        entity.set_open(
            self.depth == 0 || matches!(kind, EntityKind::Exception | EntityKind::Stack),
        );
        entity
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::borrow::Cow;
    use std::cell::RefCell;
    use std::ops::ControlFlow;

    use super::*;
    use crate::{ArrayKey, ErrorObject, Inspectable, InspectError, ToValue, Visibility};

    struct Node {
        name: String,
        next: RefCell<Option<Rc<Node>>>,
    }

    impl Inspectable for Node {
        fn class_name(&self) -> Cow<'static, str> {
            Cow::Borrowed("app::Node")
        }

        fn fields(&self) -> Vec<Field> {
            vec![
                Field::public("name", &self.name),
                Field::private("next", &self.next),
            ]
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Curated;

    impl Inspectable for Curated {
        fn class_name(&self) -> Cow<'static, str> {
            Cow::Borrowed("app::Curated")
        }

        fn debug_info(&self) -> Option<Vec<Field>> {
            Some(vec![Field::public("shown", &1)])
        }

        fn fields(&self) -> Vec<Field> {
            vec![Field::private("shown", &2), Field::private("extra", &3)]
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct SelfDescribing;

    impl Inspectable for SelfDescribing {
        fn fields(&self) -> Vec<Field> {
            vec![Field::public("never", &true)]
        }

        fn inspect(&self, entity: &mut Entity, _: &mut Inspector<'_>) -> ControlFlow<()> {
            entity.set_text("described itself");
            ControlFlow::Break(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn entity(value: EntityValue) -> Entity {
        match value {
            EntityValue::Entity(entity) => *entity,
            EntityValue::Scalar(scalar) => panic!("expected entity, got {scalar:?}"),
        }
    }

    fn count_leaves(entity: &Entity) -> usize {
        let mut leaves = 0;
        entity.walk(&mut |e| {
            leaves += e
                .values()
                .iter()
                .filter(|(_, v)| v.as_scalar().is_some())
                .count();
            leaves += e
                .properties()
                .iter()
                .filter(|p| p.value.as_scalar().is_some())
                .count();
        });
        leaves
    }

    #[test]
    fn test_scalars_pass_through() {
        let registry = Registry::new();
        let mut inspector = Inspector::new(&registry);
        for (value, expected) in [
            (Value::Null, Scalar::Null),
            (Value::Bool(true), Scalar::Bool(true)),
            (Value::Int(0), Scalar::Int(0)),
            (Value::Float(0.0), Scalar::Float(0.0)),
            (Value::from("abc"), Scalar::Str("abc".into())),
        ] {
            assert_eq!(inspector.inspect(&value).as_scalar(), Some(&expected));
        }
    }

    #[test]
    fn test_self_referential_array_terminates() {
        let registry = Registry::new();
        let root = Value::array();
        if let Some(array) = root.as_array() {
            array.borrow_mut().push(Value::Int(1));
            array.borrow_mut().push(root.clone());
        }

        let e = entity(Inspector::new(&registry).inspect(&root));
        let inner = e.values()[1].1.as_entity().unwrap();
        assert_eq!(inner.kind(), EntityKind::Reference);
        assert_eq!(inner.target(), Some(e.id()));

        // Break the cycle so the test does not leak.
        if let Some(array) = root.as_array() {
            *array.borrow_mut() = crate::Array::new();
        }
    }

    #[test]
    fn test_self_referential_object_terminates() {
        let registry = Registry::new();
        let node = Rc::new(Node {
            name: "a".into(),
            next: RefCell::new(None),
        });
        *node.next.borrow_mut() = Some(Rc::clone(&node));

        let e = entity(Inspector::new(&registry).inspect(&node.to_value()));
        assert_eq!(e.class_name(), Some("app::Node"));
        let next = e.property("next").and_then(|p| p.value.as_entity()).unwrap();
        assert_eq!(next.kind(), EntityKind::Reference);
        assert_eq!(next.target(), Some(e.id()));
        assert_eq!(next.class_name(), Some("app::Node"));

        node.next.borrow_mut().take();
    }

    #[test]
    fn test_acyclic_leaves_visited_once() {
        let registry = Registry::new();
        let value = Value::list([
            Value::Int(1),
            Value::list([Value::Int(2), Value::Int(3)]),
            Value::assoc([("a", Value::Int(4)), ("b", Value::list([Value::Int(5)]))]),
        ]);

        let e = entity(Inspector::new(&registry).inspect(&value));
        assert_eq!(count_leaves(&e), 5);

        let mut ids = Vec::new();
        e.walk(&mut |e| ids.push(e.id().clone()));
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn test_large_list_inspects_in_linear_time() {
        let registry = Registry::new();
        let start = std::time::Instant::now();
        let value = Value::list((0..100_000).map(Value::Int));

        let e = entity(Inspector::new(&registry).inspect(&value));
        assert_eq!(e.length(), Some(100_000));
        assert_eq!(e.values().len(), 100_000);
        assert_eq!(e.values()[99_999].0, Some(ArrayKey::Int(99_999)));
        assert!(start.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_shared_array_becomes_reference() {
        let registry = Registry::new();
        let shared = Value::list([Value::Int(1)]);
        let value = Value::list([shared.clone(), shared]);

        let e = entity(Inspector::new(&registry).inspect(&value));
        let first = e.values()[0].1.as_entity().unwrap();
        let second = e.values()[1].1.as_entity().unwrap();
        assert_eq!(first.kind(), EntityKind::Array);
        assert_eq!(second.kind(), EntityKind::Reference);
        assert_eq!(second.id(), first.id());
    }

    #[test]
    fn test_custom_inspector_wins() {
        let mut registry = Registry::new();
        registry.register_object_inspector("app::Curated", |_, entity, _| {
            entity.set_text("custom");
        });

        let e = entity(Inspector::new(&registry).inspect(&Value::object(Curated)));
        assert_eq!(e.text(), Some("custom"));
        assert!(e.properties().is_empty());
    }

    #[test]
    fn test_self_describing_skips_fields() {
        let registry = Registry::new();
        let e = entity(Inspector::new(&registry).inspect(&Value::object(SelfDescribing)));
        assert_eq!(e.text(), Some("described itself"));
        assert!(!e.has_property("never"));
    }

    #[test]
    fn test_debug_info_then_fields_fill_gaps() {
        let registry = Registry::new();
        let e = entity(Inspector::new(&registry).inspect(&Value::object(Curated)));

        let shown = e.property("shown").unwrap();
        assert_eq!(shown.visibility, Visibility::Public);
        assert_eq!(shown.value.as_scalar(), Some(&Scalar::Int(1)));
        assert_eq!(
            e.property("extra").map(|p| p.visibility),
            Some(Visibility::Private)
        );
    }

    #[test]
    fn test_registered_type_name_string() {
        let mut registry = Registry::new();
        registry.register_class(ClassInfo::interface("app::Named"));
        let mut inspector = Inspector::new(&registry);

        let first = entity(inspector.inspect(&Value::from("app::Named")));
        assert_eq!(first.kind(), EntityKind::Interface);
        assert_eq!(first.definition(), Some("trait app::Named;"));

        let again = entity(inspector.inspect(&Value::from("app::Named")));
        assert_eq!(again.kind(), EntityKind::Reference);
        assert_eq!(again.target(), Some(first.id()));

        assert!(inspector.inspect(&Value::from("app::Other")).as_scalar().is_some());
    }

    #[test]
    fn test_binary_sniffing() {
        let registry = Registry::new();
        let mut inspector = Inspector::new(&registry);

        let text = inspector.inspect(&Value::Binary(b"hi".to_vec()));
        assert_eq!(text.as_scalar(), Some(&Scalar::Str("hi".into())));

        let bin = entity(inspector.inspect(&Value::Binary(vec![0xde, 0xad, 0xff])));
        assert_eq!(bin.kind(), EntityKind::Binary);
        assert_eq!(bin.text(), Some("de ad ff"));
        assert_eq!(bin.length(), Some(3));
    }

    #[test]
    fn test_failing_extractor_leaves_bare_entity() {
        let mut registry = Registry::new();
        registry.register_resource_inspector("gd", |_, entity| {
            entity.set_meta("width", 10);
            Err(InspectError::HandleMismatch {
                kind: "gd",
                expected: "Image",
            })
        });

        let e = entity(Inspector::new(&registry).inspect(&Value::resource("GD", ())));
        assert_eq!(e.kind(), EntityKind::Resource);
        assert_eq!(e.class_name(), Some("GD"));
        assert!(e.meta().is_empty());
    }

    #[test]
    fn test_unknown_resource_is_bare() {
        let registry = Registry::with_defaults();
        let e = entity(Inspector::new(&registry).inspect(&Value::resource("curl", 5_u32)));
        assert_eq!(e.kind(), EntityKind::Resource);
        assert!(e.meta().is_empty());
    }

    #[test]
    fn test_error_chain() {
        let registry = Registry::new();
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.txt");
        let object = ErrorObject::new("app::LoadError", "could not load");
        let value = Value::object(object);

        let e = entity(Inspector::new(&registry).inspect(&value));
        assert_eq!(e.kind(), EntityKind::Exception);
        assert_eq!(e.text(), Some("could not load"));
        assert!(e.is_open());

        let e = entity(Inspector::new(&registry).inspect(&Value::error(&io)));
        assert_eq!(e.text(), Some("missing.txt"));
    }

    #[test]
    fn test_nested_entities_start_closed() {
        let registry = Registry::new();
        let value = Value::list([Value::list([Value::Int(1)])]);
        let e = entity(Inspector::new(&registry).inspect(&value));
        assert!(e.is_open());
        assert!(!e.values()[0].1.as_entity().unwrap().is_open());
    }

    #[test]
    fn test_named_scalar() {
        let registry = Registry::new();
        let e = Inspector::new(&registry).inspect_named("count", &Value::Int(3));
        assert_eq!(e.kind(), EntityKind::Const);
        assert_eq!(e.name(), Some("count"));
    }
}
