//! The entity tree: the intermediate representation every renderer consumes.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::{ArrayKey, Scalar, Trace};

/// What an entity describes. Decides which sections a renderer shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Object,
    Array,
    Resource,
    Exception,
    Class,
    Interface,
    Trait,
    Const,
    Stack,
    Binary,
    Reference,
}

impl EntityKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::Resource => "resource",
            Self::Exception => "exception",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Trait => "trait",
            Self::Const => "const",
            Self::Stack => "stack",
            Self::Binary => "binary",
            Self::Reference => "reference",
        }
    }

    /// Kinds that have identity and may be referenced again later in a pass.
    pub const fn is_composite(self) -> bool {
        matches!(
            self,
            Self::Object | Self::Array | Self::Resource | Self::Exception
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identifier used to cross-reference repeated values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(kind: EntityKind, seq: u64) -> Self {
        Self(format!("{kind}-{seq}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declared visibility of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

impl Visibility {
    /// Compact marker used by text renderers: `*` protected, `!` private.
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Public => "",
            Self::Protected => "*",
            Self::Private => "!",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Protected => "protected",
            Self::Private => "private",
        }
    }
}

/// A slot value: either a scalar leaf or a nested entity.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EntityValue {
    Scalar(Scalar),
    Entity(Box<Entity>),
}

impl EntityValue {
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(scalar) => Some(scalar),
            Self::Entity(_) => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Self::Scalar(_) => None,
            Self::Entity(entity) => Some(entity),
        }
    }
}

impl From<Scalar> for EntityValue {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<Entity> for EntityValue {
    fn from(value: Entity) -> Self {
        Self::Entity(Box::new(value))
    }
}

macro_rules! scalar_entity_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for EntityValue {
                fn from(value: $ty) -> Self {
                    Self::Scalar(Scalar::from(value))
                }
            }
        )*
    };
}

scalar_entity_value!(bool, i32, i64, u32, u64, usize, f64, &str, String);

/// A named, visibility-tagged slot of an object.
#[derive(Debug, Clone, Serialize)]
pub struct Property {
    pub name: String,
    pub visibility: Visibility,
    pub value: EntityValue,
}

/// Display node for one inspected value.
///
/// Entities are created by the [`Inspector`](crate::Inspector) during a single
/// pass, filled in place and dropped after rendering.
#[derive(Debug, Clone, Serialize)]
pub struct Entity {
    kind: EntityKind,
    id: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    object_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    class_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parent_classes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    interfaces: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    traits: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    definition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    length: Option<usize>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    meta: BTreeMap<String, EntityValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    values: Vec<(Option<ArrayKey>, EntityValue)>,
    show_value_keys: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    properties: Vec<Property>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack_trace: Option<Trace>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<EntityId>,
}

impl Entity {
    pub fn new(kind: EntityKind, id: EntityId) -> Self {
        Self {
            kind,
            id,
            name: None,
            open: false,
            object_id: None,
            hash: None,
            class_name: None,
            parent_classes: Vec::new(),
            interfaces: Vec::new(),
            traits: Vec::new(),
            file: None,
            start_line: None,
            end_line: None,
            text: None,
            definition: None,
            length: None,
            meta: BTreeMap::new(),
            values: Vec::new(),
            show_value_keys: true,
            properties: Vec::new(),
            stack_trace: None,
            target: None,
        }
    }

    /// A pointer back at an entity produced earlier in the same pass.
    ///
    /// Shares the original's id so renderers can link to it.
    pub fn reference(target: &EntityId, class_name: Option<String>) -> Self {
        let mut entity = Self::new(EntityKind::Reference, target.clone());
        entity.class_name = class_name;
        entity.target = Some(target.clone());
        entity
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn target(&self) -> Option<&EntityId> {
        self.target.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn set_open(&mut self, open: bool) -> &mut Self {
        self.open = open;
        self
    }

    pub fn object_id(&self) -> Option<u64> {
        self.object_id
    }

    pub fn set_object_id(&mut self, id: u64) -> &mut Self {
        self.object_id = Some(id);
        self
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn set_hash(&mut self, hash: impl Into<String>) -> &mut Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    pub fn set_class_name(&mut self, class_name: impl Into<String>) -> &mut Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn parent_classes(&self) -> &[String] {
        &self.parent_classes
    }

    pub fn set_parent_classes(&mut self, parents: Vec<String>) -> &mut Self {
        self.parent_classes = parents;
        self
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn set_interfaces(&mut self, interfaces: Vec<String>) -> &mut Self {
        self.interfaces = interfaces;
        self
    }

    pub fn traits(&self) -> &[String] {
        &self.traits
    }

    pub fn set_traits(&mut self, traits: Vec<String>) -> &mut Self {
        self.traits = traits;
        self
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn start_line(&self) -> Option<u32> {
        self.start_line
    }

    pub fn end_line(&self) -> Option<u32> {
        self.end_line
    }

    pub fn set_source(
        &mut self,
        file: impl Into<String>,
        start_line: Option<u32>,
        end_line: Option<u32>,
    ) -> &mut Self {
        self.file = Some(file.into());
        self.start_line = start_line;
        self.end_line = end_line;
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn set_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(text.into());
        self
    }

    pub fn definition(&self) -> Option<&str> {
        self.definition.as_deref()
    }

    pub fn set_definition(&mut self, definition: impl Into<String>) -> &mut Self {
        self.definition = Some(definition.into());
        self
    }

    pub fn length(&self) -> Option<usize> {
        self.length
    }

    pub fn set_length(&mut self, length: usize) -> &mut Self {
        self.length = Some(length);
        self
    }

    pub fn meta(&self) -> &BTreeMap<String, EntityValue> {
        &self.meta
    }

    pub fn get_meta(&self, key: &str) -> Option<&EntityValue> {
        self.meta.get(key)
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<EntityValue>) -> &mut Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn values(&self) -> &[(Option<ArrayKey>, EntityValue)] {
        &self.values
    }

    /// Append a positional value.
    pub fn push_value(&mut self, value: impl Into<EntityValue>) -> &mut Self {
        self.values.push((None, value.into()));
        self
    }

    /// Append a keyed value without looking for an existing entry. For
    /// sources whose keys are already unique.
    pub fn append_value(&mut self, key: ArrayKey, value: impl Into<EntityValue>) -> &mut Self {
        self.values.push((Some(key), value.into()));
        self
    }

    /// Set a keyed value, replacing an existing entry with the same key.
    pub fn set_value(&mut self, key: impl Into<ArrayKey>, value: impl Into<EntityValue>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self
            .values
            .iter_mut()
            .find(|(k, _)| k.as_ref() == Some(&key))
        {
            slot.1 = value;
        } else {
            self.values.push((Some(key), value));
        }
        self
    }

    pub fn show_value_keys(&self) -> bool {
        self.show_value_keys
    }

    pub fn set_show_value_keys(&mut self, show: bool) -> &mut Self {
        self.show_value_keys = show;
        self
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    /// Set a property, replacing one with the same name in place.
    pub fn set_property(
        &mut self,
        name: impl Into<String>,
        visibility: Visibility,
        value: impl Into<EntityValue>,
    ) -> &mut Self {
        let property = Property {
            name: name.into(),
            visibility,
            value: value.into(),
        };
        if let Some(slot) = self.properties.iter_mut().find(|p| p.name == property.name) {
            *slot = property;
        } else {
            self.properties.push(property);
        }
        self
    }

    pub fn stack_trace(&self) -> Option<&Trace> {
        self.stack_trace.as_ref()
    }

    pub fn set_stack_trace(&mut self, trace: Trace) -> &mut Self {
        self.stack_trace = Some(trace);
        self
    }

    /// Depth-first walk over this entity and every nested entity.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Entity)) {
        visit(self);
        let nested = self
            .meta
            .values()
            .chain(self.values.iter().map(|(_, v)| v))
            .chain(self.properties.iter().map(|p| &p.value));
        for value in nested {
            if let EntityValue::Entity(entity) = value {
                entity.walk(visit);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(kind: EntityKind) -> Entity {
        Entity::new(kind, EntityId::new(kind, 1))
    }

    #[test]
    fn test_id_format() {
        assert_eq!(EntityId::new(EntityKind::Object, 3).as_str(), "object-3");
    }

    #[test]
    fn test_set_property_replaces_in_place() {
        let mut e = entity(EntityKind::Object);
        e.set_property("a", Visibility::Public, 1);
        e.set_property("b", Visibility::Private, 2);
        e.set_property("a", Visibility::Protected, "x");

        assert_eq!(e.properties().len(), 2);
        let a = e.property("a").map(|p| (p.visibility, p.value.as_scalar().cloned()));
        assert_eq!(
            a,
            Some((Visibility::Protected, Some(Scalar::Str("x".into()))))
        );
        assert_eq!(e.properties()[0].name, "a");
    }

    #[test]
    fn test_set_value_keyed_and_positional() {
        let mut e = entity(EntityKind::Array);
        e.push_value(1);
        e.set_value("k", true);
        e.set_value("k", false);

        assert_eq!(e.values().len(), 2);
        assert!(e.values()[0].0.is_none());
        assert!(matches!(
            e.values()[1].1.as_scalar(),
            Some(Scalar::Bool(false))
        ));
    }

    #[test]
    fn test_reference_shares_target_id() {
        let id = EntityId::new(EntityKind::Array, 7);
        let reference = Entity::reference(&id, None);
        assert_eq!(reference.kind(), EntityKind::Reference);
        assert_eq!(reference.id(), &id);
        assert_eq!(reference.target(), Some(&id));
    }

    #[test]
    fn test_walk_visits_nested() {
        let mut child = entity(EntityKind::Array);
        child.push_value(1);
        let mut parent = entity(EntityKind::Object);
        parent.set_property("child", Visibility::Public, child);
        parent.set_meta("meta", entity(EntityKind::Binary));

        let mut kinds = Vec::new();
        parent.walk(&mut |e| kinds.push(e.kind()));
        assert_eq!(
            kinds,
            vec![EntityKind::Object, EntityKind::Binary, EntityKind::Array]
        );
    }
}
