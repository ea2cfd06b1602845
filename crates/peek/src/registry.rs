//! Type descriptions and custom inspectors, keyed by name.
//!
//! The registry is built once at startup and then shared read-only (usually
//! behind an `Arc`), so the inspector never relies on ambient global state.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::value::normalize_kind;
use crate::{Describe, Entity, InspectError, Inspectable, Inspector, Resource, Visibility};

/// Flavor of a described type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Class,
    Interface,
    Trait,
}

impl TypeKind {
    /// Rust keyword used when rendering a definition.
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Class => "struct",
            Self::Interface => "trait",
            Self::Trait => "trait",
        }
    }
}

/// Static description of a type: hierarchy, fields and source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassInfo {
    pub name: String,
    pub kind: TypeKind,
    pub parents: Vec<String>,
    pub interfaces: Vec<String>,
    pub traits: Vec<String>,
    pub fields: Vec<(String, Visibility)>,
    pub file: Option<String>,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
}

impl ClassInfo {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parents: Vec::new(),
            interfaces: Vec::new(),
            traits: Vec::new(),
            fields: Vec::new(),
            file: None,
            start_line: None,
            end_line: None,
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parents.push(parent.into());
        self
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn with_trait(mut self, name: impl Into<String>) -> Self {
        self.traits.push(name.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, visibility: Visibility) -> Self {
        self.fields.push((name.into(), visibility));
        self
    }

    pub fn defined_at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.start_line = Some(line);
        self
    }

    pub fn ending_at(mut self, line: u32) -> Self {
        self.end_line = Some(line);
        self
    }

    /// Source-like rendering of the type, e.g.
    ///
    /// ```text
    /// struct app::User: Model + Serialize {
    ///     pub name,
    ///     pub(crate) email,
    /// }
    /// ```
    pub fn definition(&self) -> String {
        let mut out = format!("{} {}", self.kind.keyword(), self.name);

        let supers: Vec<&str> = self
            .parents
            .iter()
            .chain(&self.interfaces)
            .map(String::as_str)
            .collect();
        if !supers.is_empty() {
            out.push_str(": ");
            out.push_str(&supers.join(" + "));
        }

        if self.fields.is_empty() {
            out.push(';');
            return out;
        }

        out.push_str(" {\n");
        for (name, visibility) in &self.fields {
            let prefix = match visibility {
                Visibility::Public => "pub ",
                Visibility::Protected => "pub(crate) ",
                Visibility::Private => "",
            };
            out.push_str(&format!("    {prefix}{name},\n"));
        }
        out.push('}');
        out
    }
}

pub type ObjectInspectorFn = dyn Fn(&dyn Inspectable, &mut Entity, &mut Inspector<'_>) + Send + Sync;
pub type ResourceInspectorFn =
    dyn Fn(&Resource, &mut Entity) -> Result<(), InspectError> + Send + Sync;

/// Registry of described types and per-name inspectors.
#[derive(Default)]
pub struct Registry {
    classes: FxHashMap<String, ClassInfo>,
    objects: FxHashMap<String, Box<ObjectInspectorFn>>,
    resources: FxHashMap<String, Box<ResourceInspectorFn>>,
}

impl Registry {
    /// An empty registry, without even the built-in handle extractors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in `stream`, `socket` and `process` extractors.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        crate::resource::register_defaults(&mut registry);
        registry
    }

    pub fn register_class(&mut self, info: ClassInfo) -> &mut Self {
        self.classes.insert(info.name.clone(), info);
        self
    }

    /// Register a derived type's static description.
    pub fn register_type<T: Describe>(&mut self) -> &mut Self {
        self.register_class(T::class_info())
    }

    /// Register a custom inspector for the exact class name.
    ///
    /// Takes precedence over everything the object reports about itself.
    pub fn register_object_inspector<F>(&mut self, class_name: impl Into<String>, inspector: F) -> &mut Self
    where
        F: Fn(&dyn Inspectable, &mut Entity, &mut Inspector<'_>) + Send + Sync + 'static,
    {
        self.objects.insert(class_name.into(), Box::new(inspector));
        self
    }

    /// Typed variant of [`register_object_inspector`](Self::register_object_inspector).
    pub fn register_inspector<T, F>(&mut self, inspector: F) -> &mut Self
    where
        T: Describe,
        F: Fn(&T, &mut Entity, &mut Inspector<'_>) + Send + Sync + 'static,
    {
        let name = T::class_info().name;
        self.register_object_inspector(name, move |object, entity, inner| {
            if let Some(object) = object.as_any().downcast_ref::<T>() {
                inspector(object, entity, inner);
            }
        })
    }

    /// Register a metadata extractor for a handle type. The name is normalized.
    pub fn register_resource_inspector<F>(&mut self, kind: &str, inspector: F) -> &mut Self
    where
        F: Fn(&Resource, &mut Entity) -> Result<(), InspectError> + Send + Sync + 'static,
    {
        self.resources.insert(normalize_kind(kind), Box::new(inspector));
        self
    }

    pub fn class(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    pub fn object_inspector(&self, class_name: &str) -> Option<&ObjectInspectorFn> {
        self.objects.get(class_name).map(Box::as_ref)
    }

    /// Look up an extractor by already-normalized handle type.
    pub fn resource_inspector(&self, kind: &str) -> Option<&ResourceInspectorFn> {
        self.resources.get(kind).map(Box::as_ref)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassInfo> {
        self.classes.values()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("classes", &self.classes.len())
            .field("object_inspectors", &self.objects.len())
            .field("resource_inspectors", &self.resources.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_with_fields() {
        let info = ClassInfo::class("app::User")
            .with_parent("Model")
            .with_interface("Serialize")
            .with_field("name", Visibility::Public)
            .with_field("email", Visibility::Protected)
            .with_field("password", Visibility::Private);

        assert_eq!(
            info.definition(),
            "struct app::User: Model + Serialize {\n    pub name,\n    pub(crate) email,\n    password,\n}"
        );
    }

    #[test]
    fn test_definition_without_fields() {
        assert_eq!(ClassInfo::interface("app::Named").definition(), "trait app::Named;");
    }

    #[test]
    fn test_resource_inspector_name_is_normalized() {
        let mut registry = Registry::new();
        registry.register_resource_inspector("GD Image", |_, _| Ok(()));
        assert!(registry.resource_inspector("gd_image").is_some());
        assert!(registry.resource_inspector("GD Image").is_none());
    }

    #[test]
    fn test_defaults_include_handle_extractors() {
        let registry = Registry::with_defaults();
        for kind in ["stream", "socket", "process"] {
            assert!(registry.resource_inspector(kind).is_some(), "missing {kind}");
        }
    }
}
