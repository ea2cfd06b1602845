//! Capabilities a value can implement to describe itself to the inspector.

use std::any::{Any, type_name};
use std::borrow::Cow;
use std::error::Error;
use std::ops::ControlFlow;
use std::rc::Rc;

use crate::{ClassInfo, Entity, Inspector, Location, ToValue, Trace, Value, Visibility};

/// One named, visibility-tagged field reported by [`Inspectable::fields`].
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub visibility: Visibility,
    pub value: Value,
}

impl Field {
    pub fn new(name: impl Into<String>, visibility: Visibility, value: Value) -> Self {
        Self {
            name: name.into(),
            visibility,
            value,
        }
    }

    pub fn public(name: impl Into<String>, value: &(impl ToValue + ?Sized)) -> Self {
        Self::new(name, Visibility::Public, value.to_value())
    }

    pub fn protected(name: impl Into<String>, value: &(impl ToValue + ?Sized)) -> Self {
        Self::new(name, Visibility::Protected, value.to_value())
    }

    pub fn private(name: impl Into<String>, value: &(impl ToValue + ?Sized)) -> Self {
        Self::new(name, Visibility::Private, value.to_value())
    }
}

/// An object the inspector can walk.
///
/// Usually derived with `#[derive(Inspectable)]`, which reports every field
/// with a visibility taken from its Rust visibility.
///
/// # Example
///
/// ```
/// use peek::Inspectable;
///
/// #[derive(Inspectable)]
/// pub struct User {
///     pub name: String,
///     pub(crate) email: String,
///     password: String,
/// }
/// ```
///
/// The inspector consults, in order: a custom inspector registered for
/// [`class_name`](Self::class_name), [`inspect`](Self::inspect),
/// [`debug_info`](Self::debug_info), then [`fields`](Self::fields).
pub trait Inspectable: Any {
    /// Fully qualified type name shown in headers.
    fn class_name(&self) -> Cow<'static, str> {
        Cow::Borrowed(type_name::<Self>())
    }

    fn parent_classes(&self) -> Vec<String> {
        Vec::new()
    }

    fn interfaces(&self) -> Vec<String> {
        Vec::new()
    }

    /// Fallback field listing.
    fn fields(&self) -> Vec<Field> {
        Vec::new()
    }

    /// Curated fields. When present they are applied before
    /// [`fields`](Self::fields), which then only fills in missing names.
    fn debug_info(&self) -> Option<Vec<Field>> {
        None
    }

    /// Fill `entity` directly. Return `Break` to skip the field-based paths.
    fn inspect(&self, entity: &mut Entity, inspector: &mut Inspector<'_>) -> ControlFlow<()> {
        let _ = (entity, inspector);
        ControlFlow::Continue(())
    }

    /// Errors expose their message, location and trace through this.
    fn as_throwable(&self) -> Option<&dyn Throwable> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// Static type description, registered with the [`Registry`](crate::Registry).
pub trait Describe: Inspectable + Sized {
    fn class_info() -> ClassInfo;
}

/// Error-like values rendered as exception entities.
pub trait Throwable {
    fn message(&self) -> Cow<'_, str>;

    fn code(&self) -> Option<i64> {
        None
    }

    fn location(&self) -> Option<Location> {
        None
    }

    fn trace(&self) -> Option<&Trace> {
        None
    }

    /// The error this one wraps, if any.
    fn previous(&self) -> Option<Value> {
        None
    }
}

/// Snapshot of a `std::error::Error` chain as an inspectable value.
#[derive(Debug, Clone)]
pub struct ErrorObject {
    class_name: String,
    message: String,
    previous: Option<Rc<ErrorObject>>,
}

impl ErrorObject {
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: message.into(),
            previous: None,
        }
    }

    pub fn from_error<E: Error + 'static>(error: &E) -> Self {
        let mut object = Self::new(type_name::<E>(), error.to_string());
        object.previous = error.source().map(|source| Rc::new(Self::from_dyn(source)));
        object
    }

    /// Like [`from_error`](Self::from_error) for type-erased errors, whose
    /// concrete type name is not available.
    pub fn from_dyn(error: &(dyn Error + 'static)) -> Self {
        let mut object = Self::new("dyn std::error::Error", error.to_string());
        object.previous = error.source().map(|source| Rc::new(Self::from_dyn(source)));
        object
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Inspectable for ErrorObject {
    fn class_name(&self) -> Cow<'static, str> {
        Cow::Owned(self.class_name.clone())
    }

    fn interfaces(&self) -> Vec<String> {
        vec!["std::error::Error".to_owned()]
    }

    fn as_throwable(&self) -> Option<&dyn Throwable> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Throwable for ErrorObject {
    fn message(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.message)
    }

    fn previous(&self) -> Option<Value> {
        self.previous.as_ref().map(ToValue::to_value)
    }
}

impl Value {
    /// Inspectable snapshot of an error and its source chain.
    pub fn error<E: Error + 'static>(error: &E) -> Self {
        Self::object(ErrorObject::from_error(error))
    }
}
