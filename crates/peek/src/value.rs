//! The closed model of inspectable runtime values.
//!
//! Composite values are reference counted so that identity is observable:
//! two `Value`s sharing the same `ArrayRef` or `ObjectRef` are the same
//! value, and an array or object may contain itself.

use std::any::Any;
use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::{Inspectable, Scalar};

pub type ArrayRef = Rc<RefCell<Array>>;
pub type ObjectRef = Rc<dyn Inspectable>;
pub type ResourceRef = Rc<Resource>;

/// Any value the inspector understands.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Raw bytes; sniffed as text when they are valid UTF-8.
    Binary(Vec<u8>),
    Array(ArrayRef),
    Object(ObjectRef),
    Resource(ResourceRef),
    /// A named constant such as a flag or unit enum variant.
    Const { name: String, value: Scalar },
}

impl Value {
    /// A fresh, empty array.
    pub fn array() -> Self {
        Self::Array(Rc::new(RefCell::new(Array::new())))
    }

    /// A sequential array with keys `0..n`.
    pub fn list<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        let mut array = Array::new();
        for value in values {
            array.push(value);
        }
        Self::Array(Rc::new(RefCell::new(array)))
    }

    /// An array with explicit keys, in the given order.
    pub fn assoc<K, I>(entries: I) -> Self
    where
        K: Into<ArrayKey>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut array = Array::new();
        for (key, value) in entries {
            array.insert(key, value);
        }
        Self::Array(Rc::new(RefCell::new(array)))
    }

    pub fn object<T: Inspectable>(object: T) -> Self {
        Self::Object(Rc::new(object))
    }

    pub fn resource(kind: impl Into<String>, handle: impl Any) -> Self {
        Self::Resource(Rc::new(Resource::new(kind, handle)))
    }

    pub fn constant(name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::Const {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Short description of the value's type, used in frame signatures.
    pub fn type_name(&self) -> Cow<'static, str> {
        match self {
            Self::Null => Cow::Borrowed("null"),
            Self::Bool(_) => Cow::Borrowed("bool"),
            Self::Int(_) => Cow::Borrowed("int"),
            Self::Float(_) => Cow::Borrowed("float"),
            Self::Str(_) => Cow::Borrowed("string"),
            Self::Binary(_) => Cow::Borrowed("binary"),
            Self::Array(_) => Cow::Borrowed("array"),
            Self::Object(object) => object.class_name(),
            Self::Resource(_) => Cow::Borrowed("resource"),
            Self::Const { .. } => Cow::Borrowed("const"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Int(n) => f.debug_tuple("Int").field(n).finish(),
            Self::Float(n) => f.debug_tuple("Float").field(n).finish(),
            Self::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Self::Binary(b) => f.debug_tuple("Binary").field(&b.len()).finish(),
            Self::Array(a) => match a.try_borrow() {
                Ok(array) => f.debug_tuple("Array").field(&array.len()).finish(),
                Err(_) => f.write_str("Array(<borrowed>)"),
            },
            Self::Object(o) => f.debug_tuple("Object").field(&o.class_name()).finish(),
            Self::Resource(r) => f.debug_tuple("Resource").field(&r.kind()).finish(),
            Self::Const { name, value } => f
                .debug_struct("Const")
                .field("name", name)
                .field("value", value)
                .finish(),
        }
    }
}

impl From<Scalar> for Value {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Null => Self::Null,
            Scalar::Bool(b) => Self::Bool(b),
            Scalar::Int(n) => Self::Int(n),
            Scalar::Float(n) => Self::Float(n),
            Scalar::Str(s) => Self::Str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Key of an array entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum ArrayKey {
    Int(i64),
    Str(String),
}

impl fmt::Display for ArrayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ArrayKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ArrayKey {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<usize> for ArrayKey {
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or_else(|_| Self::Str(value.to_string()), Self::Int)
    }
}

impl From<&str> for ArrayKey {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for ArrayKey {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// True when `keys` is exactly `0, 1, .., n-1` in order.
pub fn is_dense<'a, I>(keys: I) -> bool
where
    I: IntoIterator<Item = Option<&'a ArrayKey>>,
{
    keys.into_iter().enumerate().all(|(idx, key)| match key {
        None => true,
        Some(ArrayKey::Int(n)) => usize::try_from(*n).is_ok_and(|n| n == idx),
        Some(ArrayKey::Str(_)) => false,
    })
}

/// Ordered key/value collection.
#[derive(Clone, Default)]
pub struct Array {
    entries: Vec<(ArrayKey, Value)>,
    positions: FxHashMap<ArrayKey, usize>,
    max_int: Option<i64>,
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The key [`push`](Self::push) would use: one past the largest integer
    /// key, or `0`. `None` once `i64::MAX` is taken.
    pub fn next_index(&self) -> Option<i64> {
        self.max_int.map_or(Some(0), |max| max.checked_add(1))
    }

    /// Append with the next integer key. Returns the key, or `None` when no
    /// integer key is left, in which case the value is dropped.
    pub fn push(&mut self, value: Value) -> Option<ArrayKey> {
        let Some(next) = self.next_index() else {
            tracing::debug!("array has no free integer key, dropping pushed value");
            return None;
        };
        let key = ArrayKey::Int(next);
        self.append(key.clone(), value);
        Some(key)
    }

    /// Insert or replace the entry for `key`. New keys are appended.
    pub fn insert(&mut self, key: impl Into<ArrayKey>, value: Value) {
        let key = key.into();
        if let Some(&idx) = self.positions.get(&key) {
            self.entries[idx].1 = value;
        } else {
            self.append(key, value);
        }
    }

    fn append(&mut self, key: ArrayKey, value: Value) {
        if let ArrayKey::Int(n) = key {
            self.max_int = Some(self.max_int.map_or(n, |max| max.max(n)));
        }
        self.positions.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
    }

    pub fn get(&self, key: &ArrayKey) -> Option<&Value> {
        self.positions.get(key).map(|&idx| &self.entries[idx].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArrayKey, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &ArrayKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn is_list(&self) -> bool {
        is_dense(self.keys().map(Some))
    }
}

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// An opaque handle (file, socket, child process, ...) tagged with its type name.
pub struct Resource {
    id: u64,
    kind: String,
    handle: Box<dyn Any>,
}

impl Resource {
    pub fn new(kind: impl Into<String>, handle: impl Any) -> Self {
        Self {
            id: NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed),
            kind: kind.into(),
            handle: Box::new(handle),
        }
    }

    /// Process-unique handle number.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Lowercase kind with `-` and spaces folded to `_`; the registry key.
    pub fn normalized_kind(&self) -> String {
        normalize_kind(&self.kind)
    }

    pub fn handle<T: Any>(&self) -> Option<&T> {
        self.handle.downcast_ref::<T>()
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

pub(crate) fn normalize_kind(kind: &str) -> String {
    kind.trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Conversion of Rust values into inspectable [`Value`]s.
///
/// Implemented for primitives, strings, standard collections and shared
/// objects. `#[derive(Inspectable)]` uses it for every field.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

macro_rules! small_int_to_value {
    ($($ty:ty),*) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::Int(i64::from(*self))
                }
            }
        )*
    };
}

macro_rules! wide_int_to_value {
    ($($ty:ty),*) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    i64::try_from(*self).map_or(Value::Float(*self as f64), Value::Int)
                }
            }
        )*
    };
}

small_int_to_value!(i8, i16, i32, i64, u8, u16, u32);
wide_int_to_value!(i128, isize, u64, u128, usize);

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl ToValue for char {
    fn to_value(&self) -> Value {
        Value::Str(self.to_string())
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::Str(self.to_owned())
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }
}

impl ToValue for Cow<'_, str> {
    fn to_value(&self) -> Value {
        Value::Str(self.to_string())
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl ToValue for Scalar {
    fn to_value(&self) -> Value {
        Value::from(self.clone())
    }
}

impl ToValue for () {
    fn to_value(&self) -> Value {
        Value::Null
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: ToValue + ?Sized> ToValue for Box<T> {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ToValue::to_value)
    }
}

impl<T: ToValue> ToValue for [T] {
    fn to_value(&self) -> Value {
        Value::list(self.iter().map(ToValue::to_value))
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        self.as_slice().to_value()
    }
}

impl<T: ToValue, const N: usize> ToValue for [T; N] {
    fn to_value(&self) -> Value {
        self.as_slice().to_value()
    }
}

impl<T: ToValue> ToValue for VecDeque<T> {
    fn to_value(&self) -> Value {
        Value::list(self.iter().map(ToValue::to_value))
    }
}

/// Keys usable for map conversions.
pub trait ToKey {
    fn to_key(&self) -> ArrayKey;
}

macro_rules! int_to_key {
    ($($ty:ty),*) => {
        $(
            impl ToKey for $ty {
                fn to_key(&self) -> ArrayKey {
                    ArrayKey::Int(i64::from(*self))
                }
            }
        )*
    };
}

int_to_key!(i8, i16, i32, i64, u8, u16, u32);

impl ToKey for usize {
    fn to_key(&self) -> ArrayKey {
        ArrayKey::from(*self)
    }
}

impl ToKey for String {
    fn to_key(&self) -> ArrayKey {
        ArrayKey::Str(self.clone())
    }
}

impl ToKey for &str {
    fn to_key(&self) -> ArrayKey {
        ArrayKey::Str((*self).to_owned())
    }
}

impl<K: ToKey, V: ToValue, S> ToValue for HashMap<K, V, S> {
    fn to_value(&self) -> Value {
        let mut entries: Vec<(ArrayKey, Value)> = self
            .iter()
            .map(|(k, v)| (k.to_key(), v.to_value()))
            .collect();
        // Hash order is arbitrary; sort so dumps are stable.
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Value::assoc(entries)
    }
}

impl<K: ToKey, V: ToValue> ToValue for BTreeMap<K, V> {
    fn to_value(&self) -> Value {
        Value::assoc(self.iter().map(|(k, v)| (k.to_key(), v.to_value())))
    }
}

impl<T: Inspectable> ToValue for Rc<T> {
    fn to_value(&self) -> Value {
        let object: ObjectRef = self.clone();
        Value::Object(object)
    }
}

impl<T: Inspectable> ToValue for Weak<T> {
    fn to_value(&self) -> Value {
        self.upgrade().map_or(Value::Null, |rc| rc.to_value())
    }
}

impl<T: ToValue + ?Sized> ToValue for RefCell<T> {
    fn to_value(&self) -> Value {
        self.try_borrow()
            .map_or_else(|_| Value::Str("<borrowed>".to_owned()), |v| v.to_value())
    }
}

impl<T: ToValue + Copy> ToValue for Cell<T> {
    fn to_value(&self) -> Value {
        self.get().to_value()
    }
}

impl ToValue for serde_json::Value {
    fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .unwrap_or_else(|| Value::Float(n.as_f64().unwrap_or(f64::NAN))),
            Self::String(s) => Value::Str(s.clone()),
            Self::Array(items) => Value::list(items.iter().map(ToValue::to_value)),
            Self::Object(map) => {
                Value::assoc(map.iter().map(|(k, v)| (k.as_str(), v.to_value())))
            }
        }
    }
}
