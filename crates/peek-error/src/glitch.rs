use std::any::Any;
use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::io::{self, ErrorKind};
use std::sync::Arc;

use peek::{ErrorObject, Field, Inspectable, Location, Throwable, Trace, TraceError, Value};
use serde::Serialize;

use crate::factory::{ErrorFactory, ErrorType, Overrides};
use crate::marker::Marker;
use crate::GlitchError;
use crate::parse::MarkerSpec;

type Source = Box<dyn Error + Send + Sync + 'static>;

/// An error carrying a shared [`ErrorType`], a message and where it was
/// raised.
#[derive(Debug)]
pub struct Glitch {
    kind: Arc<ErrorType>,
    message: String,
    namespace: String,
    code: Option<i64>,
    data: Option<serde_json::Value>,
    location: Option<Location>,
    trace: Trace,
    source: Option<Source>,
}

impl Glitch {
    pub fn kind(&self) -> &Arc<ErrorType> {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn code(&self) -> Option<i64> {
        self.code
    }

    pub fn data(&self) -> Option<&serde_json::Value> {
        self.data.as_ref()
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Whether `marker` or one of its descendants was set.
    pub fn is(&self, marker: Marker) -> bool {
        self.kind.is(marker)
    }

    pub fn has_custom(&self, name: &str) -> bool {
        self.kind.has_custom(name)
    }

    /// Both errors were created from the same type definition.
    pub fn same_type(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.kind, &other.kind)
    }

    pub fn http_status(&self) -> u16 {
        self.kind.http_status()
    }

    pub fn io_kind(&self) -> ErrorKind {
        self.kind.io_kind()
    }
}

impl fmt::Display for Glitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for Glitch {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref().map(|source| source as &(dyn Error + 'static))
    }
}

impl From<Glitch> for io::Error {
    fn from(glitch: Glitch) -> Self {
        Self::new(glitch.io_kind(), glitch)
    }
}

impl Inspectable for Glitch {
    fn class_name(&self) -> Cow<'static, str> {
        Cow::Owned(format!("peek_error::Glitch<{}>", self.kind.name()))
    }

    fn parent_classes(&self) -> Vec<String> {
        self.kind
            .base()
            .map(|base| vec![base.to_string()])
            .unwrap_or_default()
    }

    /// Every role in the closure, then the custom markers.
    fn interfaces(&self) -> Vec<String> {
        self.kind
            .roles()
            .markers()
            .map(|marker| marker.to_string())
            .chain(self.kind.marker_spec().custom().iter().cloned())
            .collect()
    }

    fn fields(&self) -> Vec<Field> {
        let mut fields = vec![
            Field::public("http_status", &self.kind.http_status()),
            Field::public("io_kind", &format!("{:?}", self.kind.io_kind())),
            Field::protected("namespace", &self.namespace),
        ];
        if let Some(data) = &self.data {
            fields.push(Field::public("data", data));
        }
        fields
    }

    fn as_throwable(&self) -> Option<&dyn Throwable> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Throwable for Glitch {
    fn message(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.message)
    }

    fn code(&self) -> Option<i64> {
        self.code
    }

    fn location(&self) -> Option<Location> {
        self.location.clone()
    }

    fn trace(&self) -> Option<&Trace> {
        (!self.trace.is_empty()).then_some(&self.trace)
    }

    fn previous(&self) -> Option<Value> {
        self.source
            .as_deref()
            .map(|source| Value::object(ErrorObject::from_dyn(source)))
    }
}

/// Collects the parts of a [`Glitch`]. Created by [`ErrorFactory::glitch`]
/// or the [`glitch!`](crate::glitch!) macro.
pub struct GlitchBuilder<'f> {
    factory: &'f ErrorFactory,
    markers: String,
    namespace: String,
    message: String,
    code: Option<i64>,
    data: Option<Result<serde_json::Value, serde_json::Error>>,
    overrides: Overrides,
    location: Option<Location>,
    rewind: usize,
    capture_trace: bool,
    source: Option<Source>,
}

impl<'f> GlitchBuilder<'f> {
    pub(crate) fn new(factory: &'f ErrorFactory, markers: String, namespace: String) -> Self {
        Self {
            factory,
            markers,
            namespace,
            message: String::new(),
            code: None,
            data: None,
            overrides: Overrides::default(),
            location: None,
            rewind: 0,
            capture_trace: true,
            source: None,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    /// Structured payload. Serialization errors surface from
    /// [`build`](Self::build).
    pub fn data(mut self, data: &impl Serialize) -> Self {
        self.data = Some(serde_json::to_value(data));
        self
    }

    pub fn http_status(mut self, status: u16) -> Self {
        self.overrides.http_status = Some(status);
        self
    }

    pub fn io_kind(mut self, kind: ErrorKind) -> Self {
        self.overrides.io_kind = Some(kind);
        self
    }

    /// Where the error was raised. Defaults to the innermost frame of the
    /// captured trace.
    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.location = Some(Location::new(file, line));
        self
    }

    /// Drop `frames` more frames from the captured trace, for helpers that
    /// raise on their caller's behalf.
    pub fn rewind(mut self, frames: usize) -> Self {
        self.rewind = frames;
        self
    }

    pub fn without_trace(mut self) -> Self {
        self.capture_trace = false;
        self
    }

    pub fn source(mut self, source: impl Into<Source>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[inline(never)]
    pub fn build(self) -> Result<Glitch, GlitchError> {
        if let Some(status) = self.overrides.http_status {
            if !(100..=599).contains(&status) {
                return Err(GlitchError::InvalidStatus(status));
            }
        }
        let set = MarkerSpec::parse(&self.markers, &self.namespace)?;
        let data = self.data.transpose()?;
        let kind = self.factory.resolve(set, self.overrides);

        let trace = if self.capture_trace {
            capture(self.rewind)
        } else {
            Trace::default()
        };
        let location = self.location.or_else(|| trace.origin().cloned());

        Ok(Glitch {
            kind,
            message: self.message,
            namespace: self.namespace,
            code: self.code,
            data,
            location,
            trace,
            source: self.source,
        })
    }
}

/// Best effort: an error without a trace is still an error.
fn capture(rewind: usize) -> Trace {
    // Skip `capture` and `build`.
    match Trace::capture(rewind + 2) {
        Ok(trace) => trace,
        Err(err @ (TraceError::Unavailable | TraceError::RewindOutOfRange { .. })) => {
            tracing::warn!(%err, "raising error without a trace");
            Trace::default()
        }
    }
}

impl fmt::Debug for GlitchBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlitchBuilder")
            .field("markers", &self.markers)
            .field("namespace", &self.namespace)
            .field("message", &self.message)
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}
