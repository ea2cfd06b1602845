//! Error types are built once per distinct definition and shared.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::ErrorKind;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHasher};

use crate::glitch::GlitchBuilder;
use crate::marker::{Marker, Roles};
use crate::parse::MarkerSpec;

/// Status used when no marker sets one.
pub const DEFAULT_HTTP_STATUS: u16 = 500;

/// Per-error overrides of the defaults a marker set resolves to. Two
/// errors with the same markers but different overrides are different
/// types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Overrides {
    pub http_status: Option<u16>,
    pub io_kind: Option<ErrorKind>,
}

/// A resolved error type: its markers, their closure and the defaults
/// taken from the most specific marker.
#[derive(Debug)]
pub struct ErrorType {
    markers: MarkerSpec,
    roles: Roles,
    base: Option<Marker>,
    http_status: u16,
    io_kind: ErrorKind,
    definition: String,
    hash: u64,
}

impl ErrorType {
    fn resolve(set: MarkerSpec, overrides: Overrides) -> Self {
        let roles = Roles::closure(set.markers().iter().copied());
        let specific = set.most_specific();
        let http_status = overrides
            .http_status
            .or_else(|| specific.and_then(Marker::http_status))
            .unwrap_or(DEFAULT_HTTP_STATUS);
        let io_kind = overrides
            .io_kind
            .or_else(|| specific.and_then(Marker::io_kind))
            .unwrap_or(ErrorKind::Other);
        let definition = definition(&set, http_status, io_kind);

        let mut hasher = FxHasher::default();
        definition.hash(&mut hasher);

        Self {
            roles,
            base: specific.map(Marker::base),
            http_status,
            io_kind,
            hash: hasher.finish(),
            definition,
            markers: set,
        }
    }

    /// `Marker+Marker+ns::Custom`, or `Glitch` for an unmarked error.
    pub fn name(&self) -> String {
        if self.markers.is_empty() {
            "Glitch".to_owned()
        } else {
            self.markers.to_string()
        }
    }

    pub fn marker_spec(&self) -> &MarkerSpec {
        &self.markers
    }

    pub fn roles(&self) -> Roles {
        self.roles
    }

    /// `Logic` or `Runtime` for the most specific marker; `None` when only
    /// custom markers are set.
    pub fn base(&self) -> Option<Marker> {
        self.base
    }

    pub fn http_status(&self) -> u16 {
        self.http_status
    }

    pub fn io_kind(&self) -> ErrorKind {
        self.io_kind
    }

    /// Normalized text every equal type shares.
    pub fn definition(&self) -> &str {
        &self.definition
    }

    pub fn definition_hash(&self) -> u64 {
        self.hash
    }

    pub fn is(&self, marker: Marker) -> bool {
        self.roles.has(marker)
    }

    pub fn is_retryable(&self) -> bool {
        self.markers.markers().iter().any(|marker| marker.is_retryable())
    }

    /// Matches a custom marker by its qualified name, or by its last
    /// segment.
    pub fn has_custom(&self, name: &str) -> bool {
        self.markers.custom().iter().any(|custom| {
            custom == name
                || custom
                    .strip_suffix(name)
                    .is_some_and(|prefix| prefix.ends_with("::"))
        })
    }
}

fn definition(set: &MarkerSpec, http_status: u16, io_kind: ErrorKind) -> String {
    format!("[{set}] http={http_status} io={io_kind:?}")
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.definition)
    }
}

/// Builds and caches [`ErrorType`]s by definition. Share one factory per
/// application; it is cheap to keep behind an `Arc`.
#[derive(Debug, Default)]
pub struct ErrorFactory {
    types: Mutex<FxHashMap<String, Arc<ErrorType>>>,
}

impl ErrorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The type for `set` with `overrides`, created on first use.
    pub fn resolve(&self, set: MarkerSpec, overrides: Overrides) -> Arc<ErrorType> {
        let candidate = ErrorType::resolve(set, overrides);
        let mut types = self.types.lock();
        if let Some(existing) = types.get(candidate.definition()) {
            tracing::trace!(definition = %existing.definition, "error type cache hit");
            return Arc::clone(existing);
        }

        tracing::debug!(definition = %candidate.definition, "new error type");
        let created = Arc::new(candidate);
        types.insert(created.definition.clone(), Arc::clone(&created));
        created
    }

    /// Start building an error with the comma-separated `markers`. Custom
    /// markers are qualified with `namespace`, usually `module_path!()`.
    pub fn glitch(&self, markers: impl Into<String>, namespace: impl Into<String>) -> GlitchBuilder<'_> {
        GlitchBuilder::new(self, markers.into(), namespace.into())
    }

    /// Number of distinct types created so far.
    pub fn len(&self) -> usize {
        self.types.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.lock().is_empty()
    }
}
