//! Named measurements shown in a dump's stats bar.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::{Location, PathAliases};

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;

/// Severity band of a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Danger,
}

impl Severity {
    /// Band `value` against two thresholds. Comparisons are strict, so a
    /// value exactly at a threshold stays in the lower band.
    pub fn classify<T: PartialOrd>(value: T, warning: T, danger: T) -> Self {
        if value > danger {
            Self::Danger
        } else if value > warning {
            Self::Warning
        } else {
            Self::Success
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatValue {
    Duration(Duration),
    Bytes(u64),
    Count(u64),
    Text(String),
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duration(d) => write!(f, "{:.2} ms", d.as_secs_f64() * 1000.0),
            Self::Bytes(b) if *b >= MIB => write!(f, "{:.2} MiB", *b as f64 / MIB as f64),
            Self::Bytes(b) if *b >= KIB => write!(f, "{:.2} KiB", *b as f64 / KIB as f64),
            Self::Bytes(b) => write!(f, "{b} B"),
            Self::Count(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for StatValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Duration(d) => serializer.serialize_f64(d.as_secs_f64()),
            Self::Bytes(n) | Self::Count(n) => serializer.serialize_u64(*n),
            Self::Text(s) => serializer.serialize_str(s),
        }
    }
}

pub type StatRenderFn = dyn Fn(&Stat) -> String + Send + Sync;

/// A measurement with an optional per-format rendering override.
#[derive(Clone, Serialize)]
pub struct Stat {
    key: String,
    label: String,
    value: StatValue,
    severity: Severity,
    #[serde(skip)]
    renderers: Vec<(&'static str, Arc<StatRenderFn>)>,
}

impl Stat {
    pub fn new(key: impl Into<String>, label: impl Into<String>, value: StatValue) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            value,
            severity: Severity::Info,
            renderers: Vec::new(),
        }
    }

    /// Elapsed time: warning above 100 ms, danger above 500 ms.
    pub fn time(elapsed: Duration) -> Self {
        let severity = Severity::classify(
            elapsed,
            Duration::from_millis(100),
            Duration::from_millis(500),
        );
        Self::new("time", "Time", StatValue::Duration(elapsed)).with_severity(severity)
    }

    /// Resident memory: warning above 5 MiB, danger above 10 MiB.
    pub fn memory(bytes: u64) -> Self {
        let severity = Severity::classify(bytes, 5 * MIB, 10 * MIB);
        Self::new("memory", "Memory", StatValue::Bytes(bytes)).with_severity(severity)
    }

    /// [`memory`](Self::memory) for the current process, where the platform
    /// reports it.
    pub fn current_memory() -> Option<Self> {
        resident_memory().map(Self::memory)
    }

    pub fn location(location: &Location, aliases: &PathAliases) -> Self {
        let text = format!("{}:{}", aliases.apply(&location.file), location.line);
        Self::new("location", "Location", StatValue::Text(text))
    }

    pub fn entities(count: usize) -> Self {
        Self::new(
            "entities",
            "Entities",
            StatValue::Count(u64::try_from(count).unwrap_or(u64::MAX)),
        )
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Use `render` instead of the default text when rendering as `format`.
    pub fn with_renderer<F>(mut self, format: &'static str, render: F) -> Self
    where
        F: Fn(&Stat) -> String + Send + Sync + 'static,
    {
        self.renderers.retain(|(name, _)| *name != format);
        self.renderers.push((format, Arc::new(render)));
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn value(&self) -> &StatValue {
        &self.value
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Whether a custom rendering is registered for `format`.
    pub fn has_renderer(&self, format: &str) -> bool {
        self.renderers.iter().any(|(name, _)| *name == format)
    }

    /// Display text for the given renderer format.
    pub fn render_for(&self, format: &str) -> String {
        self.renderers
            .iter()
            .find(|(name, _)| *name == format)
            .map_or_else(|| self.value.to_string(), |(_, render)| render(self))
    }
}

impl fmt::Debug for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stat")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("severity", &self.severity)
            .field("renderers", &self.renderers.len())
            .finish()
    }
}

/// Resident set size from `/proc/self/status`.
fn resident_memory() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find_map(|l| l.strip_prefix("VmRSS:"))?;
    let kib: u64 = line.trim().trim_end_matches("kB").trim().parse().ok()?;
    Some(kib * KIB)
}
