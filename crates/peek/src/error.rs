//! Error types for capture, inspection, configuration and output.

use thiserror::Error;

/// Errors from building a [`Trace`](crate::Trace).
#[derive(Debug, Error)]
pub enum TraceError {
    /// More frames were skipped than the stack holds.
    #[error("cannot rewind {rewind} frames: stack depth is {depth}")]
    RewindOutOfRange { rewind: usize, depth: usize },

    /// The platform cannot capture backtraces.
    #[error("backtrace capture is not supported on this platform")]
    Unavailable,
}

/// Errors from a handle metadata extractor. Never fatal to a dump.
#[derive(Debug, Error)]
pub enum InspectError {
    #[error("{kind} handle is not a {expected}")]
    HandleMismatch {
        kind: &'static str,
        expected: &'static str,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown output format: {0}")]
    InvalidFormat(String),

    #[error("invalid number for {key}: {value}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("invalid boolean for {key}: {value}")]
    InvalidBool { key: &'static str, value: String },

    #[error("invalid path alias (expected name=/prefix): {0}")]
    InvalidAlias(String),
}

/// Top-level error for dumping.
#[derive(Debug, Error)]
pub enum PeekError {
    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
