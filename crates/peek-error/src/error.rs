use thiserror::Error;

#[derive(Debug, Error)]
pub enum GlitchError {
    #[error("invalid marker name {name:?}")]
    InvalidMarker { name: String },

    #[error("HTTP status {0} is outside 100..=599")]
    InvalidStatus(u16),

    #[error("failed to serialize error data: {0}")]
    Data(#[from] serde_json::Error),
}
