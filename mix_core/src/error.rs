use thiserror::Error;

/// Error taxonomy for a single mix run.
///
/// Degraded-but-recoverable conditions (trim analysis failure, format
/// fallback, speed backends failing) are never surfaced here; they are
/// logged and absorbed inside the pipeline.
#[derive(Debug, Error)]
pub enum MixError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("processing failed: {0}")]
    Processing(String),
}

impl MixError {
    pub fn validation(msg: impl Into<String>) -> Self {
        MixError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        MixError::ResourceNotFound(msg.into())
    }

    pub fn processing(msg: impl Into<String>) -> Self {
        MixError::Processing(msg.into())
    }
}

impl From<anyhow::Error> for MixError {
    fn from(e: anyhow::Error) -> Self {
        MixError::Processing(format!("{e:#}"))
    }
}

pub type MixResult<T> = Result<T, MixError>;
