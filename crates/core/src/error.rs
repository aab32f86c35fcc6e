//! Error types for the docanchor pipeline.
//!
//! This module defines a unified error enum covering every error category in
//! the system: caller-supplied configuration, external capability failures
//! (embedding, generation, vector index), document loading, and the ambient
//! I/O and serialization errors.

use thiserror::Error;

/// Unified error type for the docanchor pipeline.
///
/// All functions in the workspace return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Bad caller-supplied parameters (e.g. chunk_size/overlap). Never retried.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Embedding provider transport or quota failure
    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// Generation (LLM) provider failure
    #[error("Generation error: {0}")]
    Generation(String),

    /// Vector index gateway failure
    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// Unsupported or corrupt source file. Fatal, never retried.
    #[error("Document load error: {0}")]
    DocumentLoad(String),

    /// Missing document, project, or record
    #[error("Not found: {0}")]
    NotFound(String),

    /// Illegal document lifecycle transition
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// An in-flight operation was cancelled by a stop signal
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// A bounded call to an external capability did not return in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Application configuration errors (config file, env)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether this error class is worth retrying with backoff.
    ///
    /// External dependency failures (embedding, generation, index, timeouts)
    /// are transient; everything else fails immediately. The attempt count and
    /// backoff schedule live in [`crate::config::RetryPolicy`], so the retry
    /// boundary is a configuration contract rather than a scattered constant.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::EmbeddingProvider(_)
                | AppError::Generation(_)
                | AppError::IndexUnavailable(_)
                | AppError::Timeout(_)
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(AppError::EmbeddingProvider("quota".into()).is_transient());
        assert!(AppError::Generation("503".into()).is_transient());
        assert!(AppError::IndexUnavailable("conn reset".into()).is_transient());
        assert!(AppError::Timeout("embed".into()).is_transient());

        assert!(!AppError::InvalidConfiguration("overlap".into()).is_transient());
        assert!(!AppError::DocumentLoad("corrupt".into()).is_transient());
        assert!(!AppError::NotFound("doc".into()).is_transient());
        assert!(!AppError::Cancelled("stop".into()).is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = AppError::InvalidConfiguration("overlap must be < chunk_size".into());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: overlap must be < chunk_size"
        );
    }
}
