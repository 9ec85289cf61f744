//! Error types for embeddings_pipelines
//!
//! Pipeline lifecycle errors (build, not-built, step execution) live in
//! [`crate::pipeline::errors`]. This module holds the crate-level error used
//! by model constructors and chain-definition loading, which wraps those.

use thiserror::Error;

use crate::pipeline::errors::{PipelineBuildError, PipelineError};

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, EmbeddingsError>;

/// Main error type for embeddings_pipelines
#[derive(Error, Debug, Clone)]
pub enum EmbeddingsError {
    /// A model option was rejected at construction time
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Pipeline construction, build, or execution failed
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl EmbeddingsError {
    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Check if this error was raised while validating model options
    pub fn is_invalid_config(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }
}

impl From<serde_json::Error> for EmbeddingsError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<PipelineBuildError> for EmbeddingsError {
    fn from(err: PipelineBuildError) -> Self {
        Self::Pipeline(PipelineError::Build(err))
    }
}
