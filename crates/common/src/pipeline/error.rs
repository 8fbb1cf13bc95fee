//! Pipeline failure taxonomy

use crate::errors::AppError;
use thiserror::Error;
use uuid::Uuid;

/// Why a run stopped before `COMPLETE`
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Pipeline run not found: {0}")]
    RunNotFound(Uuid),

    #[error("Invalid pipeline input: {0}")]
    InvalidInput(String),

    #[error("No contributor available")]
    NoContributor,

    /// Generation or humanization provider failure
    #[error(transparent)]
    Provider(AppError),

    #[error("Provider returned an empty {0}")]
    EmptyOutput(&'static str),

    #[error("Run was cancelled")]
    Cancelled,

    #[error("Run already failed: {0}")]
    AlreadyFailed(String),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl PipelineError {
    /// Whether a fresh queue attempt may succeed. Configuration problems
    /// and cancellations are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Provider(e) | PipelineError::Store(e) => e.is_transient(),
            PipelineError::EmptyOutput(_) => true,
            PipelineError::RunNotFound(_)
            | PipelineError::InvalidInput(_)
            | PipelineError::NoContributor
            | PipelineError::Cancelled
            | PipelineError::AlreadyFailed(_) => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::RunNotFound(id) => AppError::PipelineRunNotFound { id: id.to_string() },
            PipelineError::InvalidInput(message) => AppError::Validation {
                message,
                field: None,
            },
            PipelineError::Provider(e) | PipelineError::Store(e) => e,
            PipelineError::EmptyOutput(what) => AppError::GenerationError {
                message: format!("empty {}", what),
            },
            other @ (PipelineError::NoContributor
            | PipelineError::Cancelled
            | PipelineError::AlreadyFailed(_)) => AppError::Conflict {
                message: other.to_string(),
            },
        }
    }
}
