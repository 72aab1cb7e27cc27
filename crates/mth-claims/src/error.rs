use uuid::Uuid;

use mth_core::{ClaimStatus, CoreError};

/// Claim workflow errors.
///
/// `is_retryable` separates "try again later" failures from final
/// outcomes so API callers can tell the difference.
#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("claim not found: {0}")]
    NotFound(Uuid),

    #[error("claim {id} is already {status}")]
    StaleState { id: Uuid, status: ClaimStatus },

    #[error("evaluator unavailable: {0}")]
    EvaluatorUnavailable(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("storage error: {0}")]
    Storage(String),
}

impl ClaimError {
    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EvaluatorUnavailable(_) | Self::Storage(_)
        )
    }
}
