use crate::claim_state::{ClaimEvent, ClaimStatus};

/// Core protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid claim transition from {from} on {event:?}")]
    InvalidStateTransition { from: ClaimStatus, event: ClaimEvent },

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid chain id: {0}")]
    InvalidChainId(String),

    #[error("invalid token address: {0}")]
    InvalidTokenAddress(String),

    #[error("invalid user id: {0}")]
    InvalidUserId(String),
}
