use std::fmt;

use crate::error::CoreError;

/// The states of a token ownership claim lifecycle.
///
/// The original presentation layer encoded ribbon status as ad hoc
/// numeric codes; these named states are the canonical encoding and the
/// numeric scheme is deliberately not preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    /// Claim has been submitted and awaits evidence review.
    Pending,
    /// Evidence checked out automatically; awaiting approver sign-off.
    UnderReview,
    /// Claim ratified — its profile data is canonical. Final state.
    Approved,
    /// Claim vetoed by an approver. Final state.
    Rejected,
}

impl ClaimStatus {
    /// Whether this is a final (terminal) state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Whether the claim still participates in the approval workflow.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Canonical string code used for storage and the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::UnderReview => "under_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parse a canonical string code.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "pending" => Ok(Self::Pending),
            "under_review" => Ok(Self::UnderReview),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(CoreError::ValidationError(format!(
                "invalid claim status code: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::UnderReview => write!(f, "UnderReview"),
            Self::Approved => write!(f, "Approved"),
            Self::Rejected => write!(f, "Rejected"),
        }
    }
}

/// Events that trigger claim state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimEvent {
    /// Automated evidence evaluation passed (cryptographic or DNS tier).
    EvidencePassed,
    /// Distinct approve decisions reached the consensus threshold.
    ConsensusReached,
    /// An approver vetoed the claim.
    Rejected,
}

/// Manages claim state transitions.
///
/// Valid transitions:
/// - Pending → UnderReview (EvidencePassed)
/// - Pending → Approved (ConsensusReached)
/// - Pending → Rejected (Rejected)
/// - UnderReview → Approved (ConsensusReached)
/// - UnderReview → Rejected (Rejected)
///
/// Approved and Rejected are terminal; a rejected claim is resubmitted
/// as a new claim rather than reopened.
pub struct ClaimStateMachine;

impl ClaimStateMachine {
    /// Attempt a state transition based on an event.
    /// Returns the new state on success, or an error for invalid transitions.
    pub fn transition(current: ClaimStatus, event: ClaimEvent) -> Result<ClaimStatus, CoreError> {
        let new_state = match (current, event) {
            // From Pending
            (ClaimStatus::Pending, ClaimEvent::EvidencePassed) => ClaimStatus::UnderReview,
            (ClaimStatus::Pending, ClaimEvent::ConsensusReached) => ClaimStatus::Approved,
            (ClaimStatus::Pending, ClaimEvent::Rejected) => ClaimStatus::Rejected,

            // From UnderReview
            (ClaimStatus::UnderReview, ClaimEvent::ConsensusReached) => ClaimStatus::Approved,
            (ClaimStatus::UnderReview, ClaimEvent::Rejected) => ClaimStatus::Rejected,

            // All other transitions are invalid
            _ => {
                return Err(CoreError::InvalidStateTransition {
                    from: current,
                    event,
                });
            }
        };

        tracing::debug!(
            from = %current,
            to = %new_state,
            event = ?event,
            "claim state transition"
        );

        Ok(new_state)
    }

    /// Check if a transition is valid without performing it.
    pub fn can_transition(current: ClaimStatus, event: ClaimEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}
