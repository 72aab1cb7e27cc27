use serde::{Deserialize, Serialize};

use crate::claim::{Claim, EvaluationOutcome};

/// How many distinct human approvals a claim needs.
///
/// Claims whose latest evaluation passed (cryptographic or DNS tier) are
/// backed by automated evidence and need fewer eyes than claims resting
/// on social attestation or unresolved lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusPolicy {
    /// Threshold for claims with a passed automated evaluation.
    pub verified_threshold: u32,
    /// Threshold for everything else (SocialPost, unresolved DNS).
    pub unverified_threshold: u32,
}

impl Default for ConsensusPolicy {
    fn default() -> Self {
        Self {
            verified_threshold: 1,
            unverified_threshold: 2,
        }
    }
}

impl ConsensusPolicy {
    pub fn new(verified_threshold: u32, unverified_threshold: u32) -> Self {
        Self {
            verified_threshold,
            unverified_threshold,
        }
    }

    /// The threshold that applies to this claim right now. Re-evaluation
    /// can change the answer, which is why consensus is recomputed from
    /// the persisted approvals on every transition.
    pub fn required_approvals(&self, claim: &Claim) -> u32 {
        match claim.proof.evaluation.outcome {
            EvaluationOutcome::Passed => self.verified_threshold,
            _ => self.unverified_threshold,
        }
    }
}
