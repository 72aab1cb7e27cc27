//! The approval coordinator: owns every claim state transition.
//!
//! Submissions create the claim, run the evaluator once (outside any
//! claim lock, with bounded retries) and apply the result atomically.
//! Approvals and rejections are synchronous per-claim updates; consensus
//! is recomputed from the persisted approvals list on every transition,
//! so restarts and horizontal scaling cannot lose votes.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use mth_core::{ChainId, ClaimEvent, ClaimStateMachine, ClaimStatus, TokenAddress, UserId};

use crate::claim::{
    Challenge, Claim, Decision, Evaluation, EvaluationOutcome, MediaRefs, ProfileFields,
    ProofEvidence,
};
use crate::error::ClaimError;
use crate::evaluator::ProofEvaluator;
use crate::policy::ConsensusPolicy;
use crate::store::ClaimStore;

/// Retry budget for evaluator collaborator calls.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts before degrading to `Unverified`.
    pub max_attempts: u32,
    /// Base backoff between attempts; grows linearly per attempt.
    pub backoff_ms: u64,
    /// Per-attempt ceiling on evaluator wall time.
    pub eval_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 250,
            eval_timeout_ms: 5_000,
        }
    }
}

/// Failure to hand an approved claim to the token-profile read path.
#[derive(Debug, thiserror::Error)]
#[error("publish failed: {0}")]
pub struct PublishError(pub String);

/// Receives the accepted claim when it reaches Approved, the moment its
/// profile fields become the token's canonical social data.
#[async_trait]
pub trait ProfilePublisher: Send + Sync {
    async fn publish(&self, claim: &Claim) -> Result<(), PublishError>;
}

/// Publisher for deployments without a read-path endpoint (and tests).
pub struct NoopPublisher;

#[async_trait]
impl ProfilePublisher for NoopPublisher {
    async fn publish(&self, _claim: &Claim) -> Result<(), PublishError> {
        Ok(())
    }
}

/// A validated claim submission.
#[derive(Debug, Clone)]
pub struct SubmitClaim {
    pub chain: ChainId,
    pub token: TokenAddress,
    pub submitter: UserId,
    pub profile: ProfileFields,
    pub media: MediaRefs,
    pub evidence: ProofEvidence,
}

/// Orchestrates the claim lifecycle over a [`ClaimStore`].
pub struct ApprovalCoordinator {
    store: Arc<dyn ClaimStore>,
    evaluator: ProofEvaluator,
    publisher: Arc<dyn ProfilePublisher>,
    policy: ConsensusPolicy,
    retry: RetryConfig,
}

impl ApprovalCoordinator {
    pub fn new(
        store: Arc<dyn ClaimStore>,
        evaluator: ProofEvaluator,
        publisher: Arc<dyn ProfilePublisher>,
        policy: ConsensusPolicy,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            evaluator,
            publisher,
            policy,
            retry,
        }
    }

    pub fn store(&self) -> &Arc<dyn ClaimStore> {
        &self.store
    }

    /// Create a claim and run the initial evidence evaluation.
    ///
    /// A passed evaluation auto-advances the claim to UnderReview with an
    /// implicit system approval. A failed one only flags the claim; an
    /// explicit human reject is always required, so a transient DNS
    /// hiccup can never kill a legitimate claim. Evaluator exhaustion
    /// degrades to `Unverified` and the submission still succeeds.
    pub async fn submit(&self, input: SubmitClaim) -> Result<Claim, ClaimError> {
        let challenge = Challenge::generate(&input.evidence, &input.token, &input.submitter);
        let claim = Claim::new(
            input.chain,
            input.token,
            input.submitter,
            input.profile,
            input.media,
            input.evidence,
            challenge,
        );
        let claim = self.store.create(claim).await?;
        tracing::info!(
            claim_id = %claim.id,
            token = %claim.token_key(),
            submitter = %claim.submitter,
            strategy = %claim.proof.evidence.strategy(),
            "claim submitted"
        );

        let evaluation = match self.evaluate_with_retry(&claim).await {
            Ok(evaluation) => evaluation,
            Err(ClaimError::EvaluatorUnavailable(reason)) => {
                tracing::warn!(claim_id = %claim.id, reason = %reason, "initial evaluation degraded to unverified");
                Evaluation::unverified(format!("evaluator unavailable: {}", reason))
            }
            Err(err) => return Err(err),
        };

        match self.apply_evaluation(claim.id, evaluation).await {
            Ok(updated) => {
                if updated.status == ClaimStatus::Approved {
                    self.publish(&updated).await;
                }
                Ok(updated)
            }
            // A racing approver may have decided the claim between
            // creation and evaluation; the terminal record wins.
            Err(ClaimError::StaleState { .. }) => self.store.get(claim.id).await,
            Err(err) => Err(err),
        }
    }

    /// Record an approver's approve decision and recompute consensus.
    pub async fn approve(&self, id: Uuid, approver: UserId) -> Result<Claim, ClaimError> {
        let policy = self.policy.clone();
        let decider = approver.clone();
        let updated = self
            .store
            .update(
                id,
                Box::new(move |claim| {
                    if claim.status.is_terminal() {
                        return Err(ClaimError::StaleState {
                            id: claim.id,
                            status: claim.status,
                        });
                    }
                    claim.record_decision(decider, Decision::Approve);
                    recompute_consensus(claim, &policy)
                }),
            )
            .await?;

        tracing::info!(
            claim_id = %id,
            approver = %approver,
            approvals = updated.approve_count(),
            status = %updated.status,
            "approve recorded"
        );

        if updated.status == ClaimStatus::Approved {
            self.publish(&updated).await;
        }
        Ok(updated)
    }

    /// Record a reject decision. One veto is terminal; rejecting an
    /// already-rejected claim is an idempotent no-op.
    pub async fn reject(&self, id: Uuid, approver: UserId) -> Result<Claim, ClaimError> {
        let decider = approver.clone();
        let updated = self
            .store
            .update(
                id,
                Box::new(move |claim| match claim.status {
                    ClaimStatus::Rejected => Ok(()),
                    ClaimStatus::Approved => Err(ClaimError::StaleState {
                        id: claim.id,
                        status: claim.status,
                    }),
                    _ => {
                        claim.record_decision(decider, Decision::Reject);
                        claim.status =
                            ClaimStateMachine::transition(claim.status, ClaimEvent::Rejected)?;
                        claim.decided_at = Some(Utc::now());
                        Ok(())
                    }
                }),
            )
            .await?;

        tracing::info!(claim_id = %id, approver = %approver, "claim rejected");
        Ok(updated)
    }

    /// Re-run evidence evaluation on an active claim: the path a DNS
    /// submitter takes after publishing the TXT record. A fresh `Passed`
    /// may auto-advance the claim and lower its consensus threshold.
    pub async fn reevaluate(&self, id: Uuid) -> Result<Claim, ClaimError> {
        let claim = self.store.get(id).await?;
        if claim.status.is_terminal() {
            return Err(ClaimError::StaleState {
                id: claim.id,
                status: claim.status,
            });
        }

        let evaluation = match self.evaluate_with_retry(&claim).await {
            Ok(evaluation) => evaluation,
            Err(ClaimError::EvaluatorUnavailable(reason)) => {
                // Persist the degradation for the audit trail, then tell
                // the caller this is retryable.
                let unverified =
                    Evaluation::unverified(format!("evaluator unavailable: {}", reason));
                self.apply_evaluation(id, unverified).await?;
                return Err(ClaimError::EvaluatorUnavailable(reason));
            }
            Err(err) => return Err(err),
        };

        let updated = self.apply_evaluation(id, evaluation).await?;
        if updated.status == ClaimStatus::Approved {
            self.publish(&updated).await;
        }
        Ok(updated)
    }

    /// Run the evaluator with the configured timeout and retry budget.
    /// Only transient collaborator failures are retried.
    async fn evaluate_with_retry(&self, claim: &Claim) -> Result<Evaluation, ClaimError> {
        let timeout = Duration::from_millis(self.retry.eval_timeout_ms);
        let mut last_reason = String::from("no attempts made");

        for attempt in 1..=self.retry.max_attempts {
            match tokio::time::timeout(timeout, self.evaluator.evaluate(claim)).await {
                Ok(Ok(evaluation)) => return Ok(evaluation),
                Ok(Err(err)) => {
                    last_reason = err.to_string();
                    tracing::warn!(
                        claim_id = %claim.id,
                        attempt,
                        error = %err,
                        "evaluator attempt failed"
                    );
                }
                Err(_) => {
                    last_reason = "evaluation timed out".into();
                    tracing::warn!(claim_id = %claim.id, attempt, "evaluator attempt timed out");
                }
            }
            if attempt < self.retry.max_attempts {
                tokio::time::sleep(Duration::from_millis(
                    self.retry.backoff_ms * u64::from(attempt),
                ))
                .await;
            }
        }

        Err(ClaimError::EvaluatorUnavailable(format!(
            "{} attempts exhausted: {}",
            self.retry.max_attempts, last_reason
        )))
    }

    /// Atomically apply an evaluation result: refresh the proof record,
    /// auto-advance on a pass, and recompute consensus under the
    /// possibly-changed threshold.
    async fn apply_evaluation(
        &self,
        id: Uuid,
        evaluation: Evaluation,
    ) -> Result<Claim, ClaimError> {
        let policy = self.policy.clone();
        self.store
            .update(
                id,
                Box::new(move |claim| {
                    if claim.status.is_terminal() {
                        return Err(ClaimError::StaleState {
                            id: claim.id,
                            status: claim.status,
                        });
                    }
                    let outcome = evaluation.outcome;
                    claim.apply_evaluation(evaluation);
                    if outcome == EvaluationOutcome::Passed
                        && claim.status == ClaimStatus::Pending
                    {
                        claim.status = ClaimStateMachine::transition(
                            claim.status,
                            ClaimEvent::EvidencePassed,
                        )?;
                        claim.record_system_approval();
                        tracing::info!(
                            claim_id = %claim.id,
                            "evidence passed; claim advanced to review"
                        );
                    }
                    recompute_consensus(claim, &policy)
                }),
            )
            .await
    }

    async fn publish(&self, claim: &Claim) {
        match self.publisher.publish(claim).await {
            Ok(()) => {
                tracing::info!(
                    claim_id = %claim.id,
                    token = %claim.token_key(),
                    "approved claim published to the token profile read path"
                );
            }
            Err(err) => {
                // The approval stands; the read path can re-pull the
                // terminal claim.
                tracing::warn!(claim_id = %claim.id, error = %err, "profile publication failed");
            }
        }
    }
}

/// Transition to Approved when distinct human approvals reach the
/// policy threshold. Runs inside the claim's critical section.
fn recompute_consensus(claim: &mut Claim, policy: &ConsensusPolicy) -> Result<(), ClaimError> {
    let required = policy.required_approvals(claim);
    if claim.status.is_active() && claim.approve_count() >= required {
        claim.status = ClaimStateMachine::transition(claim.status, ClaimEvent::ConsensusReached)?;
        claim.decided_at = Some(Utc::now());
        tracing::info!(
            claim_id = %claim.id,
            approvals = claim.approve_count(),
            required,
            "consensus reached; claim approved"
        );
    }
    Ok(())
}
