//! Memetoken Hub Claims — the token ownership claim workflow.
//!
//! A claim asserts control over an on-chain token's public identity and
//! carries one of three ownership proofs (signed message, DNS TXT record,
//! social post). Claims move through a small state machine driven by
//! automated evidence evaluation and human approver consensus:
//! - claim intake with per-token uniqueness (one active claim per token)
//! - proof evaluation against external collaborators
//! - multi-approver consensus with a single-veto reject rule
//! - audit-retained terminal claims

pub mod claim;
pub mod coordinator;
pub mod error;
pub mod evaluator;
pub mod policy;
pub mod store;

pub use claim::{
    canonical_claim_phrase, signed_message_challenge, Approval, Challenge, Claim, Decision,
    Evaluation, EvaluationOutcome, MediaRefs, ProfileFields, ProofAttempt, ProofEvidence,
    ProofStrategy, SYSTEM_APPROVER,
};
pub use coordinator::{
    ApprovalCoordinator, NoopPublisher, ProfilePublisher, PublishError, RetryConfig, SubmitClaim,
};
pub use error::ClaimError;
pub use evaluator::{
    AuthorityDirectory, Ed25519SignatureVerifier, EvaluatorError, ProofEvaluator,
    SignatureVerifier, TxtResolver,
};
pub use policy::ConsensusPolicy;
pub use store::{ClaimStore, MemoryClaimStore};
