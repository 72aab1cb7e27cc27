use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use mth_core::{ChainId, ClaimStatus, TokenAddress, TokenKey, UserId};

/// Reserved approver id for the implicit approval the coordinator records
/// when automated evidence evaluation passes. Never counted toward
/// consensus; kept in the approvals list for the audit trail.
pub const SYSTEM_APPROVER: &str = "system";

/// The phrase a social post must contain for approvers to accept it as
/// supporting evidence for the given claim.
pub fn canonical_claim_phrase(claim_id: Uuid) -> String {
    format!("mth-claim:{}", claim_id)
}

/// Proposed public profile for the claimed token. Free-form strings;
/// URL-shaped fields are validated for shape at intake, nothing here is
/// interpreted further by this subsystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFields {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub discord: Option<String>,
    pub telegram: Option<String>,
    pub reddit: Option<String>,
    pub other: Option<String>,
}

impl ProfileFields {
    /// The fields declared to carry URLs, paired with their names for
    /// validation messages. Only fields that are present are returned.
    pub fn url_fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("website", &self.website),
            ("twitter", &self.twitter),
            ("discord", &self.discord),
            ("telegram", &self.telegram),
            ("reddit", &self.reddit),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_deref().map(|v| (name, v)))
        .collect()
    }
}

/// Opaque references to previously uploaded media assets. The storage
/// collaborator owns the bytes; this subsystem only carries the handles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRefs {
    pub banner: Option<String>,
    pub logo: Option<String>,
}

/// The three ownership-proof strategies, ordered by trust tier:
/// cryptographic > infrastructure > social attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofStrategy {
    SignedMessage,
    DnsTxtRecord,
    SocialPost,
}

impl fmt::Display for ProofStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignedMessage => write!(f, "SignedMessage"),
            Self::DnsTxtRecord => write!(f, "DnsTxtRecord"),
            Self::SocialPost => write!(f, "SocialPost"),
        }
    }
}

/// Submitter-supplied proof evidence. A closed variant set: each strategy
/// carries exactly the fields it needs, so "which fields are required for
/// which strategy" is settled by the type, not by runtime convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ProofEvidence {
    /// Signature over the deterministic challenge message, produced by
    /// the token's on-chain authority key. `issued_at` (unix seconds) is
    /// the timestamp the submitter baked into the signed message.
    SignedMessage { signature: String, issued_at: i64 },
    /// Domain to re-check: the TXT record lives at `_mth-claim.<domain>`.
    DnsTxtRecord { domain: String },
    /// URL of a public post containing the canonical claim phrase.
    SocialPost { post_url: String },
}

impl ProofEvidence {
    pub fn strategy(&self) -> ProofStrategy {
        match self {
            Self::SignedMessage { .. } => ProofStrategy::SignedMessage,
            Self::DnsTxtRecord { .. } => ProofStrategy::DnsTxtRecord,
            Self::SocialPost { .. } => ProofStrategy::SocialPost,
        }
    }
}

/// The system-generated artifact evidence is checked against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Challenge {
    /// `"<tokenAddress>:<submitterId>:<issuedAt>"`. Deterministic, so
    /// the submitter can construct and sign it before submitting.
    Message { message: String },
    /// TXT record the submitter must publish: `name` → `value`.
    DnsTxt { name: String, value: String },
    /// SocialPost has no machine challenge; review is manual.
    None,
}

impl Challenge {
    /// Generate the challenge for a piece of evidence.
    ///
    /// The DNS nonce is random per claim; the signed-message challenge is
    /// rebuilt deterministically from claim fields plus the submitter's
    /// `issued_at`.
    pub fn generate(
        evidence: &ProofEvidence,
        token: &TokenAddress,
        submitter: &UserId,
    ) -> Challenge {
        match evidence {
            ProofEvidence::SignedMessage { issued_at, .. } => Challenge::Message {
                message: signed_message_challenge(token, submitter, *issued_at),
            },
            ProofEvidence::DnsTxtRecord { domain } => {
                let nonce: [u8; 16] = rand::thread_rng().gen();
                Challenge::DnsTxt {
                    name: format!("_mth-claim.{}", domain.trim().trim_end_matches('.')),
                    value: format!("mth-verify={}", hex::encode(nonce)),
                }
            }
            ProofEvidence::SocialPost { .. } => Challenge::None,
        }
    }
}

/// The deterministic message a token authority signs to prove ownership.
pub fn signed_message_challenge(
    token: &TokenAddress,
    submitter: &UserId,
    issued_at: i64,
) -> String {
    format!("{}:{}:{}", token, submitter, issued_at)
}

/// Result of evidence evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationOutcome {
    /// Not decidable automatically (social tier, or transient failures).
    Unverified,
    /// Evidence checked out against the challenge.
    Passed,
    /// Evidence contradicts the challenge.
    Failed,
}

impl fmt::Display for EvaluationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unverified => write!(f, "Unverified"),
            Self::Passed => write!(f, "Passed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Outcome plus reason, recomputed each time the evaluator runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub outcome: EvaluationOutcome,
    pub reason: String,
    pub evaluated_at: Option<DateTime<Utc>>,
}

impl Evaluation {
    /// The evaluation a freshly created claim starts with.
    pub fn initial() -> Self {
        Self {
            outcome: EvaluationOutcome::Unverified,
            reason: "not yet evaluated".into(),
            evaluated_at: None,
        }
    }

    pub fn passed(reason: impl Into<String>) -> Self {
        Self {
            outcome: EvaluationOutcome::Passed,
            reason: reason.into(),
            evaluated_at: Some(Utc::now()),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            outcome: EvaluationOutcome::Failed,
            reason: reason.into(),
            evaluated_at: Some(Utc::now()),
        }
    }

    pub fn unverified(reason: impl Into<String>) -> Self {
        Self {
            outcome: EvaluationOutcome::Unverified,
            reason: reason.into(),
            evaluated_at: Some(Utc::now()),
        }
    }
}

/// One proof attempt: strategy-specific evidence, the challenge it is
/// checked against, and the latest evaluation. Immutable except for
/// `evaluation`, which the evaluator may recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofAttempt {
    pub evidence: ProofEvidence,
    pub challenge: Challenge,
    pub evaluation: Evaluation,
}

impl ProofAttempt {
    pub fn new(evidence: ProofEvidence, challenge: Challenge) -> Self {
        Self {
            evidence,
            challenge,
            evaluation: Evaluation::initial(),
        }
    }
}

/// An approver's decision on a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

/// A recorded decision. At most one per approver per claim; a repeat
/// decision by the same approver overwrites the earlier one in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub approver: UserId,
    pub decision: Decision,
    pub decided_at: DateTime<Utc>,
}

/// The central entity: one assertion of control over a token's public
/// identity. Created once, mutated only through the coordinator, never
/// physically deleted; terminal claims are retained for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: Uuid,
    pub chain: ChainId,
    pub token: TokenAddress,
    pub submitter: UserId,
    pub profile: ProfileFields,
    pub media: MediaRefs,
    pub proof: ProofAttempt,
    pub status: ClaimStatus,
    /// Ordered decisions, one per approver (system approval included).
    pub approvals: Vec<Approval>,
    /// Latest evaluation failed; the claim awaits an explicit human
    /// reject. The system never terminates a claim on its own.
    pub auto_reject_candidate: bool,
    pub created_at: DateTime<Utc>,
    /// Set exactly once, when the claim reaches Approved or Rejected.
    pub decided_at: Option<DateTime<Utc>>,
    /// Bumped by the store on every committed update.
    pub version: u64,
}

impl Claim {
    pub fn new(
        chain: ChainId,
        token: TokenAddress,
        submitter: UserId,
        profile: ProfileFields,
        media: MediaRefs,
        evidence: ProofEvidence,
        challenge: Challenge,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            chain,
            token,
            submitter,
            profile,
            media,
            proof: ProofAttempt::new(evidence, challenge),
            status: ClaimStatus::Pending,
            approvals: Vec::new(),
            auto_reject_candidate: false,
            created_at: Utc::now(),
            decided_at: None,
            version: 0,
        }
    }

    /// Natural key for the one-active-claim-per-token invariant.
    pub fn token_key(&self) -> TokenKey {
        TokenKey::new(self.chain.clone(), self.token.clone())
    }

    /// Record or overwrite an approver's decision.
    pub fn record_decision(&mut self, approver: UserId, decision: Decision) {
        let now = Utc::now();
        if let Some(existing) = self.approvals.iter_mut().find(|a| a.approver == approver) {
            existing.decision = decision;
            existing.decided_at = now;
        } else {
            self.approvals.push(Approval {
                approver,
                decision,
                decided_at: now,
            });
        }
    }

    /// Record the implicit system approval that marks an auto-advance.
    pub fn record_system_approval(&mut self) {
        let system = UserId::new(SYSTEM_APPROVER).expect("reserved system approver id");
        self.record_decision(system, Decision::Approve);
    }

    /// Distinct human `Approve` decisions. The system approval is audit
    /// trail only and never counts toward consensus.
    pub fn approve_count(&self) -> u32 {
        self.approvals
            .iter()
            .filter(|a| a.decision == Decision::Approve && a.approver.as_str() != SYSTEM_APPROVER)
            .count() as u32
    }

    /// Whether any approver has vetoed this claim.
    pub fn has_rejection(&self) -> bool {
        self.approvals.iter().any(|a| a.decision == Decision::Reject)
    }

    /// Replace the proof evaluation and refresh the derived
    /// auto-reject flag.
    pub fn apply_evaluation(&mut self, evaluation: Evaluation) {
        self.auto_reject_candidate = evaluation.outcome == EvaluationOutcome::Failed;
        self.proof.evaluation = evaluation;
    }
}
