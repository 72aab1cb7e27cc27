//! The claim service facade.
//!
//! Validates request shape before any state changes, enforces the
//! approver roster, attaches a correlation id to every request, and
//! narrows what each caller class gets to see: evidence internals (raw
//! signatures, decision history) are approver-only, while submitters
//! keep access to the challenge they must satisfy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use mth_claims::{
    ApprovalCoordinator, Approval, Challenge, Claim, ClaimError, ClaimStore, Evaluation,
    MediaRefs, ProfileFields, ProofEvidence, ProofStrategy, SubmitClaim,
};
use mth_core::{ChainId, ClaimStatus, TokenAddress, UserId};

/// Facade-level errors. Domain errors pass through unchanged, tagged
/// with the request's correlation id.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{source}")]
    Domain {
        correlation_id: Uuid,
        #[source]
        source: ClaimError,
    },

    #[error("caller '{caller}' is not a designated approver")]
    Forbidden { correlation_id: Uuid, caller: String },
}

impl ServiceError {
    pub fn correlation_id(&self) -> Uuid {
        match self {
            Self::Domain { correlation_id, .. } => *correlation_id,
            Self::Forbidden { correlation_id, .. } => *correlation_id,
        }
    }

    /// The underlying domain error, when there is one.
    pub fn domain(&self) -> Option<&ClaimError> {
        match self {
            Self::Domain { source, .. } => Some(source),
            Self::Forbidden { .. } => None,
        }
    }
}

/// A claim submission as it arrives on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitClaimRequest {
    pub chain: String,
    pub token_address: String,
    #[serde(default)]
    pub profile: ProfileFields,
    #[serde(default)]
    pub media: MediaRefs,
    pub proof: ProofEvidence,
}

/// Caller-scoped projection of a claim.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimView {
    pub id: Uuid,
    pub chain: String,
    pub token_address: String,
    pub submitter: String,
    pub status: ClaimStatus,
    pub strategy: ProofStrategy,
    pub profile: ProfileFields,
    pub media: MediaRefs,
    /// The artifact the submitter must satisfy (e.g. the TXT record to
    /// publish); visible to both caller classes.
    pub challenge: Challenge,
    pub evaluation: Evaluation,
    /// Raw evidence. Approver-only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<ProofEvidence>,
    /// Decision history. Approver-only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approvals: Option<Vec<Approval>>,
    /// Failed-evidence flag. Approver-only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_reject_candidate: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl ClaimView {
    fn base(claim: &Claim) -> Self {
        Self {
            id: claim.id,
            chain: claim.chain.as_str().to_string(),
            token_address: claim.token.as_str().to_string(),
            submitter: claim.submitter.as_str().to_string(),
            status: claim.status,
            strategy: claim.proof.evidence.strategy(),
            profile: claim.profile.clone(),
            media: claim.media.clone(),
            challenge: claim.proof.challenge.clone(),
            evaluation: claim.proof.evaluation.clone(),
            evidence: None,
            approvals: None,
            auto_reject_candidate: None,
            created_at: claim.created_at,
            decided_at: claim.decided_at,
            version: claim.version,
        }
    }

    pub fn for_submitter(claim: &Claim) -> Self {
        Self::base(claim)
    }

    pub fn for_approver(claim: &Claim) -> Self {
        Self {
            evidence: Some(claim.proof.evidence.clone()),
            approvals: Some(claim.approvals.clone()),
            auto_reject_candidate: Some(claim.auto_reject_candidate),
            ..Self::base(claim)
        }
    }
}

/// The claim service: the one entry point the HTTP layer talks to.
pub struct ClaimService {
    coordinator: Arc<ApprovalCoordinator>,
    store: Arc<dyn ClaimStore>,
    approvers: HashSet<String>,
}

impl ClaimService {
    pub fn new(
        coordinator: Arc<ApprovalCoordinator>,
        store: Arc<dyn ClaimStore>,
        approvers: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            coordinator,
            store,
            approvers: approvers.into_iter().collect(),
        }
    }

    pub fn is_approver(&self, caller: &str) -> bool {
        self.approvers.contains(caller)
    }

    /// Validate and submit a new claim on behalf of `caller`.
    pub async fn submit_claim(
        &self,
        request: SubmitClaimRequest,
        caller: &str,
    ) -> Result<ClaimView, ServiceError> {
        let correlation_id = Uuid::now_v7();
        let submitter = UserId::new(caller).map_err(|e| domain(correlation_id, e.into()))?;
        validate_request(&request).map_err(|e| domain(correlation_id, e))?;

        let chain = ChainId::new(&request.chain).map_err(|e| domain(correlation_id, e.into()))?;
        let token = TokenAddress::new(&request.token_address)
            .map_err(|e| domain(correlation_id, e.into()))?;

        let claim = self
            .coordinator
            .submit(SubmitClaim {
                chain,
                token,
                submitter,
                profile: request.profile,
                media: request.media,
                evidence: request.proof,
            })
            .await
            .map_err(|e| domain(correlation_id, e))?;

        tracing::info!(%correlation_id, claim_id = %claim.id, "claim accepted");
        Ok(ClaimView::for_submitter(&claim))
    }

    /// Record an approve decision by a designated approver.
    pub async fn approve(&self, id: Uuid, caller: &str) -> Result<ClaimView, ServiceError> {
        let correlation_id = Uuid::now_v7();
        let approver = self.require_approver(correlation_id, caller)?;
        let claim = self
            .coordinator
            .approve(id, approver)
            .await
            .map_err(|e| domain(correlation_id, e))?;
        tracing::info!(%correlation_id, claim_id = %id, status = %claim.status, "approve applied");
        Ok(ClaimView::for_approver(&claim))
    }

    /// Record a reject decision by a designated approver.
    pub async fn reject(&self, id: Uuid, caller: &str) -> Result<ClaimView, ServiceError> {
        let correlation_id = Uuid::now_v7();
        let approver = self.require_approver(correlation_id, caller)?;
        let claim = self
            .coordinator
            .reject(id, approver)
            .await
            .map_err(|e| domain(correlation_id, e))?;
        tracing::info!(%correlation_id, claim_id = %id, status = %claim.status, "reject applied");
        Ok(ClaimView::for_approver(&claim))
    }

    /// Re-run evidence evaluation. Open to the claim's submitter (the
    /// DNS set-the-record-then-recheck path) and to approvers.
    pub async fn reevaluate(&self, id: Uuid, caller: &str) -> Result<ClaimView, ServiceError> {
        let correlation_id = Uuid::now_v7();
        let claim = self
            .store
            .get(id)
            .await
            .map_err(|e| domain(correlation_id, e))?;

        let is_approver = self.is_approver(caller);
        if !is_approver && claim.submitter.as_str() != caller {
            return Err(ServiceError::Forbidden {
                correlation_id,
                caller: caller.to_string(),
            });
        }

        let updated = self
            .coordinator
            .reevaluate(id)
            .await
            .map_err(|e| domain(correlation_id, e))?;
        Ok(if is_approver {
            ClaimView::for_approver(&updated)
        } else {
            ClaimView::for_submitter(&updated)
        })
    }

    /// Fetch one claim with caller-appropriate visibility.
    pub async fn get_claim(&self, id: Uuid, caller: &str) -> Result<ClaimView, ServiceError> {
        let correlation_id = Uuid::now_v7();
        let claim = self
            .store
            .get(id)
            .await
            .map_err(|e| domain(correlation_id, e))?;

        if self.is_approver(caller) {
            Ok(ClaimView::for_approver(&claim))
        } else if claim.submitter.as_str() == caller {
            Ok(ClaimView::for_submitter(&claim))
        } else {
            Err(ServiceError::Forbidden {
                correlation_id,
                caller: caller.to_string(),
            })
        }
    }

    /// All claims the caller has submitted.
    pub async fn list_my_claims(&self, caller: &str) -> Result<Vec<ClaimView>, ServiceError> {
        let correlation_id = Uuid::now_v7();
        let submitter = UserId::new(caller).map_err(|e| domain(correlation_id, e.into()))?;
        let claims = self
            .store
            .list_by_submitter(&submitter)
            .await
            .map_err(|e| domain(correlation_id, e))?;
        Ok(claims.iter().map(ClaimView::for_submitter).collect())
    }

    /// All claims awaiting a decision, for the approver queue.
    pub async fn list_pending_for_approver(
        &self,
        caller: &str,
    ) -> Result<Vec<ClaimView>, ServiceError> {
        let correlation_id = Uuid::now_v7();
        self.require_approver(correlation_id, caller)?;
        let claims = self
            .store
            .list_pending_approval()
            .await
            .map_err(|e| domain(correlation_id, e))?;
        Ok(claims.iter().map(ClaimView::for_approver).collect())
    }

    fn require_approver(
        &self,
        correlation_id: Uuid,
        caller: &str,
    ) -> Result<UserId, ServiceError> {
        if !self.is_approver(caller) {
            return Err(ServiceError::Forbidden {
                correlation_id,
                caller: caller.to_string(),
            });
        }
        UserId::new(caller).map_err(|e| domain(correlation_id, e.into()))
    }
}

fn domain(correlation_id: Uuid, source: ClaimError) -> ServiceError {
    ServiceError::Domain {
        correlation_id,
        source,
    }
}

/// Per-strategy required fields and URL-shape checks. Rejected requests
/// never reach the coordinator, so no state changes.
fn validate_request(request: &SubmitClaimRequest) -> Result<(), ClaimError> {
    match &request.proof {
        ProofEvidence::SignedMessage { signature, .. } => {
            if signature.trim().is_empty() {
                return Err(ClaimError::Validation(
                    "signed_message proof requires a signature".into(),
                ));
            }
        }
        ProofEvidence::DnsTxtRecord { domain } => {
            let domain = domain.trim();
            if domain.is_empty() {
                return Err(ClaimError::Validation(
                    "dns_txt_record proof requires a domain".into(),
                ));
            }
            if !domain.contains('.')
                || domain.contains("://")
                || domain.chars().any(char::is_whitespace)
            {
                return Err(ClaimError::Validation(format!(
                    "'{}' is not a plausible domain name",
                    domain
                )));
            }
        }
        ProofEvidence::SocialPost { post_url } => {
            if !is_http_url(post_url) {
                return Err(ClaimError::Validation(
                    "social_post proof requires an http(s) post URL".into(),
                ));
            }
        }
    }

    for (name, value) in request.profile.url_fields() {
        if !is_http_url(value) {
            return Err(ClaimError::Validation(format!(
                "profile field '{}' must be an http(s) URL",
                name
            )));
        }
    }

    Ok(())
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    matches!(rest, Some(rest) if !rest.is_empty() && !rest.chars().any(char::is_whitespace))
}
