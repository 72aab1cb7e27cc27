//! Evidence evaluation for the three ownership-proof strategies.
//!
//! The evaluator is a pure function of the claim's proof attempt and
//! externally fetched artifacts (signature verification, DNS TXT
//! lookups). It produces an [`Evaluation`] and never touches claim
//! status; state transitions belong to the coordinator.

use async_trait::async_trait;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use std::sync::Arc;

use mth_core::{ChainId, TokenAddress};

use crate::claim::{canonical_claim_phrase, Challenge, Claim, Evaluation, ProofEvidence};

/// Errors from external verification collaborators.
///
/// `Timeout` and `Unavailable` are transient: the coordinator retries
/// them and ultimately degrades to an `Unverified` evaluation, never to
/// a failed one. `Lookup` is an authoritative negative answer and maps
/// to a `Failed` evaluation.
#[derive(Debug, thiserror::Error)]
pub enum EvaluatorError {
    #[error("collaborator timed out")]
    Timeout,

    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("lookup failed: {0}")]
    Lookup(String),
}

impl EvaluatorError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Unavailable(_))
    }
}

/// Cryptographic signature verification, keyed by the expected signer.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    /// Whether `signature` over `message` was produced by
    /// `expected_signer`. Malformed input is a mismatch (`Ok(false)`),
    /// not an error; errors mean the verification service itself failed.
    async fn verify(
        &self,
        message: &str,
        signature: &str,
        expected_signer: &str,
    ) -> Result<bool, EvaluatorError>;
}

/// Directory of recorded on-chain token authorities.
#[async_trait]
pub trait AuthorityDirectory: Send + Sync {
    /// The authority address recorded for the token, if any.
    async fn token_authority(
        &self,
        chain: &ChainId,
        token: &TokenAddress,
    ) -> Result<Option<String>, EvaluatorError>;
}

/// DNS TXT lookups.
#[async_trait]
pub trait TxtResolver: Send + Sync {
    /// All TXT record strings at `name`. `Err(Lookup)` is an
    /// authoritative failure (NXDOMAIN etc.); `Err(Timeout)` is not.
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, EvaluatorError>;
}

/// Evaluates a claim's proof attempt against one of the three strategies.
pub struct ProofEvaluator {
    authorities: Arc<dyn AuthorityDirectory>,
    signatures: Arc<dyn SignatureVerifier>,
    resolver: Arc<dyn TxtResolver>,
}

impl ProofEvaluator {
    pub fn new(
        authorities: Arc<dyn AuthorityDirectory>,
        signatures: Arc<dyn SignatureVerifier>,
        resolver: Arc<dyn TxtResolver>,
    ) -> Self {
        Self {
            authorities,
            signatures,
            resolver,
        }
    }

    /// Evaluate the claim's evidence. Idempotent and re-runnable; a
    /// transient collaborator failure surfaces as a retryable error
    /// rather than a `Failed` evaluation.
    pub async fn evaluate(&self, claim: &Claim) -> Result<Evaluation, EvaluatorError> {
        match &claim.proof.evidence {
            ProofEvidence::SignedMessage { signature, .. } => {
                let Challenge::Message { message } = &claim.proof.challenge else {
                    return Ok(Evaluation::failed(
                        "challenge does not match the signed-message strategy",
                    ));
                };
                let authority = match self
                    .authorities
                    .token_authority(&claim.chain, &claim.token)
                    .await?
                {
                    Some(authority) => authority,
                    None => {
                        return Ok(Evaluation::failed(format!(
                            "no recorded authority for {}",
                            claim.token_key()
                        )))
                    }
                };
                if self
                    .signatures
                    .verify(message, signature, &authority)
                    .await?
                {
                    Ok(Evaluation::passed(format!(
                        "signature matches the token authority {}",
                        authority
                    )))
                } else {
                    Ok(Evaluation::failed(
                        "signature does not match the token's recorded authority",
                    ))
                }
            }
            ProofEvidence::DnsTxtRecord { .. } => {
                let Challenge::DnsTxt { name, value } = &claim.proof.challenge else {
                    return Ok(Evaluation::failed(
                        "challenge does not match the DNS TXT strategy",
                    ));
                };
                match self.resolver.lookup_txt(name).await {
                    Ok(records) => {
                        if records.iter().any(|record| record == value) {
                            Ok(Evaluation::passed(format!(
                                "TXT record at {} matches the challenge",
                                name
                            )))
                        } else {
                            Ok(Evaluation::failed(format!(
                                "no TXT record at {} matches the challenge",
                                name
                            )))
                        }
                    }
                    Err(EvaluatorError::Lookup(reason)) => Ok(Evaluation::failed(format!(
                        "TXT lookup for {} failed: {}",
                        name, reason
                    ))),
                    // Timeout / unavailability propagates for retry; it
                    // must degrade to Unverified, never to Failed.
                    Err(err) => Err(err),
                }
            }
            ProofEvidence::SocialPost { post_url } => Ok(Evaluation::unverified(format!(
                "manual review required: post at {} must contain \"{}\"",
                post_url,
                canonical_claim_phrase(claim.id)
            ))),
        }
    }
}

/// Built-in signature verification for Ed25519 authorities (hex-encoded
/// 32-byte public key, hex-encoded 64-byte signature). Deployments with
/// chain-specific schemes plug in their own [`SignatureVerifier`].
pub struct Ed25519SignatureVerifier;

impl Ed25519SignatureVerifier {
    fn decode(signature: &str, signer: &str) -> Option<(VerifyingKey, Signature)> {
        let key_bytes = hex::decode(signer.trim().trim_start_matches("0x")).ok()?;
        let key_bytes: [u8; 32] = key_bytes.try_into().ok()?;
        let key = VerifyingKey::from_bytes(&key_bytes).ok()?;

        let sig_bytes = hex::decode(signature.trim().trim_start_matches("0x")).ok()?;
        let sig_bytes: [u8; 64] = sig_bytes.try_into().ok()?;
        Some((key, Signature::from_bytes(&sig_bytes)))
    }
}

#[async_trait]
impl SignatureVerifier for Ed25519SignatureVerifier {
    async fn verify(
        &self,
        message: &str,
        signature: &str,
        expected_signer: &str,
    ) -> Result<bool, EvaluatorError> {
        match Self::decode(signature, expected_signer) {
            Some((key, sig)) => Ok(key.verify(message.as_bytes(), &sig).is_ok()),
            None => Ok(false),
        }
    }
}
