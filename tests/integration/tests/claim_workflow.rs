//! Integration test: end-to-end claim workflows across proof strategies.
//!
//! Covers the three trust tiers (signed message, DNS TXT record, and
//! social post) including the retryable-DNS path where the submitter
//! publishes the record after submitting.

use mth_claims::{Challenge, ClaimError, ClaimStore, EvaluationOutcome, SYSTEM_APPROVER};
use mth_core::ClaimStatus;

use mth_integration_tests::{
    authority_keypair, dns_submission, signed_submission, social_submission, user, TestRig,
    TxtStep,
};

// =========================================================================
// Signed-message tier: auto-advance plus one human approval
// =========================================================================

#[tokio::test]
async fn test_signed_message_claim_reaches_approved_with_one_approval() {
    let (key, authority) = authority_keypair();
    let rig = TestRig::new(Some(authority), []);

    // Valid signature from the recorded authority → evaluation passes
    // and the claim advances to review with the implicit system approval.
    let claim = rig
        .coordinator
        .submit(signed_submission("mintA", "alice", &key))
        .await
        .unwrap();
    assert_eq!(claim.status, ClaimStatus::UnderReview);
    assert_eq!(claim.proof.evaluation.outcome, EvaluationOutcome::Passed);
    assert_eq!(claim.approvals.len(), 1);
    assert_eq!(claim.approvals[0].approver.as_str(), SYSTEM_APPROVER);
    assert_eq!(claim.approve_count(), 0);

    // One human approval completes consensus for the cryptographic tier.
    let approved = rig.coordinator.approve(claim.id, user("mod-1")).await.unwrap();
    assert_eq!(approved.status, ClaimStatus::Approved);
    assert!(approved.decided_at.is_some());

    // Publication to the token-profile read path happened exactly once.
    assert_eq!(rig.publisher.count(), 1);
}

#[tokio::test]
async fn test_signed_message_from_wrong_key_is_flagged_not_terminated() {
    let (_authority_key, authority) = authority_keypair();
    let (impostor_key, _) = authority_keypair();
    let rig = TestRig::new(Some(authority), []);

    let claim = rig
        .coordinator
        .submit(signed_submission("mintA", "mallory", &impostor_key))
        .await
        .unwrap();

    // Failed evidence flags the claim but never auto-rejects it.
    assert_eq!(claim.status, ClaimStatus::Pending);
    assert_eq!(claim.proof.evaluation.outcome, EvaluationOutcome::Failed);
    assert!(claim.auto_reject_candidate);
    assert!(claim.approvals.is_empty());

    // The explicit human veto is what terminates it.
    let rejected = rig.coordinator.reject(claim.id, user("mod-1")).await.unwrap();
    assert_eq!(rejected.status, ClaimStatus::Rejected);
    assert_eq!(rig.publisher.count(), 0);
}

// =========================================================================
// DNS tier: timeouts degrade, published records pass on re-evaluation
// =========================================================================

#[tokio::test]
async fn test_dns_timeout_leaves_claim_pending_then_reject_is_immediate() {
    let rig = TestRig::new(None, [TxtStep::Timeout]);

    let claim = rig
        .coordinator
        .submit(dns_submission("mintB", "alice", "memetoken.wtf"))
        .await
        .unwrap();

    // Timeout is not a failure: the claim waits for human review.
    assert_eq!(claim.status, ClaimStatus::Pending);
    assert_eq!(claim.proof.evaluation.outcome, EvaluationOutcome::Unverified);
    assert!(!claim.auto_reject_candidate);
    // The retry budget was spent before degrading.
    assert_eq!(rig.resolver.calls(), 2);

    // A single reject is terminal regardless of evaluation state.
    let rejected = rig.coordinator.reject(claim.id, user("mod-1")).await.unwrap();
    assert_eq!(rejected.status, ClaimStatus::Rejected);
    assert!(rejected.decided_at.is_some());
    assert_eq!(rig.publisher.count(), 0);
}

#[tokio::test]
async fn test_dns_record_published_after_submission_passes_on_reevaluate() {
    let rig = TestRig::new(None, [TxtStep::Nxdomain]);

    // The record does not exist yet at submission time.
    let claim = rig
        .coordinator
        .submit(dns_submission("mintB", "alice", "memetoken.wtf"))
        .await
        .unwrap();
    assert_eq!(claim.status, ClaimStatus::Pending);
    assert_eq!(claim.proof.evaluation.outcome, EvaluationOutcome::Failed);
    assert!(claim.auto_reject_candidate);

    // The submitter publishes the challenge value and asks for a recheck.
    let Challenge::DnsTxt { value, .. } = &claim.proof.challenge else {
        panic!("expected a DNS challenge");
    };
    rig.resolver.push(TxtStep::Records(vec![value.clone()]));

    let rechecked = rig.coordinator.reevaluate(claim.id).await.unwrap();
    assert_eq!(rechecked.proof.evaluation.outcome, EvaluationOutcome::Passed);
    assert_eq!(rechecked.status, ClaimStatus::UnderReview);
    assert!(!rechecked.auto_reject_candidate);

    // Passed DNS evidence drops the threshold to one human approval.
    let approved = rig
        .coordinator
        .approve(rechecked.id, user("mod-1"))
        .await
        .unwrap();
    assert_eq!(approved.status, ClaimStatus::Approved);
    assert_eq!(rig.publisher.count(), 1);
}

#[tokio::test]
async fn test_reevaluate_surfaces_evaluator_unavailable_after_budget() {
    let rig = TestRig::new(None, [TxtStep::Unavailable]);

    let claim = rig
        .coordinator
        .submit(dns_submission("mintB", "alice", "memetoken.wtf"))
        .await
        .unwrap();
    assert_eq!(claim.proof.evaluation.outcome, EvaluationOutcome::Unverified);

    // Re-evaluation with the collaborator still down is a retryable error
    // for the caller, and the degraded evaluation is persisted.
    let result = rig.coordinator.reevaluate(claim.id).await;
    match result {
        Err(ClaimError::EvaluatorUnavailable(_)) => {}
        other => panic!("expected EvaluatorUnavailable, got {:?}", other.map(|c| c.status)),
    }

    let stored = rig.store.get(claim.id).await.unwrap();
    assert_eq!(stored.proof.evaluation.outcome, EvaluationOutcome::Unverified);
    assert!(stored.proof.evaluation.reason.contains("unavailable"));
    assert_eq!(stored.status, ClaimStatus::Pending);
}

// =========================================================================
// Social tier: manual review end to end
// =========================================================================

#[tokio::test]
async fn test_social_post_claim_full_manual_flow() {
    let rig = TestRig::new(None, []);

    let claim = rig
        .coordinator
        .submit(social_submission("mintC", "alice"))
        .await
        .unwrap();
    assert_eq!(claim.status, ClaimStatus::Pending);
    assert_eq!(claim.proof.evaluation.outcome, EvaluationOutcome::Unverified);
    // The reviewer gets the canonical phrase to look for in the post.
    assert!(claim
        .proof
        .evaluation
        .reason
        .contains(&format!("mth-claim:{}", claim.id)));

    let one = rig.coordinator.approve(claim.id, user("mod-1")).await.unwrap();
    assert_eq!(one.status, ClaimStatus::Pending);

    let two = rig.coordinator.approve(claim.id, user("mod-2")).await.unwrap();
    assert_eq!(two.status, ClaimStatus::Approved);
    assert_eq!(two.approve_count(), 2);
    assert_eq!(rig.publisher.count(), 1);
}

// =========================================================================
// Terminal-state discipline
// =========================================================================

#[tokio::test]
async fn test_approve_on_approved_claim_is_stale_and_changes_nothing() {
    let (key, authority) = authority_keypair();
    let rig = TestRig::new(Some(authority), []);

    let claim = rig
        .coordinator
        .submit(signed_submission("mintA", "alice", &key))
        .await
        .unwrap();
    let approved = rig.coordinator.approve(claim.id, user("mod-1")).await.unwrap();
    assert_eq!(approved.status, ClaimStatus::Approved);

    let result = rig.coordinator.approve(claim.id, user("mod-2")).await;
    assert!(matches!(result, Err(ClaimError::StaleState { .. })));

    // approvals and decidedAt are untouched by the stale attempt.
    let fetched = rig.store.get(claim.id).await.unwrap();
    assert_eq!(fetched.approvals, approved.approvals);
    assert_eq!(fetched.decided_at, approved.decided_at);
    assert_eq!(fetched.version, approved.version);
    assert_eq!(rig.publisher.count(), 1);
}
