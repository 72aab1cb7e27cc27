//! Integration test: uniqueness, consensus, and concurrency guarantees.
//!
//! Exercises the invariants the workflow is built around: one active
//! claim per token, one decision per approver, single-veto rejection,
//! and race behavior between concurrent approvers.

use std::sync::Arc;

use mth_claims::{ClaimError, ClaimStore, Decision};
use mth_core::ClaimStatus;

use mth_integration_tests::{
    authority_keypair, signed_submission, social_submission, user, TestRig,
};

// =========================================================================
// Invariant C1: one active claim per (chain, token)
// =========================================================================

#[tokio::test]
async fn test_second_active_claim_for_same_token_conflicts() {
    let rig = TestRig::new(None, []);

    rig.coordinator
        .submit(social_submission("mintA", "alice"))
        .await
        .unwrap();

    // Another submitter, same token: rejected at creation time.
    let result = rig
        .coordinator
        .submit(social_submission("mintA", "bob"))
        .await;
    assert!(matches!(result, Err(ClaimError::Conflict(_))));
}

#[tokio::test]
async fn test_resubmission_after_rejection_is_a_new_claim() {
    let rig = TestRig::new(None, []);

    let first = rig
        .coordinator
        .submit(social_submission("mintA", "alice"))
        .await
        .unwrap();
    rig.coordinator
        .reject(first.id, user("mod-1"))
        .await
        .unwrap();

    // There is no reopen: the new submission gets a fresh id and a clean
    // decision history, while the rejected claim stays on record.
    let second = rig
        .coordinator
        .submit(social_submission("mintA", "alice"))
        .await
        .unwrap();
    assert_ne!(second.id, first.id);
    assert_eq!(second.status, ClaimStatus::Pending);
    assert!(second.approvals.is_empty());

    let old = rig.store.get(first.id).await.unwrap();
    assert_eq!(old.status, ClaimStatus::Rejected);
}

// =========================================================================
// Invariant C2: at most one decision per approver
// =========================================================================

#[tokio::test]
async fn test_repeat_approval_by_same_approver_counts_once() {
    let rig = TestRig::new(None, []);

    let claim = rig
        .coordinator
        .submit(social_submission("mintA", "alice"))
        .await
        .unwrap();

    rig.coordinator
        .approve(claim.id, user("mod-1"))
        .await
        .unwrap();
    let after_repeat = rig
        .coordinator
        .approve(claim.id, user("mod-1"))
        .await
        .unwrap();

    // Still one approval, still below the social-tier threshold of two.
    assert_eq!(after_repeat.approve_count(), 1);
    assert_eq!(after_repeat.status, ClaimStatus::Pending);
    assert_eq!(
        after_repeat
            .approvals
            .iter()
            .filter(|a| a.approver == user("mod-1"))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_change_of_mind_overwrites_prior_decision() {
    let rig = TestRig::new(None, []);

    let claim = rig
        .coordinator
        .submit(social_submission("mintA", "alice"))
        .await
        .unwrap();

    rig.coordinator
        .approve(claim.id, user("mod-1"))
        .await
        .unwrap();
    let rejected = rig
        .coordinator
        .reject(claim.id, user("mod-1"))
        .await
        .unwrap();

    // The approver's single slot now holds the reject.
    assert_eq!(rejected.status, ClaimStatus::Rejected);
    assert_eq!(rejected.approvals.len(), 1);
    assert_eq!(rejected.approvals[0].decision, Decision::Reject);
}

// =========================================================================
// Single-veto property
// =========================================================================

#[tokio::test]
async fn test_one_reject_overrides_any_number_of_approvals() {
    let rig = TestRig::new(None, []);

    let claim = rig
        .coordinator
        .submit(social_submission("mintA", "alice"))
        .await
        .unwrap();

    rig.coordinator
        .approve(claim.id, user("mod-1"))
        .await
        .unwrap();

    let rejected = rig
        .coordinator
        .reject(claim.id, user("mod-2"))
        .await
        .unwrap();
    assert_eq!(rejected.status, ClaimStatus::Rejected);

    // No later approval can resurrect a rejected claim.
    let result = rig.coordinator.approve(claim.id, user("mod-3")).await;
    assert!(matches!(result, Err(ClaimError::StaleState { .. })));
    assert_eq!(rig.publisher.count(), 0);
}

#[tokio::test]
async fn test_reject_twice_is_idempotent() {
    let rig = TestRig::new(None, []);

    let claim = rig
        .coordinator
        .submit(social_submission("mintA", "alice"))
        .await
        .unwrap();

    let first = rig
        .coordinator
        .reject(claim.id, user("mod-1"))
        .await
        .unwrap();
    let second = rig
        .coordinator
        .reject(claim.id, user("mod-2"))
        .await
        .unwrap();

    // Same terminal state both times, no error, no second decision.
    assert_eq!(first.status, ClaimStatus::Rejected);
    assert_eq!(second.status, ClaimStatus::Rejected);
    assert_eq!(first.decided_at, second.decided_at);
    assert_eq!(second.approvals.len(), 1);
}

// =========================================================================
// Consensus thresholds per trust tier
// =========================================================================

#[tokio::test]
async fn test_cryptographic_tier_needs_exactly_one_approval() {
    let (key, authority) = authority_keypair();
    let rig = TestRig::new(Some(authority), []);

    let claim = rig
        .coordinator
        .submit(signed_submission("mintA", "alice", &key))
        .await
        .unwrap();

    let approved = rig
        .coordinator
        .approve(claim.id, user("mod-1"))
        .await
        .unwrap();
    assert_eq!(approved.status, ClaimStatus::Approved);
    assert_eq!(approved.approve_count(), 1);
}

#[tokio::test]
async fn test_social_tier_needs_two_distinct_approvals() {
    let rig = TestRig::new(None, []);

    let claim = rig
        .coordinator
        .submit(social_submission("mintA", "alice"))
        .await
        .unwrap();

    let one = rig
        .coordinator
        .approve(claim.id, user("mod-1"))
        .await
        .unwrap();
    assert_eq!(one.status, ClaimStatus::Pending);

    let two = rig
        .coordinator
        .approve(claim.id, user("mod-2"))
        .await
        .unwrap();
    assert_eq!(two.status, ClaimStatus::Approved);
}

// =========================================================================
// Concurrency
// =========================================================================

#[tokio::test]
async fn test_concurrent_approvals_reach_consensus_once() {
    let rig = TestRig::new(None, []);

    let claim = rig
        .coordinator
        .submit(social_submission("mintA", "alice"))
        .await
        .unwrap();

    let c1 = Arc::clone(&rig.coordinator);
    let c2 = Arc::clone(&rig.coordinator);
    let id = claim.id;
    let (r1, r2) = tokio::join!(
        tokio::spawn(async move { c1.approve(id, user("mod-1")).await }),
        tokio::spawn(async move { c2.approve(id, user("mod-2")).await }),
    );

    // Two approves racing are commutative: both are recorded.
    r1.unwrap().unwrap();
    r2.unwrap().unwrap();

    let final_claim = rig.store.get(claim.id).await.unwrap();
    assert_eq!(final_claim.status, ClaimStatus::Approved);
    assert_eq!(final_claim.approve_count(), 2);
    assert!(final_claim.decided_at.is_some());
    // Consensus fired exactly once: one publication.
    assert_eq!(rig.publisher.count(), 1);
}

#[tokio::test]
async fn test_approve_racing_reject_cannot_outlive_the_veto() {
    let rig = TestRig::new(None, []);

    let claim = rig
        .coordinator
        .submit(social_submission("mintA", "alice"))
        .await
        .unwrap();

    let c1 = Arc::clone(&rig.coordinator);
    let c2 = Arc::clone(&rig.coordinator);
    let id = claim.id;
    let (approve_result, reject_result) = tokio::join!(
        tokio::spawn(async move { c1.approve(id, user("mod-1")).await }),
        tokio::spawn(async move { c2.reject(id, user("mod-2")).await }),
    );

    // The reject always lands (it is valid on any active claim and
    // idempotent on a rejected one).
    let rejected = reject_result.unwrap().unwrap();
    assert_eq!(rejected.status, ClaimStatus::Rejected);

    // The approve either applied before the veto (and was recorded) or
    // lost the race and failed with StaleState, never a silent success
    // after the claim went terminal.
    match approve_result.unwrap() {
        Ok(claim) => assert_ne!(claim.status, ClaimStatus::Approved),
        Err(err) => assert!(matches!(err, ClaimError::StaleState { .. })),
    }

    let final_claim = rig.store.get(claim.id).await.unwrap();
    assert_eq!(final_claim.status, ClaimStatus::Rejected);
    assert_eq!(rig.publisher.count(), 0);
}

#[tokio::test]
async fn test_concurrent_submissions_for_same_token_one_wins() {
    let rig = TestRig::new(None, []);

    let c1 = Arc::clone(&rig.coordinator);
    let c2 = Arc::clone(&rig.coordinator);
    let (r1, r2) = tokio::join!(
        tokio::spawn(async move { c1.submit(social_submission("mintA", "alice")).await }),
        tokio::spawn(async move { c2.submit(social_submission("mintA", "bob")).await }),
    );

    let outcomes = [r1.unwrap(), r2.unwrap()];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|r| matches!(r, Err(ClaimError::Conflict(_))))
            .count(),
        1
    );
}
