//! Claim storage: the `ClaimStore` contract and the in-memory reference
//! implementation.
//!
//! The store owns two invariants: at most one active claim per
//! `(chain, token)` pair, and per-claim serialized mutation. Mutators are
//! synchronous closures applied inside the claim's critical section, so
//! no I/O ever runs under a claim lock.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use mth_core::{TokenKey, UserId};

use crate::claim::Claim;
use crate::error::ClaimError;

/// A mutation applied to a claim inside its critical section. Returning
/// an error aborts the update; the stored claim is left untouched.
pub type Mutator = Box<dyn FnOnce(&mut Claim) -> Result<(), ClaimError> + Send>;

/// Durable, consistent storage of claims.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// Persist a new claim. Fails with `Conflict` when an active claim
    /// already exists for the same `(chain, token)` pair.
    async fn create(&self, claim: Claim) -> Result<Claim, ClaimError>;

    /// Fetch a claim by id.
    async fn get(&self, id: Uuid) -> Result<Claim, ClaimError>;

    /// All claims created by the given submitter, oldest first.
    async fn list_by_submitter(&self, submitter: &UserId) -> Result<Vec<Claim>, ClaimError>;

    /// All claims still awaiting a decision (Pending or UnderReview),
    /// oldest first.
    async fn list_pending_approval(&self) -> Result<Vec<Claim>, ClaimError>;

    /// Apply a mutation under the claim's lock. The version counter is
    /// bumped on success, and the active-claim index entry is released
    /// when the claim reaches a terminal state.
    async fn update(&self, id: Uuid, mutator: Mutator) -> Result<Claim, ClaimError>;
}

/// In-memory claim store.
///
/// Claims live in a `DashMap` keyed by id; a second map indexes the
/// active claim per token. DashMap's per-entry locking provides the
/// per-claim critical section. Lock order is always index → claims, so
/// the two maps cannot deadlock against each other.
#[derive(Default)]
pub struct MemoryClaimStore {
    claims: DashMap<Uuid, Claim>,
    active: DashMap<TokenKey, Uuid>,
}

impl MemoryClaimStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored claims (terminal ones included).
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

#[async_trait]
impl ClaimStore for MemoryClaimStore {
    async fn create(&self, claim: Claim) -> Result<Claim, ClaimError> {
        let key = claim.token_key();
        match self.active.entry(key.clone()) {
            Entry::Occupied(mut slot) => {
                let existing_id = *slot.get();
                // The index may still point at a claim that has since
                // gone terminal; only a live active claim is a conflict.
                let existing_active = self
                    .claims
                    .get(&existing_id)
                    .map(|entry| entry.value().status.is_active())
                    .unwrap_or(false);
                if existing_active {
                    return Err(ClaimError::Conflict(format!(
                        "active claim {} already exists for {}",
                        existing_id, key
                    )));
                }
                slot.insert(claim.id);
            }
            Entry::Vacant(slot) => {
                slot.insert(claim.id);
            }
        }
        self.claims.insert(claim.id, claim.clone());
        Ok(claim)
    }

    async fn get(&self, id: Uuid) -> Result<Claim, ClaimError> {
        self.claims
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(ClaimError::NotFound(id))
    }

    async fn list_by_submitter(&self, submitter: &UserId) -> Result<Vec<Claim>, ClaimError> {
        let mut claims: Vec<Claim> = self
            .claims
            .iter()
            .filter(|entry| entry.value().submitter == *submitter)
            .map(|entry| entry.value().clone())
            .collect();
        claims.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(claims)
    }

    async fn list_pending_approval(&self) -> Result<Vec<Claim>, ClaimError> {
        let mut claims: Vec<Claim> = self
            .claims
            .iter()
            .filter(|entry| entry.value().status.is_active())
            .map(|entry| entry.value().clone())
            .collect();
        claims.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(claims)
    }

    async fn update(&self, id: Uuid, mutator: Mutator) -> Result<Claim, ClaimError> {
        let updated = {
            let mut entry = self.claims.get_mut(&id).ok_or(ClaimError::NotFound(id))?;
            // Mutate a copy and commit atomically, so an aborted mutator
            // cannot leave a half-applied claim behind.
            let mut working = entry.value().clone();
            mutator(&mut working)?;
            working.version += 1;
            *entry.value_mut() = working.clone();
            working
        };
        if updated.status.is_terminal() {
            self.active
                .remove_if(&updated.token_key(), |_, active_id| *active_id == id);
        }
        Ok(updated)
    }
}
