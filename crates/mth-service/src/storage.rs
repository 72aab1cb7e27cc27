//! RocksDB-backed claim store.
//!
//! Claims are JSON values in the `claims` column family; two index
//! families back the natural-key invariant and the per-submitter
//! listing. Per-claim mutual exclusion comes from a lock table keyed by
//! claim id, and creations are serialized so the active-claim check and
//! insert are atomic.

use async_trait::async_trait;
use dashmap::DashMap;
use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, DB};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use mth_claims::{Claim, ClaimError, ClaimStore};
use mth_core::{TokenKey, UserId};
use mth_claims::store::Mutator;

/// Column family names.
const CF_CLAIMS: &str = "claims";
const CF_ACTIVE: &str = "claims_active";
const CF_BY_SUBMITTER: &str = "claims_by_submitter";

/// Durable claim store on RocksDB.
pub struct RocksClaimStore {
    db: DB,
    /// Per-claim critical sections.
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
    /// Serializes the C1 check-and-insert on creation.
    create_lock: Mutex<()>,
}

impl RocksClaimStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_CLAIMS, Options::default()),
            ColumnFamilyDescriptor::new(CF_ACTIVE, Options::default()),
            ColumnFamilyDescriptor::new(CF_BY_SUBMITTER, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;

        Ok(Self {
            db,
            locks: DashMap::new(),
            create_lock: Mutex::new(()),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily, ClaimError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| ClaimError::Storage(format!("column family '{}' not found", name)))
    }

    fn active_key(key: &TokenKey) -> Vec<u8> {
        key.to_string().into_bytes()
    }

    fn submitter_key(submitter: &UserId, id: Uuid) -> Vec<u8> {
        format!("{}/{}", submitter, id).into_bytes()
    }

    fn write_claim(&self, claim: &Claim) -> Result<(), ClaimError> {
        let cf = self.cf(CF_CLAIMS)?;
        let bytes = serde_json::to_vec(claim)
            .map_err(|e| ClaimError::Storage(format!("claim serialization: {}", e)))?;
        self.db
            .put_cf(cf, claim.id.to_string().as_bytes(), bytes)
            .map_err(|e| ClaimError::Storage(e.to_string()))
    }

    fn read_claim(&self, id: Uuid) -> Result<Option<Claim>, ClaimError> {
        let cf = self.cf(CF_CLAIMS)?;
        let value = self
            .db
            .get_cf(cf, id.to_string().as_bytes())
            .map_err(|e| ClaimError::Storage(e.to_string()))?;
        match value {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| ClaimError::Storage(format!("claim deserialization: {}", e))),
            None => Ok(None),
        }
    }

    fn read_active(&self, key: &TokenKey) -> Result<Option<Uuid>, ClaimError> {
        let cf = self.cf(CF_ACTIVE)?;
        let value = self
            .db
            .get_cf(cf, Self::active_key(key))
            .map_err(|e| ClaimError::Storage(e.to_string()))?;
        match value {
            Some(bytes) => {
                let text = String::from_utf8(bytes)
                    .map_err(|e| ClaimError::Storage(format!("active index: {}", e)))?;
                Uuid::parse_str(&text)
                    .map(Some)
                    .map_err(|e| ClaimError::Storage(format!("active index: {}", e)))
            }
            None => Ok(None),
        }
    }

    fn claim_lock(&self, id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }
}

#[async_trait]
impl ClaimStore for RocksClaimStore {
    async fn create(&self, claim: Claim) -> Result<Claim, ClaimError> {
        let _guard = self.create_lock.lock().await;

        let key = claim.token_key();
        if let Some(existing_id) = self.read_active(&key)? {
            let existing_active = self
                .read_claim(existing_id)?
                .map(|c| c.status.is_active())
                .unwrap_or(false);
            if existing_active {
                return Err(ClaimError::Conflict(format!(
                    "active claim {} already exists for {}",
                    existing_id, key
                )));
            }
        }

        self.write_claim(&claim)?;
        let active_cf = self.cf(CF_ACTIVE)?;
        self.db
            .put_cf(
                active_cf,
                Self::active_key(&key),
                claim.id.to_string().as_bytes(),
            )
            .map_err(|e| ClaimError::Storage(e.to_string()))?;
        let submitter_cf = self.cf(CF_BY_SUBMITTER)?;
        self.db
            .put_cf(
                submitter_cf,
                Self::submitter_key(&claim.submitter, claim.id),
                claim.id.to_string().as_bytes(),
            )
            .map_err(|e| ClaimError::Storage(e.to_string()))?;

        Ok(claim)
    }

    async fn get(&self, id: Uuid) -> Result<Claim, ClaimError> {
        self.read_claim(id)?.ok_or(ClaimError::NotFound(id))
    }

    async fn list_by_submitter(&self, submitter: &UserId) -> Result<Vec<Claim>, ClaimError> {
        let cf = self.cf(CF_BY_SUBMITTER)?;
        let prefix = format!("{}/", submitter).into_bytes();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));

        let mut claims = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| ClaimError::Storage(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let text = String::from_utf8(value.to_vec())
                .map_err(|e| ClaimError::Storage(format!("submitter index: {}", e)))?;
            let id = Uuid::parse_str(&text)
                .map_err(|e| ClaimError::Storage(format!("submitter index: {}", e)))?;
            if let Some(claim) = self.read_claim(id)? {
                claims.push(claim);
            }
        }
        claims.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(claims)
    }

    async fn list_pending_approval(&self) -> Result<Vec<Claim>, ClaimError> {
        let cf = self.cf(CF_CLAIMS)?;
        let mut claims = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item.map_err(|e| ClaimError::Storage(e.to_string()))?;
            let claim: Claim = serde_json::from_slice(&value)
                .map_err(|e| ClaimError::Storage(format!("claim deserialization: {}", e)))?;
            if claim.status.is_active() {
                claims.push(claim);
            }
        }
        claims.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(claims)
    }

    async fn update(&self, id: Uuid, mutator: Mutator) -> Result<Claim, ClaimError> {
        let lock = self.claim_lock(id);
        let _guard = lock.lock().await;

        let mut claim = self.read_claim(id)?.ok_or(ClaimError::NotFound(id))?;
        mutator(&mut claim)?;
        claim.version += 1;
        self.write_claim(&claim)?;

        if claim.status.is_terminal() {
            let key = claim.token_key();
            // Release the natural key only if it still points at this claim.
            if self.read_active(&key)? == Some(id) {
                let cf = self.cf(CF_ACTIVE)?;
                self.db
                    .delete_cf(cf, Self::active_key(&key))
                    .map_err(|e| ClaimError::Storage(e.to_string()))?;
            }
        }

        Ok(claim)
    }
}
