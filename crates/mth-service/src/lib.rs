//! Memetoken Hub claim service.
//!
//! Wires the claim workflow (`mth-claims`) to the outside world: TOML
//! configuration, a RocksDB-backed claim store, outbound collaborator
//! clients (DNS-over-HTTPS, profile publication), the service facade
//! with caller authorization, and the HTTP API.

pub mod api;
pub mod collaborators;
pub mod config;
pub mod service;
pub mod storage;

pub use config::MthConfig;
pub use service::{ClaimService, ClaimView, ServiceError, SubmitClaimRequest};
pub use storage::RocksClaimStore;
