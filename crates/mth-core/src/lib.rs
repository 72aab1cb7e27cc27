//! Memetoken Hub Core — Fundamental types, errors, and the canonical
//! claim lifecycle state machine.

pub mod claim_state;
pub mod error;
pub mod types;

pub use claim_state::{ClaimEvent, ClaimStateMachine, ClaimStatus};
pub use error::CoreError;
pub use types::{ChainId, TokenAddress, TokenKey, UserId};
