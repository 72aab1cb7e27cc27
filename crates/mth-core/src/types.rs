use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Identifier of the chain a token lives on (e.g. "solana", "base").
///
/// Stored lowercase and trimmed so that `(chain, token)` comparisons are
/// stable regardless of how the caller spelled it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId(String);

impl ChainId {
    /// Create a chain id, normalizing case and whitespace.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, CoreError> {
        let normalized = raw.as_ref().trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(CoreError::InvalidChainId("chain id is empty".into()));
        }
        Ok(Self(normalized))
    }

    /// Get the normalized chain id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// On-chain address of the token being claimed.
///
/// Opaque to this subsystem beyond being non-empty; address format rules
/// belong to the chain-specific collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenAddress(String);

impl TokenAddress {
    /// Create a token address, trimming surrounding whitespace.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, CoreError> {
        let trimmed = raw.as_ref().trim().to_string();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidTokenAddress(
                "token address is empty".into(),
            ));
        }
        Ok(Self(trimmed))
    }

    /// Get the address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a caller (submitter or approver), issued by the external
/// session provider. This subsystem never mints or refreshes these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Create a user id, trimming surrounding whitespace.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, CoreError> {
        let trimmed = raw.as_ref().trim().to_string();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidUserId("user id is empty".into()));
        }
        Ok(Self(trimmed))
    }

    /// Get the user id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Natural key for claim uniqueness: at most one active claim may exist
/// per `(chain, token address)` pair at any time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenKey {
    pub chain: ChainId,
    pub token: TokenAddress,
}

impl TokenKey {
    pub fn new(chain: ChainId, token: TokenAddress) -> Self {
        Self { chain, token }
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chain, self.token)
    }
}
