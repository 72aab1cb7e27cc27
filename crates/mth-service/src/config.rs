//! Service configuration loading and management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Full configuration for the claim service.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MthConfig {
    /// API server settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Approver roster and consensus thresholds.
    #[serde(default)]
    pub approvals: ApprovalConfig,

    /// Proof verification collaborator settings.
    #[serde(default)]
    pub verification: VerificationConfig,

    /// Token-profile read path publication.
    #[serde(default)]
    pub publish: PublishConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API listen address.
    #[serde(default = "default_api_addr")]
    pub listen_addr: String,
    /// API port.
    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the data directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Caller ids allowed to approve or reject claims.
    #[serde(default)]
    pub approvers: Vec<String>,
    /// Approvals required for claims with passed automated evidence.
    #[serde(default = "default_verified_threshold")]
    pub verified_threshold: u32,
    /// Approvals required for everything else (social tier).
    #[serde(default = "default_unverified_threshold")]
    pub unverified_threshold: u32,
}

/// A token's recorded on-chain authority, as exported by the indexer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityEntry {
    pub chain: String,
    pub token: String,
    pub authority: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// DNS-over-HTTPS endpoint for TXT lookups.
    #[serde(default = "default_doh_url")]
    pub doh_url: String,
    /// Per-lookup timeout.
    #[serde(default = "default_dns_timeout_ms")]
    pub dns_timeout_ms: u64,
    /// Evaluator retry budget.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base backoff between evaluator attempts.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Per-attempt ceiling on evaluator wall time.
    #[serde(default = "default_eval_timeout_ms")]
    pub eval_timeout_ms: u64,
    /// Recorded token authorities for the signed-message tier.
    #[serde(default)]
    pub authorities: Vec<AuthorityEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PublishConfig {
    /// Endpoint that receives approved claim profiles. When unset,
    /// publication is a no-op (the read path pulls terminal claims).
    #[serde(default)]
    pub profile_endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_api_addr() -> String {
    "127.0.0.1".into()
}
fn default_api_port() -> u16 {
    8080
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_verified_threshold() -> u32 {
    1
}
fn default_unverified_threshold() -> u32 {
    2
}
fn default_doh_url() -> String {
    "https://cloudflare-dns.com/dns-query".into()
}
fn default_dns_timeout_ms() -> u64 {
    3_000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    250
}
fn default_eval_timeout_ms() -> u64 {
    5_000
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_api_addr(),
            port: default_api_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            approvers: Vec::new(),
            verified_threshold: default_verified_threshold(),
            unverified_threshold: default_unverified_threshold(),
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            doh_url: default_doh_url(),
            dns_timeout_ms: default_dns_timeout_ms(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            eval_timeout_ms: default_eval_timeout_ms(),
            authorities: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl MthConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: MthConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// The full API socket address string.
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api.listen_addr, self.api.port)
    }
}
