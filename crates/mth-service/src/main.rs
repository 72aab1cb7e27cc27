//! Memetoken Hub claim service — entry point.
//!
//! Starts the claim API with configuration from a TOML file or defaults.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use mth_claims::{
    ApprovalCoordinator, ClaimStore, ConsensusPolicy, Ed25519SignatureVerifier, NoopPublisher,
    ProfilePublisher, ProofEvaluator, RetryConfig,
};
use mth_core::{ChainId, CoreError, TokenAddress, TokenKey};
use mth_service::api::start_api_server;
use mth_service::collaborators::{DohTxtResolver, HttpProfilePublisher, StaticAuthorityDirectory};
use mth_service::config::MthConfig;
use mth_service::service::ClaimService;
use mth_service::storage::RocksClaimStore;

/// Memetoken Hub claim service
#[derive(Parser, Debug)]
#[command(name = "mth-service", version, about = "Memetoken Hub claim service")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "mth.toml")]
    config: PathBuf,

    /// Override the API port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Generate a default config file and exit.
    #[arg(long)]
    init: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    // Handle --init flag
    if args.init {
        let config = MthConfig::default();
        config.save(&args.config)?;
        tracing::info!(path = %args.config.display(), "wrote default config");
        return Ok(());
    }

    // Load configuration
    let mut config = MthConfig::load(&args.config)?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(ref data_dir) = args.data_dir {
        config.storage.data_dir = data_dir.clone();
    }
    config.logging.level = args.log_level;

    tracing::info!("Memetoken Hub claim service v{}", env!("CARGO_PKG_VERSION"));

    if config.approvals.approvers.is_empty() {
        tracing::warn!("no approvers configured; submitted claims cannot be decided");
    }

    // Durable claim store
    let store: Arc<dyn ClaimStore> = Arc::new(RocksClaimStore::open(&config.storage.data_dir)?);

    // Verification collaborators
    let authorities = config
        .verification
        .authorities
        .iter()
        .map(|entry| {
            Ok((
                TokenKey::new(ChainId::new(&entry.chain)?, TokenAddress::new(&entry.token)?),
                entry.authority.clone(),
            ))
        })
        .collect::<Result<Vec<_>, CoreError>>()?;

    let resolver = DohTxtResolver::new(
        config.verification.doh_url.clone(),
        Duration::from_millis(config.verification.dns_timeout_ms),
    )?;

    let evaluator = ProofEvaluator::new(
        Arc::new(StaticAuthorityDirectory::new(authorities)),
        Arc::new(Ed25519SignatureVerifier),
        Arc::new(resolver),
    );

    // Token-profile read path
    let publisher: Arc<dyn ProfilePublisher> = match &config.publish.profile_endpoint {
        Some(endpoint) => Arc::new(HttpProfilePublisher::new(
            endpoint.clone(),
            Duration::from_secs(10),
        )?),
        None => Arc::new(NoopPublisher),
    };

    let policy = ConsensusPolicy::new(
        config.approvals.verified_threshold,
        config.approvals.unverified_threshold,
    );
    let retry = RetryConfig {
        max_attempts: config.verification.max_attempts,
        backoff_ms: config.verification.backoff_ms,
        eval_timeout_ms: config.verification.eval_timeout_ms,
    };

    let coordinator = Arc::new(ApprovalCoordinator::new(
        Arc::clone(&store),
        evaluator,
        publisher,
        policy,
        retry,
    ));
    let service = Arc::new(ClaimService::new(
        coordinator,
        store,
        config.approvals.approvers.clone(),
    ));

    let listen_addr: SocketAddr = config.api_addr().parse()?;
    start_api_server(listen_addr, service).await?;

    tracing::info!("claim service exited cleanly");
    Ok(())
}
