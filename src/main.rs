//! Wallet Verifier Service
//!
//! Verifies wallet ownership through a small on-chain payment.
//!
//! ## Overview
//!
//! The service:
//! 1. Accepts verification requests over its REST API and records them as pending
//! 2. Monitors the chain for a payment of the configured amount from each pending
//!    wallet to the collection address
//! 3. Moves matched requests to verified
//! 4. Periodically deletes pending requests whose window has passed

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use wallet_verifier::api::ApiServer;
use wallet_verifier::config::Config;
use wallet_verifier::monitor::{ExpirySweeper, Reconciler};
use wallet_verifier::service::VerificationService;
use wallet_verifier::storage::WalletStore;

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

/// Main application entry point.
///
/// This function:
/// 1. Initializes logging and tracing
/// 2. Loads configuration from TOML file
/// 3. Wires the reconciler, record store and verification service
/// 4. Starts the event consumer and the expiry sweeper
/// 5. Runs the API server until shutdown
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("Starting Wallet Verifier");

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        println!("Wallet Verifier");
        println!();
        println!("Usage: wallet-verifier [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --config <path>   Use custom config file path");
        println!("  --help, -h        Show this help message");
        println!();
        println!("Environment variables:");
        println!("  WALLET_VERIFIER_CONFIG_PATH    Path to config file (default config/verifier.toml)");
        return Ok(());
    }

    let mut config_path = None;
    for (i, arg) in args.iter().enumerate() {
        if arg == "--config" && i + 1 < args.len() {
            config_path = Some(args[i + 1].clone());
            break;
        }
    }
    if let Some(path) = config_path {
        std::env::set_var("WALLET_VERIFIER_CONFIG_PATH", &path);
        info!("Using custom config: {}", path);
    }

    let config = Config::load().context("Failed to load configuration")?;
    info!(
        "Configuration loaded: chain {} ({}), collection {}, amount {} {}",
        config.chain.name,
        config.chain.chain_id,
        config.verification.collection_address,
        config.verification.expected_amount,
        config.verification.currency
    );

    let (event_sender, event_receiver) = mpsc::unbounded_channel();
    let reconciler =
        Reconciler::new(&config, event_sender).context("Failed to initialize the reconciler")?;
    let store = Arc::new(WalletStore::new());
    let service = VerificationService::new(&config.verification, Arc::clone(&store), reconciler);

    let consumer = service.clone();
    tokio::spawn(async move { consumer.run_event_consumer(event_receiver).await });

    let sweeper = ExpirySweeper::new(
        store,
        config.verification.timeout(),
        config.verification.sweep_interval(),
    );
    tokio::spawn(sweeper.run());

    let api_server = ApiServer::new(config, service);
    if let Err(e) = api_server.run().await {
        error!("API server error: {}", e);
        return Err(e);
    }

    Ok(())
}
