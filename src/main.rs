//! tx-submitter - sends pre-encoded system contract calls and reports receipts
//!
//! Reads an ordered list of transactions from config, signs each with the
//! configured key, submits it to a JSON-RPC node and waits for its receipt
//! before moving on to the next one.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

mod chain;
mod config;
mod error;
mod runner;
mod tx;
mod wallet;

use chain::ChainProvider;
use config::{LogFormat, LoggingConfig, Settings};
use runner::Runner;
use tx::NonceManager;
use wallet::Identity;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::load()?;

    // Initialize logging
    init_logging(&settings.logging);

    info!("Starting tx-submitter v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Loaded configuration with {} enabled transactions",
        settings.enabled_transactions().len()
    );

    let provider = Arc::new(ChainProvider::connect(&settings.rpc, &settings.gas)?);

    let chain_id = match settings.rpc.chain_id {
        Some(chain_id) => chain_id,
        None => provider.get_chain_id().await?,
    };
    info!("Using chain ID {}", chain_id);

    let identity = Identity::from_env(&settings.wallet)?.with_chain_id(chain_id);
    info!("Signer address: {:?}", identity.address());

    let nonce_manager = NonceManager::from_chain(identity.address(), provider.as_ref()).await?;

    let runner = Runner::new(&settings, provider, identity, nonce_manager)?;

    let mut reports = Vec::new();
    let outcome = tokio::select! {
        result = runner.run(&mut reports) => result,
        _ = shutdown_signal() => {
            warn!("Shutdown signal received, abandoning remaining transactions");
            Ok(())
        }
    };

    println!("{}", serde_json::to_string_pretty(&reports)?);

    if let Err(e) = outcome {
        error!("Run stopped: {}", e);
        return Err(e.into());
    }

    info!("tx-submitter finished");
    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tx_submitter=debug,hyper=warn"));

    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
