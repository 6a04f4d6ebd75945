//! Wallet Gateway - HTTP API for Ethereum wallet operations
//!
//! Serves balance lookups, gas estimates, signature verification and
//! transaction preparation and submission against one EVM chain.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

mod api;
mod chain;
mod config;
mod error;
mod metrics;
mod tx;
mod units;
mod wallet;

use api::AppState;
use chain::ChainProvider;
use config::{LogFormat, LoggingConfig, Settings};
use metrics::MetricsServer;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::load()?;

    // Initialize logging
    init_logging(&settings.logging);

    info!("Starting Wallet Gateway v{}", env!("CARGO_PKG_VERSION"));

    // Initialize chain connection
    let provider = Arc::new(ChainProvider::new(settings.chain.clone()).await?);
    info!(
        "Chain {} configured with {} RPC endpoint(s)",
        provider.name(),
        settings.chain.rpc_urls.len()
    );

    let state = AppState::new(provider, &settings);

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    info!(
        "API server: http://{}:{}",
        settings.server.host, settings.server.port
    );

    // Serve until the shutdown signal
    let result = api::run_server(settings.server.clone(), state, shutdown_signal()).await;

    if let Some(h) = metrics_handle {
        h.abort();
    }

    result?;
    info!("Wallet Gateway stopped");
    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            config
                .filter
                .as_deref()
                .unwrap_or("info,wallet_gateway=debug,hyper=warn"),
        )
    });

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping...");
}
