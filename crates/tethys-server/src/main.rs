//! Tethys sync server
//!
//! This binary serves the ingest trigger, recovers tasks left ongoing by a
//! previous run, and optionally triggers sync cycles on a fixed interval.

use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tethys_server::{AppState, ServerConfig, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::parse();
    info!(
        catalog = %config.sync_base_url,
        store = %config.sparql_endpoint,
        share = %config.share_dir.display(),
        "Starting tethys"
    );

    let shutdown_token = CancellationToken::new();
    let state = AppState::new(&config)
        .context("Failed to initialize sync services")?;

    // Anything still ongoing was interrupted by a previous process.
    match state.scheduler.recover_interrupted().await {
        Ok(0) => {}
        Ok(n) => warn!(recovered = n, "Closed interrupted sync tasks as failed"),
        Err(e) => error!(error = %e, "Could not recover interrupted sync tasks"),
    }

    let periodic = config.ingest_interval().map(|interval| {
        let scheduler = state.scheduler.clone();
        let cancel = shutdown_token.clone();
        tokio::spawn(async move { scheduler.run_periodic(interval, cancel).await })
    });
    if periodic.is_none() {
        info!("Periodic sync disabled; waiting for POST /ingest");
    }

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid address")?;
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token))
        .await
        .context("Server error")?;

    if let Some(handle) = periodic {
        handle.await.context("Periodic sync loop panicked")?;
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown...");

    // Stops the periodic loop; a fold already spawned is not interrupted.
    shutdown_token.cancel();
}
