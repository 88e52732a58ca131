//! `ledger-node`: a replicated ledger behind a line-delimited JSON socket.
//!
//! Usage: `ledger-node [config.toml]` (or set `LEDGER_CONFIG`).

use std::path::PathBuf;

use anyhow::{Context, Result};
use ledger_telemetry::init_telemetry;
use node_runtime::{serve, NodeConfig, NodeRuntime};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let path = std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os("LEDGER_CONFIG"))
        .map(PathBuf::from);
    let config = NodeConfig::load(path.as_deref()).context("Failed to load configuration")?;
    let _telemetry = init_telemetry(&config.telemetry).context("Failed to initialise telemetry")?;

    let runtime = NodeRuntime::start(config).await?;
    let addr = runtime.config().node.listen_addr.clone();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let server = tokio::spawn(serve(listener, runtime.api(), runtime.shutdown_signal()));

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await?;
    server.await.context("RPC listener task failed")??;
    info!("Shutdown complete");
    Ok(())
}
