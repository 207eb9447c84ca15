//! # Broker Host
//!
//! Runs a [`BrokerRuntime`] until Ctrl-C.
//!
//! Configuration comes from the environment; see [`HostConfig::from_env`].

use anyhow::{Context, Result};
use broker_runtime::{BrokerRuntime, HostConfig};
use broker_telemetry::{encode_metrics, init_telemetry};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = HostConfig::from_env();
    let _telemetry =
        init_telemetry(&config.telemetry).context("Failed to initialize telemetry")?;

    info!(
        channels = ?config.channels,
        store = ?config.store,
        pipe_dir = %config.transport.pipe_dir.display(),
        "Starting broker host"
    );

    let runtime = BrokerRuntime::new(config).context("Invalid broker configuration")?;
    runtime.start();

    info!("Broker host running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutdown signal received");
    runtime.shutdown().await;

    match encode_metrics() {
        Ok(metrics) => info!("Final metrics:\n{metrics}"),
        Err(e) => error!(error = %e, "Failed to encode metrics"),
    }

    Ok(())
}
