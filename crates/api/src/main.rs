//! Driver Distraction Monitor - Main Entry Point
//!
//! Usage: `driver-monitor [config.toml]`. Settings can also be supplied as
//! `DRIVER_MONITOR__<SECTION>__<KEY>` environment variables.

use anyhow::Context;
use api::{init_logging, run_server};
use monitor::MonitorConfig;
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = MonitorConfig::load(path.as_deref()).context("failed to load configuration")?;

    init_logging(&config.logging);

    info!("=== Driver Distraction Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Classifier at {}, camera {}",
        config.classifier.base_url, config.camera.device
    );

    run_server(config).await.context("server failed")?;

    Ok(())
}
