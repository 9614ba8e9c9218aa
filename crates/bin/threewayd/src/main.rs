//! # threewayd: 3-way switch synchronizer daemon
//!
//! Composition root that wires the transport into the synchronizer.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Install the tracing subscriber
//! - Build the virtual transport from the configured devices
//! - Start the coordinator (discovery, refresh, reporting)
//! - Stop on Ctrl-C
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer: no synchronization logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use threeway_adapter_virtual::VirtualTransport;
use threeway_app::coordinator::Coordinator;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading threeway.toml")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    let transport = Arc::new(VirtualTransport::from_config(&config.virtual_devices));
    tracing::info!(
        devices = config.virtual_devices.devices.len(),
        groups = config.sync.groups.len(),
        "threewayd starting"
    );

    let mut coordinator = Coordinator::start(transport, config.sync);

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    tracing::info!("shutdown requested");
    coordinator.shutdown();

    Ok(())
}
