//! Machine Filter Controller
//!
//! Reconciles only the Machines selected by a label selector expression.
//!
//! The expression (`WATCH_FILTER`) is parsed once at startup. The resulting
//! selector is installed on the Machine watch so non-matching objects never
//! enter memory, and the same selector filters every create, update and
//! delete event before reconciliation.

mod config;
mod controller;
mod error;
mod reconciler;
mod watcher;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("rustls crypto provider already installed");
    }

    info!("Starting Machine Filter Controller");

    let config = ControllerConfig::from_env();

    info!("Configuration:");
    info!("  Watch filter: {}", if config.watch_filter.is_empty() { "<match everything>" } else { config.watch_filter.as_str() });
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));

    // Initialize and run controller
    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
