//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the label matcher
//! into the Machine watch: the cache admission selector restricts what the
//! watch lists, and the event filter gates what gets reconciled.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use crds::Machine;
use kube::{Api, Client};
use label_filter::LabelMatcher;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, info_span};

/// Main controller for label-filtered Machine reconciliation.
pub struct Controller {
    machine_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance.
    ///
    /// The watch filter is parsed before any connection to the cluster is made,
    /// so a malformed expression fails startup immediately.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing Machine filter controller");

        let matcher = LabelMatcher::new(&config.watch_filter)?;
        let watch_config = matcher.cache_admission().watcher_config();
        let filter = matcher.event_filter(info_span!(
            "event_filter",
            controller = "machine-filter",
            namespace = config.namespace.as_deref().unwrap_or("*")
        ));

        // Create Kubernetes client
        let kube_client = Client::try_default().await?;

        let machine_api: Api<Machine> = match config.namespace.as_deref() {
            Some(ns) => Api::namespaced(kube_client.clone(), ns),
            None => Api::all(kube_client.clone()),
        };

        let reconciler = Arc::new(Reconciler::new(kube_client));
        let watcher_instance = Watcher::new(reconciler, machine_api, watch_config, filter);

        let machine_watcher = tokio::spawn(async move { watcher_instance.watch_machines().await });

        Ok(Self { machine_watcher })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Machine filter controller running");

        tokio::select! {
            result = &mut self.machine_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Machine watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("Machine watcher error: {}", e)))?;
            }
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(ControllerError::Signal)?;
                info!("Shutdown signal received");
                self.machine_watcher.abort();
            }
        }

        Ok(())
    }
}
