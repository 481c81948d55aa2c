//! Kubernetes resource watchers.
//!
//! This module watches Machine resources through the cache admission selector
//! and runs every event through the event filter before reconciling.

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crds::Machine;
use futures::TryStreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::watcher;
use label_filter::{EventFilter, ObjectEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Last seen state of each admitted Machine, keyed by `namespace/name`.
///
/// Lets apply events be classified as create or update, with the previous
/// object available to the filter. A relist (`Init` .. `InitDone`) rebuilds
/// the map from the listed objects, so Machines that vanished while the
/// watch was down are dropped even though no delete event arrives for them.
#[derive(Debug, Default)]
struct SeenMachines {
    machines: HashMap<String, Machine>,
    relist: Option<HashMap<String, Machine>>,
}

impl SeenMachines {
    /// Records `machine` and returns the previously seen state, if any.
    fn observe(&mut self, machine: &Machine) -> Option<Machine> {
        if let Some(listed) = self.relist.as_mut() {
            listed.insert(key(machine), machine.clone());
        }
        self.machines.insert(key(machine), machine.clone())
    }

    /// Starts collecting a fresh listing.
    fn begin_relist(&mut self) {
        // A relist interrupted before InitDone hands its entries back
        if let Some(partial) = self.relist.take() {
            self.machines.extend(partial);
        }
        self.relist = Some(HashMap::new());
    }

    /// Records a listed `machine`, returning its state from before the relist.
    fn observe_listed(&mut self, machine: &Machine) -> Option<Machine> {
        let key = key(machine);
        let previous = self.machines.remove(&key);
        self.relist
            .get_or_insert_with(HashMap::new)
            .insert(key, machine.clone());
        previous
    }

    /// Replaces the known Machines with the completed listing.
    fn finish_relist(&mut self) {
        if let Some(listed) = self.relist.take() {
            self.machines = listed;
        }
    }

    fn forget(&mut self, machine: &Machine) {
        let key = key(machine);
        self.machines.remove(&key);
        if let Some(listed) = self.relist.as_mut() {
            listed.remove(&key);
        }
    }
}

fn key(machine: &Machine) -> String {
    format!("{}/{}", machine.namespace().unwrap_or_default(), machine.name_any())
}

/// Decides whether an apply of `machine` should be reconciled, given the
/// state it had when last seen.
fn admit(filter: &EventFilter, previous: Option<&Machine>, machine: &Machine) -> bool {
    match previous {
        Some(old) => filter.filter(&ObjectEvent::Update { old, new: machine }),
        None => filter.filter(&ObjectEvent::Create(machine)),
    }
}

/// Watches Kubernetes resources for changes.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    machine_api: Api<Machine>,
    watch_config: watcher::Config,
    filter: EventFilter,
}

impl Watcher {
    /// Creates a new watcher instance.
    ///
    /// `watch_config` must already carry the cache admission selector.
    pub fn new(
        reconciler: Arc<Reconciler>,
        machine_api: Api<Machine>,
        watch_config: watcher::Config,
        filter: EventFilter,
    ) -> Self {
        Self {
            reconciler,
            machine_api,
            watch_config,
            filter,
        }
    }

    /// Starts watching Machine resources.
    pub async fn watch_machines(&self) -> Result<(), ControllerError> {
        info!(
            label_selector = self.watch_config.label_selector.as_deref().unwrap_or("<none>"),
            "Starting Machine watcher"
        );

        let mut seen = SeenMachines::default();
        let mut stream = Box::pin(watcher(self.machine_api.clone(), self.watch_config.clone()));

        while let Some(event) = stream
            .try_next()
            .await
            .map_err(|e| ControllerError::Watch(format!("Watcher stream error: {}", e)))?
        {
            match event {
                watcher::Event::Apply(machine) => {
                    let previous = seen.observe(&machine);
                    if admit(&self.filter, previous.as_ref(), &machine) {
                        self.reconcile(&machine).await;
                    }
                }
                watcher::Event::InitApply(machine) => {
                    let previous = seen.observe_listed(&machine);
                    if admit(&self.filter, previous.as_ref(), &machine) {
                        self.reconcile(&machine).await;
                    }
                }
                watcher::Event::Delete(machine) => {
                    seen.forget(&machine);
                    if self.filter.filter(&ObjectEvent::Delete(&machine)) {
                        info!("Machine deleted: {}", machine.name_any());
                    }
                }
                watcher::Event::Init => {
                    debug!("Machine watcher initialized");
                    seen.begin_relist();
                }
                watcher::Event::InitDone => {
                    seen.finish_relist();
                    info!(machines = seen.machines.len(), "Machine watcher initialization complete");
                }
            }
        }

        Ok(())
    }

    async fn reconcile(&self, machine: &Machine) {
        if let Err(e) = self.reconciler.reconcile_machine(machine).await {
            warn!("Failed to reconcile Machine {}: {}", machine.name_any(), e);
        }
    }
}
