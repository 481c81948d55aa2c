//! Reconciliation logic for Machine resources.
//!
//! Admitted Machines get `status.bootstrapReady` set to true through the
//! status subresource.

use crate::error::ControllerError;
use chrono::{DateTime, Utc};
use crds::{Machine, MachineStatus};
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::{Value, json};
use tracing::{debug, error, info};

/// Reconciles Machine resources.
pub struct Reconciler {
    client: Client,
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Reconciles a Machine resource.
    ///
    /// Machines already marked bootstrap-ready are left alone.
    pub async fn reconcile_machine(&self, machine: &Machine) -> Result<(), ControllerError> {
        let name = machine
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| ControllerError::Reconciliation("Machine missing name".to_string()))?;
        let namespace = machine.namespace().unwrap_or_else(|| "default".to_string());

        if machine.status.as_ref().is_some_and(|s| s.bootstrap_ready) {
            debug!("Machine {}/{} already bootstrap ready", namespace, name);
            return Ok(());
        }

        info!("Reconciling Machine {}/{}", namespace, name);

        let api: Api<Machine> = Api::namespaced(self.client.clone(), &namespace);
        let patch = bootstrap_ready_patch(Utc::now());
        match api
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
        {
            Ok(_) => {
                info!("Marked Machine {}/{} bootstrap ready", namespace, name);
                Ok(())
            }
            Err(e) => {
                error!("Failed to update Machine {}/{} status: {}", namespace, name, e);
                Err(ControllerError::Kube(e))
            }
        }
    }
}

/// Merge patch marking a Machine bootstrap ready.
fn bootstrap_ready_patch(now: DateTime<Utc>) -> Value {
    let status = MachineStatus {
        bootstrap_ready: true,
        last_reconciled: Some(now),
    };
    json!({ "status": status })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_bootstrap_ready_patch() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let patch = bootstrap_ready_patch(now);
        assert_eq!(patch["status"]["bootstrapReady"], json!(true));
        assert_eq!(patch["status"]["lastReconciled"], json!("2024-05-01T12:00:00Z"));
        assert_eq!(patch.as_object().map(|o| o.len()), Some(1));
    }
}
