//! Controller-specific error types.
//!
//! This module defines error types specific to the Machine filter controller
//! that are not covered by upstream library errors.

use kube::Error as KubeError;
use label_filter::SelectorError;
use thiserror::Error;

/// Errors that can occur in the Machine filter controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Watch filter expression could not be parsed
    #[error("Invalid watch filter: {0}")]
    Selector(#[from] SelectorError),

    /// Shutdown signal handler could not be installed
    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),

    /// Reconciliation failed
    #[error("Reconciliation failed: {0}")]
    Reconciliation(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}
