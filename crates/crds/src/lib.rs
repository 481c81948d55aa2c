//! Machine CRD Definitions
//!
//! Kubernetes Custom Resource Definitions watched by the filter controller.

pub mod machine;

pub use machine::*;
