//! Controller configuration.
//!
//! Everything the controller needs at startup is collected into a
//! [`ControllerConfig`] and passed to [`Controller::new`](crate::controller::Controller::new).

use std::env;

/// Environment variable holding the label selector expression.
pub const WATCH_FILTER_ENV: &str = "WATCH_FILTER";

/// Environment variable naming the namespace to watch.
pub const WATCH_NAMESPACE_ENV: &str = "WATCH_NAMESPACE";

/// Startup configuration for the Machine filter controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Label selector expression; empty admits every Machine
    pub watch_filter: String,

    /// Namespace to watch, or all namespaces when `None`
    pub namespace: Option<String>,
}

impl ControllerConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            watch_filter: lookup(WATCH_FILTER_ENV).unwrap_or_default(),
            namespace: lookup(WATCH_NAMESPACE_ENV)
                .map(|ns| ns.trim().to_string())
                .filter(|ns| !ns.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ControllerConfig::default());
        assert!(config.watch_filter.is_empty());
        assert!(config.namespace.is_none());
    }

    #[test]
    fn test_values_are_read() {
        let config = ControllerConfig::from_lookup(lookup(&[
            (WATCH_FILTER_ENV, "!some,one,cluster.x-k8s.io/watch-filter = value"),
            (WATCH_NAMESPACE_ENV, "capi-system"),
        ]));
        assert_eq!(config.watch_filter, "!some,one,cluster.x-k8s.io/watch-filter = value");
        assert_eq!(config.namespace.as_deref(), Some("capi-system"));
    }

    #[test]
    fn test_blank_namespace_means_all_namespaces() {
        let config = ControllerConfig::from_lookup(lookup(&[(WATCH_NAMESPACE_ENV, "  ")]));
        assert!(config.namespace.is_none());
    }
}
