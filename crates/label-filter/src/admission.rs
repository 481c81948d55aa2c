//! Cache admission adapter.
//!
//! Converts the shared [`Selector`] into the representations the watch layer
//! understands, so that objects failing the selector are never listed,
//! watched, or stored in the controller's cache.

use std::collections::BTreeSet;
use std::sync::Arc;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use kube::core::{Expression, Selector as KubeSelector, SelectorExt};
use kube_runtime::watcher;

use crate::selector::{Clause, LabelSet, Selector};

/// Label selector handed to the watch cache at construction time.
#[derive(Debug, Clone)]
pub struct CacheAdmission {
    selector: Arc<Selector>,
}

impl CacheAdmission {
    pub(crate) fn new(selector: Arc<Selector>) -> Self {
        Self { selector }
    }

    /// The selector as kube-core expressions.
    pub fn kube_selector(&self) -> KubeSelector {
        self.selector.clauses().iter().map(to_expression).collect()
    }

    /// Selector string for list/watch calls, or `None` when everything is admitted.
    pub fn selector_string(&self) -> Option<String> {
        (!self.selector.is_empty()).then(|| self.kube_selector().to_string())
    }

    /// The selector as a `metav1.LabelSelector`.
    ///
    /// Equality clauses go to `matchLabels` unless the key is already taken
    /// there, in which case they become single-value `In` requirements.
    pub fn label_selector(&self) -> LabelSelector {
        let mut match_labels = LabelSet::new();
        let mut match_expressions = Vec::new();

        for clause in self.selector.clauses() {
            match clause {
                Clause::Equal { key, value } if !match_labels.contains_key(key) => {
                    match_labels.insert(key.clone(), value.clone());
                }
                Clause::Equal { key, value } => {
                    match_expressions.push(requirement(key, "In", Some(vec![value.clone()])));
                }
                Clause::In { key, values } => {
                    match_expressions.push(requirement(key, "In", Some(values.iter().cloned().collect())));
                }
                Clause::Exists { key } => match_expressions.push(requirement(key, "Exists", None)),
                Clause::DoesNotExist { key } => {
                    match_expressions.push(requirement(key, "DoesNotExist", None));
                }
            }
        }

        LabelSelector {
            match_labels: (!match_labels.is_empty()).then_some(match_labels),
            match_expressions: (!match_expressions.is_empty()).then_some(match_expressions),
        }
    }

    /// Installs the selector on an existing watcher configuration.
    pub fn apply(&self, config: watcher::Config) -> watcher::Config {
        match self.selector_string() {
            Some(labels) => config.labels(&labels),
            None => config,
        }
    }

    /// A default watcher configuration restricted to admitted objects.
    pub fn watcher_config(&self) -> watcher::Config {
        self.apply(watcher::Config::default())
    }

    /// The decision the watch layer makes for `labels`, computed from the
    /// converted kube-core selector rather than the parsed one.
    pub fn admits(&self, labels: &LabelSet) -> bool {
        self.kube_selector().matches(labels)
    }
}

fn to_expression(clause: &Clause) -> Expression {
    match clause {
        Clause::Equal { key, value } => Expression::Equal(key.clone(), value.clone()),
        Clause::In { key, values } => Expression::In(key.clone(), values.iter().cloned().collect::<BTreeSet<_>>()),
        Clause::Exists { key } => Expression::Exists(key.clone()),
        Clause::DoesNotExist { key } => Expression::DoesNotExist(key.clone()),
    }
}

fn requirement(key: &str, operator: &str, values: Option<Vec<String>>) -> LabelSelectorRequirement {
    LabelSelectorRequirement {
        key: key.to_string(),
        operator: operator.to_string(),
        values,
    }
}
