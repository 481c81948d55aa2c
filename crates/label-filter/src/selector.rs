//! Structured selectors and their evaluation.
//!
//! A [`Selector`] is an ordered list of [`Clause`]s joined by logical AND.
//! Evaluation is a pure function of the selector and a [`LabelSet`]; the empty
//! selector matches every label set, including the empty one.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use kube::Resource;
use kube::ResourceExt;

use crate::error::SelectorError;
use crate::parser;

/// Label metadata carried by an object, as stored in `ObjectMeta.labels`.
pub type LabelSet = BTreeMap<String, String>;

/// One atomic condition of a [`Selector`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Clause {
    /// `key=value`: key present and its value equals `value` exactly.
    Equal {
        /// Label key
        key: String,
        /// Required value
        value: String,
    },
    /// `key in (a,b)`: key present and its value is one of `values`.
    In {
        /// Label key
        key: String,
        /// Acceptable values (never empty)
        values: BTreeSet<String>,
    },
    /// `key`: key present with any value.
    Exists {
        /// Label key
        key: String,
    },
    /// `!key`: key absent.
    DoesNotExist {
        /// Label key
        key: String,
    },
}

impl Clause {
    /// The label key this clause constrains.
    pub fn key(&self) -> &str {
        match self {
            Self::Equal { key, .. }
            | Self::In { key, .. }
            | Self::Exists { key }
            | Self::DoesNotExist { key } => key,
        }
    }

    /// Whether `labels` satisfies this clause.
    pub fn matches(&self, labels: &LabelSet) -> bool {
        match self {
            Self::Equal { key, value } => labels.get(key) == Some(value),
            Self::In { key, values } => labels.get(key).is_some_and(|v| values.contains(v)),
            Self::Exists { key } => labels.contains_key(key),
            Self::DoesNotExist { key } => !labels.contains_key(key),
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal { key, value } => write!(f, "{key}={value}"),
            Self::In { key, values } => {
                let joined: Vec<&str> = values.iter().map(String::as_str).collect();
                write!(f, "{key} in ({})", joined.join(","))
            }
            Self::Exists { key } => f.write_str(key),
            Self::DoesNotExist { key } => write!(f, "!{key}"),
        }
    }
}

/// A parsed label selector.
///
/// Immutable once built; share it behind an `Arc` for concurrent readers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Selector {
    clauses: Vec<Clause>,
}

impl Selector {
    /// Parses a selector expression.
    ///
    /// The empty (or all-whitespace) expression yields the empty selector,
    /// which matches everything.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError::InvalidExpression`] naming the first malformed
    /// clause. No partial selector is ever returned.
    pub fn parse(expression: &str) -> Result<Self, SelectorError> {
        parser::parse(expression).map(Self::from_clauses)
    }

    pub(crate) fn from_clauses(clauses: Vec<Clause>) -> Self {
        Self { clauses }
    }

    /// Clauses in expression order.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// True when the selector has no clauses and therefore matches everything.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Whether every clause is satisfied by `labels`.
    pub fn matches(&self, labels: &LabelSet) -> bool {
        self.clauses.iter().all(|clause| clause.matches(labels))
    }

    /// Evaluates the selector against the labels of a Kubernetes object.
    pub fn matches_resource<K: Resource>(&self, obj: &K) -> bool {
        self.matches(obj.labels())
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{clause}")?;
        }
        Ok(())
    }
}
