//! Label Filter
//!
//! Label-selector evaluation for Kubernetes controllers. One expression is
//! parsed into a [`Selector`] at startup and enforced at two points:
//!
//! - **Cache admission**: the selector is installed on the watch so that
//!   non-matching objects are never listed or cached ([`CacheAdmission`]).
//! - **Event filtering**: create, update and delete events are checked
//!   before a reconcile is enqueued ([`EventFilter`]).
//!
//! Both adapters are built from the same [`LabelMatcher`] and share one
//! immutable selector, so they cannot disagree about an object.
//!
//! # Example
//!
//! ```
//! use label_filter::{LabelMatcher, LabelSet};
//!
//! let matcher = LabelMatcher::new("!some,one,cluster.x-k8s.io/watch-filter = value")?;
//!
//! let mut labels = LabelSet::new();
//! labels.insert("one".to_string(), "1".to_string());
//! labels.insert("cluster.x-k8s.io/watch-filter".to_string(), "value".to_string());
//! assert!(matcher.selector().matches(&labels));
//!
//! let config = matcher.cache_admission().watcher_config();
//! assert!(config.label_selector.is_some());
//! # Ok::<(), label_filter::SelectorError>(())
//! ```
//!
//! # Expression grammar
//!
//! Comma-separated clauses, all of which must hold:
//!
//! - `key=value` / `key==value`: label equals value
//! - `key in (a,b)`: label is one of the values
//! - `key`: label present
//! - `!key`: label absent
//!
//! The empty expression matches everything.

pub mod admission;
pub mod error;
pub mod matcher;
mod parser;
pub mod predicate;
pub mod selector;

pub use admission::CacheAdmission;
pub use error::SelectorError;
pub use matcher::LabelMatcher;
pub use predicate::{EventFilter, EventKind, ObjectEvent};
pub use selector::{Clause, LabelSet, Selector};
