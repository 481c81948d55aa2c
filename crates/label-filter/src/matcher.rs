//! Single source of truth for the watch filter.
//!
//! A [`LabelMatcher`] parses the expression once and hands the same frozen
//! [`Selector`] to both enforcement points: the watch cache
//! ([`CacheAdmission`]) and the controller's event filter ([`EventFilter`]).

use std::sync::Arc;

use tracing::{Span, info};

use crate::admission::CacheAdmission;
use crate::error::SelectorError;
use crate::predicate::EventFilter;
use crate::selector::Selector;

/// Parsed watch filter shared by the cache and the event filter.
#[derive(Debug, Clone)]
pub struct LabelMatcher {
    expression: Arc<str>,
    selector: Arc<Selector>,
}

impl LabelMatcher {
    /// Parses `expression` and freezes the resulting selector.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError::InvalidExpression`] when the expression is
    /// malformed. Callers should treat this as fatal at startup.
    pub fn new(expression: &str) -> Result<Self, SelectorError> {
        let selector = Selector::parse(expression)?;

        if selector.is_empty() {
            info!("No watch filter configured, all objects will be admitted");
        } else {
            info!(
                expression,
                clauses = selector.clauses().len(),
                "Watch filter configured"
            );
        }

        Ok(Self {
            expression: Arc::from(expression),
            selector: Arc::new(selector),
        })
    }

    /// The expression as supplied.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The parsed selector.
    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Adapter for the watch cache, supplied once at cache construction.
    pub fn cache_admission(&self) -> CacheAdmission {
        CacheAdmission::new(Arc::clone(&self.selector))
    }

    /// Adapter for controller event dispatch. Decisions are logged inside `span`.
    pub fn event_filter(&self, span: Span) -> EventFilter {
        EventFilter::new(Arc::clone(&self.selector), Arc::clone(&self.expression), span)
    }
}
