//! Selector errors

use thiserror::Error;

/// Errors produced while turning a selector expression into a [`Selector`](crate::Selector).
///
/// Parsing is the only fallible step. Once a selector exists, evaluation and
/// both adapters are total.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    /// The expression is malformed. `clause` is the offending comma-separated
    /// segment as written by the user.
    #[error("invalid selector expression in clause `{clause}`: {reason}")]
    InvalidExpression {
        /// Offending clause text
        clause: String,
        /// Why the clause was rejected
        reason: String,
    },
}

impl SelectorError {
    pub(crate) fn invalid(clause: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidExpression {
            clause: clause.into(),
            reason: reason.into(),
        }
    }

    /// The clause text that caused the error.
    pub fn clause(&self) -> &str {
        match self {
            Self::InvalidExpression { clause, .. } => clause,
        }
    }
}
