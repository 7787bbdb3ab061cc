//! # Error Types
//!
//! Errors raised by the prediction runtime.
//!
//! ## Overview
//!
//! Nothing in this crate interprets user input, so every error here is a
//! contract violation by the caller (usually the prediction driver) or by
//! the automaton it was handed:
//!
//! - **Read-only violations**: mutating a frozen [`AtnConfigSet`] or a
//!   read-only [`IntervalSet`]
//! - **Unsupported operations**: context appends the merge algorithm does
//!   not define, and set operations the driver never needs
//! - **Shape violations**: asking a plain DFA for precedence start states,
//!   or setting a context edge on a state that is not context sensitive
//! - **Builder validation**: dangling state or rule references
//!
//! Expected outcomes such as "no DFA edge for this symbol yet" are not
//! errors; they are returned as `None`.
//!
//! ## Diagnostics Support
//!
//! When the `diagnostics` feature is enabled, errors integrate with [`miette`].
//!
//! [`AtnConfigSet`]: crate::config::AtnConfigSet
//! [`IntervalSet`]: crate::interval::IntervalSet

use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, AtnError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum AtnError {
    #[error("cannot modify {what}: it is read-only")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(allstar::read_only)))]
    ReadOnly { what: &'static str },

    #[error("operation not supported: {operation}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(allstar::unsupported)))]
    Unsupported { operation: &'static str },

    #[error("decision {decision} is not a precedence DFA")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(allstar::not_precedence_dfa),
            help("only the entry decision of a left-recursive rule keeps per-precedence start states")
        )
    )]
    NotPrecedenceDfa { decision: usize },

    #[error("DFA state {state} is not context sensitive")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(allstar::not_context_sensitive)))]
    NotContextSensitive { state: i32 },

    #[error("state {state} does not exist in the automaton")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(allstar::invalid_state)))]
    InvalidState { state: usize },

    #[error("rule {rule} does not exist in the automaton")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(allstar::invalid_rule)))]
    InvalidRule { rule: usize },
}

impl AtnError {
    /// Create a read-only violation
    #[must_use]
    pub const fn read_only(what: &'static str) -> Self {
        Self::ReadOnly { what }
    }

    /// Create an unsupported-operation error
    #[must_use]
    pub const fn unsupported(operation: &'static str) -> Self {
        Self::Unsupported { operation }
    }

    /// Whether this error reports a write to a frozen structure
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        matches!(self, Self::ReadOnly { .. })
    }

    /// Whether this error reports an intentionally unimplemented operation
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}
