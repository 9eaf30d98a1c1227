//! Engine error taxonomy
//!
//! Unmet prerequisites (peer not resolved yet, pool absent) are not errors:
//! steps leave the status untouched and the pass is retried later. Only
//! invariant violations and malformed external data surface here.

use crate::model::SwitchRole;
use thiserror::Error;

/// An invariant of the fabric was violated. The pass halts and the previously
/// persisted status stays as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("stored role {stored} contradicts peers, which imply {computed}")]
    RoleContradiction {
        stored: SwitchRole,
        computed: SwitchRole,
    },

    #[error("interfaces {first} and {second} share port index {index}")]
    DuplicatePortIndex {
        first: String,
        second: String,
        index: u32,
    },

    #[error("addresses of interfaces {first} and {second} overlap")]
    OverlappingAddresses { first: String, second: String },
}

/// Error returned from a convergence step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FabricError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("malformed {what} '{value}': {reason}")]
    Malformed {
        what: &'static str,
        value: String,
        reason: String,
    },
}

impl FabricError {
    pub fn malformed(what: &'static str, value: impl Into<String>, reason: impl ToString) -> Self {
        Self::Malformed {
            what,
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
