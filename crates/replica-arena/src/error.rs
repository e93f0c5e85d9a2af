//! Arena-specific error types.

use std::error::Error;
use std::fmt;

/// Errors that can occur during arena operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// The segment pool is full and may not grow further.
    CapacityExceeded {
        /// Slots requested.
        requested: usize,
        /// Slots the request was checked against.
        capacity: usize,
    },
    /// An [`ArenaConfig`](crate::ArenaConfig) failed validation.
    InvalidConfig {
        /// What was wrong.
        reason: String,
    },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded {
                requested,
                capacity,
            } => {
                write!(
                    f,
                    "arena capacity exceeded: requested {requested} slots, capacity {capacity} slots"
                )
            }
            Self::InvalidConfig { reason } => write!(f, "invalid arena config: {reason}"),
        }
    }
}

impl Error for ArenaError {}
