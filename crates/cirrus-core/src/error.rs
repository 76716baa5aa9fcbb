//! Error types for Cirrus

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{EntityId, SimTime};

/// Result type for simulation operations
pub type Result<T> = std::result::Result<T, SimError>;

/// Reasons a subordinate could not be created
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CreationFailure {
    /// The create request carried no workload label
    #[error("no workload label supplied")]
    MissingWorkload,

    /// The workload label is empty or contains control characters
    #[error("malformed workload label {0:?}")]
    MalformedWorkload(String),

    /// Polling interval must be positive and the deadline non-negative
    #[error("invalid collection policy: {0}")]
    InvalidCollectionPolicy(String),

    /// The manager already holds its configured maximum of subordinates
    #[error("subordinate limit of {limit} reached")]
    CapacityExceeded { limit: usize },
}

/// Core error type for simulation operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// Negative, NaN or infinite delay (scheduling into the past)
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Event addressed to a missing or shut down entity
    #[error("Unknown target: {0} is not registered or already shut down")]
    UnknownTarget(EntityId),

    /// Subordinate creation was skipped
    #[error("Entity creation failed: {0}")]
    EntityCreation(#[from] CreationFailure),

    /// Entity received an event it does not handle
    #[error("Entity {entity} ignored unhandled event {tag}")]
    UnhandledEvent { entity: EntityId, tag: &'static str },

    /// Execution collaborator rejected a request
    #[error("Execution error: {0}")]
    Execution(String),

    /// Entity reaction failed in a way the run cannot recover from
    #[error("Reaction of {entity} failed: {reason}")]
    Reaction { entity: EntityId, reason: String },

    /// The run has already ended
    #[error("Simulation terminated at t={0:.2}")]
    Terminated(SimTime),
}

/// Coarse classification used for tallies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidSchedule,
    UnknownTarget,
    EntityCreation,
    UnhandledEvent,
    Execution,
    Reaction,
    Terminated,
}

impl SimError {
    /// Create an invalid schedule error
    pub fn invalid_schedule(msg: impl Into<String>) -> Self {
        Self::InvalidSchedule(msg.into())
    }

    /// Create an execution collaborator error
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create a fatal reaction error
    pub fn reaction(entity: EntityId, reason: impl Into<String>) -> Self {
        Self::Reaction {
            entity,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SimError::InvalidSchedule(_) => ErrorKind::InvalidSchedule,
            SimError::UnknownTarget(_) => ErrorKind::UnknownTarget,
            SimError::EntityCreation(_) => ErrorKind::EntityCreation,
            SimError::UnhandledEvent { .. } => ErrorKind::UnhandledEvent,
            SimError::Execution(_) => ErrorKind::Execution,
            SimError::Reaction { .. } => ErrorKind::Reaction,
            SimError::Terminated(_) => ErrorKind::Terminated,
        }
    }

    /// Recoverable errors are logged and tallied; the run continues.
    /// Anything else halts the run when it escapes a reaction.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::InvalidSchedule | ErrorKind::Reaction | ErrorKind::Terminated
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability() {
        assert!(SimError::UnknownTarget(EntityId(4)).is_recoverable());
        assert!(SimError::from(CreationFailure::MissingWorkload).is_recoverable());
        assert!(SimError::execution("no vms").is_recoverable());
        assert!(!SimError::invalid_schedule("negative delay").is_recoverable());
        assert!(!SimError::reaction(EntityId(1), "boom").is_recoverable());
        assert!(!SimError::Terminated(12.0).is_recoverable());
    }

    #[test]
    fn test_creation_failure_message() {
        let err = SimError::from(CreationFailure::CapacityExceeded { limit: 20 });
        assert_eq!(err.kind(), ErrorKind::EntityCreation);
        assert_eq!(err.to_string(), "Entity creation failed: subordinate limit of 20 reached");
    }
}
