use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::ValidationError;
use crate::plan::PlanError;
use crate::state::StateError;

/// Result type alias for failover operations
pub type Result<T, E = FailoverError> = std::result::Result<T, E>;

/// Failures reported by the cloud adapters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloudError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("not authorized: {0}")]
    Auth(String),

    #[error("api error {code}: {message}")]
    Api { code: String, message: String },
}

/// The bounded operation that ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOperation {
    Validator,
    InstanceCount,
    FanOut,
}

impl fmt::Display for WaitOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WaitOperation::Validator => "a unique validator",
            WaitOperation::InstanceCount => "the instance count to converge",
            WaitOperation::FanOut => "cloud api queries",
        };
        f.write_str(name)
    }
}

/// Deletion failure for one instance group.
#[derive(Error, Debug)]
#[error("{group}: {source}")]
pub struct GroupFailure {
    pub group: String,
    pub source: Box<FailoverError>,
}

#[derive(Error, Debug)]
pub enum FailoverError {
    /// No instance reports the active validator value. Callers treat this as
    /// "still converging".
    #[error("no validator found ({not_reporting} instance(s) not reporting the metric)")]
    ValidatorNotFound { not_reporting: usize },

    /// More than one instance claims to be the validator.
    #[error("multiple validators found: {}", candidates.join(", "))]
    ValidatorAmbiguous { candidates: Vec<String> },

    #[error("cloud api error for {context}: {source}")]
    Cloud { context: String, source: CloudError },

    #[error("timed out after {waited:?} waiting for {operation}")]
    Timeout {
        operation: WaitOperation,
        waited: Duration,
    },

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("invalid persisted state: {0}")]
    State(#[from] StateError),

    #[error("invalid counts: {0}")]
    Plan(#[from] PlanError),

    #[error("failed to delete instances in {} group(s): {}", failures.len(), join_failures(failures))]
    Deletion { failures: Vec<GroupFailure> },

    #[error("internal error: {0}")]
    Internal(String),
}

impl FailoverError {
    pub fn cloud(context: impl Into<String>, source: CloudError) -> Self {
        FailoverError::Cloud {
            context: context.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FailoverError::ValidatorNotFound { .. })
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, FailoverError::ValidatorAmbiguous { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FailoverError::Timeout { .. })
    }
}

fn join_failures(failures: &[GroupFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
