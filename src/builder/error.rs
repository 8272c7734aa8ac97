//! Build errors for the machine builder.

use crate::engine::RegistrationError;
use thiserror::Error;

/// One problem found while validating a builder.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildIssue {
    #[error("State '{state}' is bound more than once")]
    DuplicateState { state: String },

    #[error("max_workers must be at least 1")]
    ZeroWorkers,

    #[error("join_timeout must be non-zero")]
    ZeroJoinTimeout,

    #[error("max_generations must be at least 1")]
    ZeroGenerationLimit,
}

impl From<RegistrationError> for BuildIssue {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::Duplicate { state } => Self::DuplicateState { state },
        }
    }
}

/// Errors that can occur when building a state machine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Invalid machine definition: {}", describe(.issues))]
    Invalid { issues: Vec<BuildIssue> },
}

impl BuildError {
    pub fn issues(&self) -> &[BuildIssue] {
        match self {
            Self::Invalid { issues } => issues,
        }
    }
}

fn describe(issues: &[BuildIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
