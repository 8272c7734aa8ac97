//! Engine error types.

use crate::core::StateSet;
use std::time::Duration;
use thiserror::Error;

/// Error a handler may fail with. Any `std::error::Error` converts into it,
/// so handlers can use `?` on context lookups and their own fallible calls.
pub type TaskError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What a handler returns: the states that should become active next.
pub type TaskResult<S> = Result<StateSet<S>, TaskError>;

/// Errors raised while binding tasks to states.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("State '{state}' already has a task bound")]
    Duplicate { state: String },
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Machine '{machine}' is already running")]
    AlreadyRunning { machine: String },

    #[error("Task for state '{state}' failed: {source}")]
    TaskFailed {
        state: String,
        #[source]
        source: TaskError,
    },

    #[error("Task for state '{state}' panicked: {message}")]
    TaskPanicked { state: String, message: String },

    #[error("Join timed out after {timeout:?} waiting on [{}]", .pending.join(", "))]
    JoinTimeout {
        timeout: Duration,
        pending: Vec<String>,
    },

    #[error("Generation limit ({limit}) reached")]
    GenerationLimit { limit: usize },

    #[error("Failed to spawn fan-out worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Errors a sub-machine task reports to its parent.
#[derive(Debug, Error)]
pub enum SubMachineError {
    #[error("Sub-machine '{machine}' stopped at [{states}] without reaching its done state")]
    DidNotFinish { machine: String, states: String },

    #[error("Sub-machine '{machine}' failed: {source}")]
    Failed {
        machine: String,
        #[source]
        source: EngineError,
    },
}
