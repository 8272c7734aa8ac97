//! The execution engine: task bindings, the run loop, and fan-out.

pub mod config;
pub mod error;
mod fanout;
pub mod machine;
pub mod submachine;
pub mod task;

pub use config::{ConfigError, EngineConfig};
pub use error::{EngineError, RegistrationError, SubMachineError, TaskError, TaskResult};
pub use machine::{MachineId, RunSummary, RunningFlag, StateMachine, Termination};
pub use submachine::{StallPolicy, SubMachine};
pub use task::{Handler, Task, TaskKind, TaskTable};
