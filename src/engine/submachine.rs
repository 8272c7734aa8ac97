//! Nested machines embedded as a single state of a parent.

use crate::context::Context;
use crate::core::State;
use crate::engine::error::{SubMachineError, TaskResult};
use crate::engine::machine::{StateMachine, Termination};
use crate::engine::task::{Task, TaskKind};
use std::sync::Arc;
use tracing::{debug, warn};

/// What a sub-machine task does when the nested run stops short of its
/// done state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StallPolicy {
    /// Fail the parent task with [`SubMachineError::DidNotFinish`].
    #[default]
    Fail,
    /// Yield the output state anyway.
    Continue,
}

/// A nested [`StateMachine<C>`] that acts as one task of a parent machine
/// over `P`.
///
/// Each invocation runs the nested machine from its start state on the
/// invoking thread, then hands the parent a single output state.
pub struct SubMachine<P: State, C: State> {
    machine: Arc<StateMachine<C>>,
    output: P,
    on_stall: StallPolicy,
}

impl<P: State, C: State> SubMachine<P, C> {
    pub fn new(machine: StateMachine<C>, output: P) -> Self {
        Self {
            machine: Arc::new(machine),
            output,
            on_stall: StallPolicy::default(),
        }
    }

    pub fn on_stall(mut self, policy: StallPolicy) -> Self {
        self.on_stall = policy;
        self
    }

    pub fn output(&self) -> &P {
        &self.output
    }

    pub fn machine(&self) -> &StateMachine<C> {
        &self.machine
    }

    /// Run the nested machine once and translate how it ended.
    pub fn execute(&self) -> TaskResult<P> {
        let machine = self.machine.name().to_string();
        let summary = self
            .machine
            .run()
            .map_err(|source| SubMachineError::Failed {
                machine: machine.clone(),
                source,
            })?;

        if summary.termination == Termination::Done {
            debug!(
                machine = %machine,
                output = self.output.name(),
                generations = summary.generations,
                "sub-machine finished"
            );
            return Ok(self.output.clone().into());
        }

        match self.on_stall {
            StallPolicy::Fail => Err(SubMachineError::DidNotFinish {
                machine,
                states: summary.final_states.names(),
            }
            .into()),
            StallPolicy::Continue => {
                warn!(
                    machine = %machine,
                    termination = ?summary.termination,
                    output = self.output.name(),
                    "sub-machine stopped early, continuing with output state"
                );
                Ok(self.output.clone().into())
            }
        }
    }

    pub(crate) fn into_task(self, state: P) -> Task<P> {
        let kind = TaskKind::SubMachine {
            machine: self.machine.name().to_string(),
        };
        Task::from_parts(state, kind, Arc::new(move |_ctx: &Context| self.execute()))
    }
}
