//! Builder for constructing state machines.

use crate::builder::error::{BuildError, BuildIssue};
use crate::context::Context;
use crate::core::State;
use crate::engine::{EngineConfig, StateMachine, SubMachine, Task, TaskResult};
use std::sync::Arc;
use std::time::Duration;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<BuildIssue>>;

/// Builder for constructing state machines with a fluent API.
///
/// Unlike registering directly on a [`StateMachine`], `build` reports
/// every problem at once.
///
/// # Example
///
/// ```rust
/// use switchyard::builder::{always, MachineBuilder};
/// use switchyard::state_enum;
///
/// state_enum! {
///     enum Step { Fetch, Parse, Done }
///     start: Fetch
///     done: Done
/// }
///
/// let machine = MachineBuilder::new()
///     .name("pipeline")
///     .on(Step::Fetch, always(Step::Parse))
///     .on(Step::Parse, always(Step::Done))
///     .build()
///     .unwrap();
///
/// assert!(machine.run().unwrap().is_done());
/// ```
pub struct MachineBuilder<S: State> {
    name: Option<String>,
    context: Option<Arc<Context>>,
    config: EngineConfig,
    tasks: Vec<Task<S>>,
}

impl<S: State> MachineBuilder<S> {
    pub fn new() -> Self {
        Self {
            name: None,
            context: None,
            config: EngineConfig::default(),
            tasks: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Share `context` instead of creating a fresh one.
    pub fn context(mut self, context: Arc<Context>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn on<F>(mut self, state: S, handler: F) -> Self
    where
        F: Fn(&Context) -> TaskResult<S> + Send + Sync + 'static,
    {
        self.tasks.push(Task::new(state, handler));
        self
    }

    pub fn on_with<R, F>(mut self, state: S, receiver: Arc<R>, method: F) -> Self
    where
        R: Send + Sync + 'static,
        F: Fn(&R, &Context) -> TaskResult<S> + Send + Sync + 'static,
    {
        self.tasks.push(Task::method(state, receiver, method));
        self
    }

    pub fn sub_machine<C: State>(mut self, state: S, sub_machine: SubMachine<S, C>) -> Self {
        self.tasks.push(sub_machine.into_task(state));
        self
    }

    /// Build the state machine.
    ///
    /// Fails with every duplicate binding and invalid config value found.
    pub fn build(self) -> Result<StateMachine<S>, BuildError> {
        let mut machine = match self.context {
            Some(context) => StateMachine::with_context(context),
            None => StateMachine::new(),
        };
        if let Some(name) = self.name {
            machine = machine.named(name);
        }

        let mut checks = vec![
            check_workers(self.config.max_workers),
            check_join_timeout(self.config.join_timeout),
            check_generation_limit(self.config.max_generations),
        ];
        machine = machine.with_config(self.config);

        for task in self.tasks {
            let check = match machine.bind(task) {
                Ok(_) => Validation::success(()),
                Err(err) => Validation::fail(BuildIssue::from(err)),
            };
            checks.push(check);
        }

        match Validation::all_vec(checks) {
            Validation::Success(_) => Ok(machine),
            Validation::Failure(issues) => Err(BuildError::Invalid {
                issues: issues.iter().cloned().collect(),
            }),
        }
    }
}

impl<S: State> Default for MachineBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

fn check_workers(max_workers: usize) -> Check {
    if max_workers == 0 {
        Validation::fail(BuildIssue::ZeroWorkers)
    } else {
        Validation::success(())
    }
}

fn check_join_timeout(timeout: Option<Duration>) -> Check {
    match timeout {
        Some(timeout) if timeout.is_zero() => Validation::fail(BuildIssue::ZeroJoinTimeout),
        _ => Validation::success(()),
    }
}

fn check_generation_limit(limit: Option<usize>) -> Check {
    match limit {
        Some(0) => Validation::fail(BuildIssue::ZeroGenerationLimit),
        _ => Validation::success(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::always;
    use crate::core::StateSet;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
    enum TestState {
        Initial,
        Processing,
        Complete,
    }

    impl State for TestState {
        fn name(&self) -> &str {
            match self {
                Self::Initial => "Initial",
                Self::Processing => "Processing",
                Self::Complete => "Complete",
            }
        }

        fn start() -> Self {
            Self::Initial
        }

        fn done() -> Self {
            Self::Complete
        }
    }

    struct Counter {
        step: TestState,
    }

    impl Counter {
        fn advance(&self, ctx: &Context) -> TaskResult<TestState> {
            ctx.update("ticks", |ticks: &mut u32| *ticks += 1)?;
            Ok(self.step.into())
        }
    }

    #[test]
    fn fluent_api_builds_machine() {
        let context = Arc::new(Context::new());
        context.insert("ticks", 0_u32);

        let machine = MachineBuilder::new()
            .name("fluent")
            .context(Arc::clone(&context))
            .on(TestState::Initial, always(TestState::Processing))
            .on_with(
                TestState::Processing,
                Arc::new(Counter {
                    step: TestState::Complete,
                }),
                Counter::advance,
            )
            .build()
            .unwrap();

        assert_eq!(machine.name(), "fluent");
        assert!(machine.has_task(&TestState::Processing));

        let summary = machine.run().unwrap();
        assert!(summary.is_done());
        assert_eq!(context.get::<u32>("ticks"), Ok(1));
        assert_eq!(summary.final_states, StateSet::single(TestState::Complete));
    }

    #[test]
    fn builder_accumulates_all_issues() {
        let result = MachineBuilder::new()
            .config(
                EngineConfig::new()
                    .with_max_workers(0)
                    .with_join_timeout(Duration::ZERO),
            )
            .on(TestState::Initial, always(TestState::Processing))
            .on(TestState::Initial, always(TestState::Complete))
            .build();

        let err = result.unwrap_err();
        assert_eq!(
            err.issues(),
            &[
                BuildIssue::ZeroWorkers,
                BuildIssue::ZeroJoinTimeout,
                BuildIssue::DuplicateState {
                    state: "Initial".to_string()
                },
            ]
        );
        assert!(err.to_string().contains("bound more than once"));
    }

    #[test]
    fn zero_generation_limit_is_rejected() {
        let result = MachineBuilder::<TestState>::new()
            .config(EngineConfig::new().with_max_generations(0))
            .build();

        assert!(matches!(
            result,
            Err(BuildError::Invalid { ref issues }) if issues == &[BuildIssue::ZeroGenerationLimit]
        ));
    }

    #[test]
    fn empty_builder_is_valid() {
        let machine = MachineBuilder::<TestState>::new().build().unwrap();
        assert!(machine.tasks().is_empty());
    }
}
