//! Builder API for ergonomic state machine construction.
//!
//! This module provides a validating builder, ready-made handlers for
//! unconditional transitions, and the [`state_enum!`](crate::state_enum)
//! macro.

pub mod error;
pub mod machine;
pub mod macros;

pub use error::{BuildError, BuildIssue};
pub use machine::MachineBuilder;

use crate::context::Context;
use crate::core::{State, StateSet};
use crate::engine::TaskResult;

/// Handler that always moves to `next`.
///
/// # Example
///
/// ```
/// use switchyard::builder::always;
/// use switchyard::{state_enum, StateMachine};
///
/// state_enum! {
///     enum MyState { Start, End }
///     start: Start
///     done: End
/// }
///
/// let mut machine = StateMachine::new();
/// machine.on(MyState::Start, always(MyState::End)).unwrap();
/// assert!(machine.run().unwrap().is_done());
/// ```
pub fn always<S: State>(next: S) -> impl Fn(&Context) -> TaskResult<S> + Send + Sync + 'static {
    move |_ctx: &Context| Ok(StateSet::single(next.clone()))
}

/// Handler that always fans out to every state in `next`.
///
/// # Example
///
/// ```
/// use switchyard::builder::{always, fan_out};
/// use switchyard::{state_enum, StateMachine};
///
/// state_enum! {
///     enum Job { Start, Left, Right, Done }
///     start: Start
///     done: Done
/// }
///
/// let mut machine = StateMachine::new();
/// machine
///     .on(Job::Start, fan_out([Job::Left, Job::Right]))
///     .unwrap()
///     .on(Job::Left, always(Job::Done))
///     .unwrap()
///     .on(Job::Right, always(Job::Done))
///     .unwrap();
///
/// let summary = machine.run().unwrap();
/// assert_eq!(summary.generations, 2);
/// ```
pub fn fan_out<S, I>(next: I) -> impl Fn(&Context) -> TaskResult<S> + Send + Sync + 'static
where
    S: State,
    I: IntoIterator<Item = S>,
{
    let next: StateSet<S> = next.into_iter().collect();
    move |_ctx: &Context| Ok(next.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
    enum TestState {
        Start,
        Middle,
        End,
    }

    impl State for TestState {
        fn name(&self) -> &str {
            match self {
                Self::Start => "Start",
                Self::Middle => "Middle",
                Self::End => "End",
            }
        }

        fn start() -> Self {
            Self::Start
        }

        fn done() -> Self {
            Self::End
        }
    }

    #[test]
    fn always_returns_single_state() {
        let handler = always(TestState::Middle);
        let ctx = Context::new();

        assert_eq!(handler(&ctx).unwrap(), StateSet::single(TestState::Middle));
        assert_eq!(handler(&ctx).unwrap(), StateSet::single(TestState::Middle));
    }

    #[test]
    fn fan_out_deduplicates_targets() {
        let handler = fan_out([TestState::Middle, TestState::End, TestState::Middle]);
        let ctx = Context::new();

        let next = handler(&ctx).unwrap();
        assert_eq!(next.len(), 2);
        assert!(next.is_concurrent());
    }
}
