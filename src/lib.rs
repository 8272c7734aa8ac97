//! Switchyard: a finite state machine engine with a typed shared context.
//!
//! Handlers are bound to states of a user-defined enum. Each handler reads
//! and writes a shared [`Context`] and returns the set of states that should
//! run next. One successor continues sequentially on the caller's thread;
//! several fan out onto a bounded worker pool and are joined, with duplicate
//! successors merged, before the machine moves on. A whole machine can be
//! embedded as a single state of another through [`SubMachine`].
//!
//! # Core Concepts
//!
//! - **State**: a domain enum with a start and a done member, via the
//!   [`State`] trait or the [`state_enum!`] macro
//! - **Context**: thread-safe, type-checked key/value store shared by all
//!   handlers of a run
//! - **Task**: the handler bound to one state
//! - **History**: immutable record of every step a run took
//!
//! # Example
//!
//! ```rust
//! use switchyard::{state_enum, Context, StateMachine};
//!
//! state_enum! {
//!     enum Review { Submit, Lint, Test, Merge, Done }
//!     start: Submit
//!     done: Done
//! }
//!
//! let mut machine = StateMachine::new();
//! machine.context().insert("checks", 0_u32);
//!
//! machine
//!     .on(Review::Submit, |_ctx: &Context| Ok([Review::Lint, Review::Test].into()))?
//!     .on(Review::Lint, |ctx: &Context| {
//!         ctx.update("checks", |n: &mut u32| *n += 1)?;
//!         Ok(Review::Merge.into())
//!     })?
//!     .on(Review::Test, |ctx: &Context| {
//!         ctx.update("checks", |n: &mut u32| *n += 1)?;
//!         Ok(Review::Merge.into())
//!     })?
//!     .on(Review::Merge, |_ctx: &Context| Ok(Review::Done.into()))?;
//!
//! let summary = machine.run()?;
//! assert!(summary.is_done());
//! assert_eq!(machine.context().get::<u32>("checks")?, 2);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod builder;
pub mod context;
pub mod core;
pub mod engine;
pub mod logging;

// Re-export commonly used types
pub use builder::{BuildError, MachineBuilder};
pub use context::{Context, ContextError};
pub use crate::core::{RunHistory, State, StateSet, StepMode, StepRecord};
pub use engine::{
    EngineConfig, EngineError, RegistrationError, RunSummary, StallPolicy, StateMachine,
    SubMachine, SubMachineError, TaskError, TaskResult, Termination,
};
