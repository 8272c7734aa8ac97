//! Task bindings: which handler runs for which state.

use crate::context::Context;
use crate::core::State;
use crate::engine::error::{RegistrationError, TaskResult};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Handler closure bound to the shared context.
pub type Handler<S> = Arc<dyn Fn(&Context) -> TaskResult<S> + Send + Sync>;

/// What a task delegates to. Used for diagnostics only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskKind {
    /// A free function or closure
    Handler,
    /// A method closed over a shared receiver
    Method { receiver: &'static str },
    /// A nested state machine
    SubMachine { machine: String },
}

/// Immutable binding of one state to its handler.
pub struct Task<S: State> {
    state: S,
    kind: TaskKind,
    handler: Handler<S>,
}

impl<S: State> Task<S> {
    /// Bind a closure to `state`.
    pub fn new<F>(state: S, handler: F) -> Self
    where
        F: Fn(&Context) -> TaskResult<S> + Send + Sync + 'static,
    {
        Self::from_parts(state, TaskKind::Handler, Arc::new(handler))
    }

    /// Bind a method of `receiver` to `state`.
    ///
    /// The receiver is shared with every invocation, including concurrent
    /// ones; it needs interior mutability to change between calls.
    pub fn method<R, F>(state: S, receiver: Arc<R>, method: F) -> Self
    where
        R: Send + Sync + 'static,
        F: Fn(&R, &Context) -> TaskResult<S> + Send + Sync + 'static,
    {
        Self::from_parts(
            state,
            TaskKind::Method {
                receiver: std::any::type_name::<R>(),
            },
            Arc::new(move |ctx: &Context| method(&receiver, ctx)),
        )
    }

    pub(crate) fn from_parts(state: S, kind: TaskKind, handler: Handler<S>) -> Self {
        Self {
            state,
            kind,
            handler,
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    /// Invoke the handler against `ctx`.
    pub fn call(&self, ctx: &Context) -> TaskResult<S> {
        (self.handler)(ctx)
    }
}

impl<S: State> Clone for Task<S> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            kind: self.kind.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<S: State> fmt::Debug for Task<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("state", &self.state)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Dispatch table from state to task.
///
/// The first binding for a state is kept; later ones are rejected.
pub struct TaskTable<S: State> {
    tasks: BTreeMap<S, Task<S>>,
}

impl<S: State> TaskTable<S> {
    pub fn new() -> Self {
        Self {
            tasks: BTreeMap::new(),
        }
    }

    /// Add a binding, rejecting a second one for the same state.
    pub fn bind(&mut self, task: Task<S>) -> Result<(), RegistrationError> {
        if self.tasks.contains_key(task.state()) {
            warn!(
                state = task.state().name(),
                "state already has a task bound, rejecting new binding"
            );
            return Err(RegistrationError::Duplicate {
                state: task.state().name().to_string(),
            });
        }
        self.tasks.insert(task.state().clone(), task);
        Ok(())
    }

    pub fn get(&self, state: &S) -> Option<&Task<S>> {
        self.tasks.get(state)
    }

    pub fn has_task(&self, state: &S) -> bool {
        self.tasks.contains_key(state)
    }

    /// Bound states in order.
    pub fn states(&self) -> impl Iterator<Item = &S> {
        self.tasks.keys()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<S: State> Default for TaskTable<S> {
    fn default() -> Self {
        Self::new()
    }
}
