//! Run history tracking.
//!
//! Every step the engine takes is recorded as an immutable [`StepRecord`].
//! Recording returns a new history rather than mutating in place.

use super::state::{State, StateSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a step dispatched its handlers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepMode {
    /// One active state, run on the caller's thread.
    Sequential,
    /// Several active states, run on the worker pool and joined.
    Concurrent,
    /// The terminal handler, run once before the machine stops.
    Terminal,
}

/// Record of a single engine step.
///
/// # Example
///
/// ```rust
/// use switchyard::core::{State, StateSet, StepMode, StepRecord};
/// use serde::{Deserialize, Serialize};
/// use chrono::Utc;
///
/// #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
/// enum Phase { Begin, Middle, End }
///
/// impl State for Phase {
///     fn name(&self) -> &str {
///         match self {
///             Self::Begin => "Begin",
///             Self::Middle => "Middle",
///             Self::End => "End",
///         }
///     }
///     fn start() -> Self { Self::Begin }
///     fn done() -> Self { Self::End }
/// }
///
/// let now = Utc::now();
/// let record = StepRecord {
///     generation: 1,
///     mode: StepMode::Sequential,
///     active: StateSet::single(Phase::Begin),
///     next: StateSet::single(Phase::Middle),
///     started_at: now,
///     finished_at: now,
/// };
/// assert_eq!(record.generation, 1);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StepRecord<S: State> {
    /// 1-based generation counter of the run
    pub generation: usize,
    /// How the step dispatched
    pub mode: StepMode,
    /// States whose handlers ran in this step
    pub active: StateSet<S>,
    /// The merged successor set
    pub next: StateSet<S>,
    /// When the step was dispatched
    pub started_at: DateTime<Utc>,
    /// When the step's join completed
    pub finished_at: DateTime<Utc>,
}

/// Ordered history of engine steps for one run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct RunHistory<S: State> {
    steps: Vec<StepRecord<S>>,
}

impl<S: State> Default for RunHistory<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State> From<Vec<StepRecord<S>>> for RunHistory<S> {
    fn from(steps: Vec<StepRecord<S>>) -> Self {
        Self { steps }
    }
}

impl<S: State> RunHistory<S> {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Record a step, returning a new history.
    ///
    /// The existing history is left untouched.
    pub fn record(&self, step: StepRecord<S>) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self { steps }
    }

    /// Every state whose handler was dispatched, in step order.
    ///
    /// States of a concurrent step appear in branch order, which is not the
    /// order they actually ran in.
    pub fn visited(&self) -> Vec<&S> {
        self.steps.iter().flat_map(|step| step.active.iter()).collect()
    }

    /// Total duration from the first dispatch to the last join.
    ///
    /// Returns `None` if nothing was recorded.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.steps.first(), self.steps.last()) {
            let duration = last.finished_at.signed_duration_since(first.started_at);
            duration.to_std().ok()
        } else {
            None
        }
    }

    /// Number of steps that fanned out.
    pub fn concurrent_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.mode == StepMode::Concurrent)
            .count()
    }

    pub fn steps(&self) -> &[StepRecord<S>] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Pretty-printed JSON, for dumping a run to a file or log.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
