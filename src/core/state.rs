//! State identity and the active state set.
//!
//! States come from a user-defined, totally ordered domain. Every domain
//! names two sentinels: the state a run begins in and the state after
//! which nothing more is dispatched.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for state machine states.
///
/// # Required Traits
///
/// - `Clone`: states are copied into history records and successor sets
/// - `Ord`: the task table is keyed by state
/// - `Debug`: states are debuggable for diagnostics
/// - `Serialize` + `Deserialize`: run history is serializable
/// - `Send` + `Sync`: states cross fan-out worker threads
///
/// # Example
///
/// ```rust
/// use switchyard::core::State;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
/// enum Color {
///     Red,
///     Blue,
///     Green,
/// }
///
/// impl State for Color {
///     fn name(&self) -> &str {
///         match self {
///             Self::Red => "Red",
///             Self::Blue => "Blue",
///             Self::Green => "Green",
///         }
///     }
///
///     fn start() -> Self {
///         Self::Red
///     }
///
///     fn done() -> Self {
///         Self::Green
///     }
/// }
///
/// assert!(Color::Red.is_start());
/// assert!(Color::Green.is_done());
/// assert!(!Color::Blue.is_done());
/// ```
pub trait State:
    Clone + Eq + Ord + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static
{
    /// Get the state's name for display/logging.
    fn name(&self) -> &str;

    /// The state every run begins in.
    fn start() -> Self;

    /// The terminal state. Once it is the only active state the run ends.
    fn done() -> Self;

    /// Check if this is the start sentinel.
    fn is_start(&self) -> bool {
        *self == Self::start()
    }

    /// Check if this is the terminal sentinel.
    fn is_done(&self) -> bool {
        *self == Self::done()
    }
}

/// Ordered, duplicate-free collection of states.
///
/// Handlers return a `StateSet` naming the states that should run next, and
/// the engine keeps one as its active state set. Insertion order is kept;
/// inserting a state that is already present is a no-op.
///
/// ```rust
/// # use switchyard::core::{State, StateSet};
/// # use serde::{Deserialize, Serialize};
/// # #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
/// # enum Work { Start, One, Two, Done }
/// # impl State for Work {
/// #     fn name(&self) -> &str { "Work" }
/// #     fn start() -> Self { Self::Start }
/// #     fn done() -> Self { Self::Done }
/// # }
/// let mut next: StateSet<Work> = [Work::One, Work::Done].into();
/// next.merge([Work::Done, Work::Two]);
///
/// assert_eq!(next.as_slice(), &[Work::One, Work::Done, Work::Two]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateSet<S: State> {
    states: Vec<S>,
}

impl<S: State> StateSet<S> {
    /// An empty set. Returned from a handler, it halts the machine.
    pub fn new() -> Self {
        Self { states: Vec::new() }
    }

    pub fn single(state: S) -> Self {
        Self {
            states: vec![state],
        }
    }

    /// Insert a state, returning `false` if it was already present.
    pub fn insert(&mut self, state: S) -> bool {
        if self.states.contains(&state) {
            return false;
        }
        self.states.push(state);
        true
    }

    /// Merge another set (or anything iterable over states) into this one,
    /// skipping states already present.
    pub fn merge<I>(&mut self, other: I)
    where
        I: IntoIterator<Item = S>,
    {
        for state in other {
            self.insert(state);
        }
    }

    pub fn contains(&self, state: &S) -> bool {
        self.states.contains(state)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// The set holds more than one state, so the next step fans out.
    pub fn is_concurrent(&self) -> bool {
        self.states.len() > 1
    }

    pub fn first(&self) -> Option<&S> {
        self.states.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, S> {
        self.states.iter()
    }

    pub fn as_slice(&self) -> &[S] {
        &self.states
    }

    pub fn into_vec(self) -> Vec<S> {
        self.states
    }

    /// State names joined for log output.
    pub fn names(&self) -> String {
        self.states
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl<S: State> Default for StateSet<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State> From<S> for StateSet<S> {
    fn from(state: S) -> Self {
        Self::single(state)
    }
}

impl<S: State> From<Vec<S>> for StateSet<S> {
    fn from(states: Vec<S>) -> Self {
        states.into_iter().collect()
    }
}

impl<S: State, const N: usize> From<[S; N]> for StateSet<S> {
    fn from(states: [S; N]) -> Self {
        states.into_iter().collect()
    }
}

impl<S: State> FromIterator<S> for StateSet<S> {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        set.merge(iter);
        set
    }
}

impl<S: State> IntoIterator for StateSet<S> {
    type Item = S;
    type IntoIter = std::vec::IntoIter<S>;

    fn into_iter(self) -> Self::IntoIter {
        self.states.into_iter()
    }
}

impl<'a, S: State> IntoIterator for &'a StateSet<S> {
    type Item = &'a S;
    type IntoIter = std::slice::Iter<'a, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.states.iter()
    }
}
