//! The execution engine.

use crate::builder::MachineBuilder;
use crate::context::Context;
use crate::core::{RunHistory, State, StateSet, StepMode, StepRecord};
use crate::engine::config::EngineConfig;
use crate::engine::error::{EngineError, RegistrationError, TaskResult};
use crate::engine::fanout;
use crate::engine::submachine::SubMachine;
use crate::engine::task::{Task, TaskTable};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

/// Unique identifier of a machine instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MachineId(Uuid);

impl MachineId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Why a run stopped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub enum Termination<S: State> {
    /// The done state became the only active state.
    Done,
    /// No task is bound to the single active state.
    Stalled(S),
    /// A step produced no successor states.
    Exhausted,
}

/// Outcome of a completed run.
#[derive(Clone, Debug)]
pub struct RunSummary<S: State> {
    pub termination: Termination<S>,
    /// Steps that dispatched at least one non-terminal handler.
    pub generations: usize,
    /// Handler invocations, including the terminal handler.
    pub dispatched: usize,
    /// The active state set when the run stopped.
    pub final_states: StateSet<S>,
    /// Fan-out members dropped because no task was bound to them.
    pub unbound: Vec<S>,
    pub history: RunHistory<S>,
}

impl<S: State> RunSummary<S> {
    /// The run ended by reaching the done state.
    pub fn is_done(&self) -> bool {
        self.termination == Termination::Done
    }
}

/// Cloneable view of a machine's running flag, for liveness checks from
/// other threads while `run` blocks.
#[derive(Clone, Debug)]
pub struct RunningFlag(Arc<AtomicBool>);

impl RunningFlag {
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Clears the running flag however the run ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

enum Step<S: State> {
    Continue(StateSet<S>),
    Stop(Termination<S>),
}

/// Bookkeeping for one run.
struct RunLog<S: State> {
    generations: usize,
    dispatched: usize,
    unbound: Vec<S>,
    steps: Vec<StepRecord<S>>,
    record_history: bool,
}

impl<S: State> RunLog<S> {
    fn new(record_history: bool) -> Self {
        Self {
            generations: 0,
            dispatched: 0,
            unbound: Vec::new(),
            steps: Vec::new(),
            record_history,
        }
    }

    fn record(
        &mut self,
        mode: StepMode,
        active: StateSet<S>,
        next: StateSet<S>,
        started_at: DateTime<Utc>,
    ) {
        if !self.record_history {
            return;
        }
        self.steps.push(StepRecord {
            generation: self.generations,
            mode,
            active,
            next,
            started_at,
            finished_at: Utc::now(),
        });
    }

    fn finish(self, termination: Termination<S>, final_states: StateSet<S>) -> RunSummary<S> {
        RunSummary {
            termination,
            generations: self.generations,
            dispatched: self.dispatched,
            final_states,
            unbound: self.unbound,
            history: RunHistory::from(self.steps),
        }
    }
}

/// Finite state machine over the state domain `S`.
///
/// Handlers are registered per state, then [`StateMachine::run`] drives the
/// machine from `S::start()` until it stops. One active state runs on the
/// caller's thread; several fan out onto a bounded worker pool and are
/// joined before the next step.
///
/// # Example
///
/// ```rust
/// use switchyard::{state_enum, Context, StateMachine};
///
/// state_enum! {
///     pub enum Color { Red, Blue, Green }
///     start: Red
///     done: Green
/// }
///
/// let mut machine = StateMachine::new();
/// machine.context().insert("count", 0_i32);
///
/// machine
///     .on(Color::Red, |ctx: &Context| {
///         ctx.update("count", |c: &mut i32| *c += 1)?;
///         Ok(Color::Blue.into())
///     })?
///     .on(Color::Blue, |ctx: &Context| {
///         ctx.update("count", |c: &mut i32| *c += 1)?;
///         Ok(Color::Green.into())
///     })?;
///
/// let summary = machine.run()?;
/// assert!(summary.is_done());
/// assert_eq!(summary.generations, 2);
/// assert_eq!(machine.context().get::<i32>("count")?, 2);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct StateMachine<S: State> {
    id: MachineId,
    name: String,
    context: Arc<Context>,
    tasks: TaskTable<S>,
    config: EngineConfig,
    running: Arc<AtomicBool>,
    active: Mutex<StateSet<S>>,
}

impl<S: State> StateMachine<S> {
    /// Create a machine that owns a fresh, empty context.
    pub fn new() -> Self {
        Self::with_context(Arc::new(Context::new()))
    }

    /// Create a machine sharing `context` with the caller (and possibly
    /// with other machines).
    pub fn with_context(context: Arc<Context>) -> Self {
        let id = MachineId::new();
        Self {
            id,
            name: format!("machine-{}", &id.0.simple().to_string()[..8]),
            context,
            tasks: TaskTable::new(),
            config: EngineConfig::default(),
            running: Arc::new(AtomicBool::new(false)),
            active: Mutex::new(StateSet::single(S::start())),
        }
    }

    pub fn builder() -> MachineBuilder<S> {
        MachineBuilder::new()
    }

    /// Set a name for logs and error messages.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn id(&self) -> MachineId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Bind `handler` to `state`.
    ///
    /// A state takes one binding; registering it again is rejected and
    /// the first handler is kept.
    pub fn on<F>(&mut self, state: S, handler: F) -> Result<&mut Self, RegistrationError>
    where
        F: Fn(&Context) -> TaskResult<S> + Send + Sync + 'static,
    {
        self.bind(Task::new(state, handler))
    }

    /// Bind a method of a shared `receiver` to `state`.
    pub fn on_with<R, F>(
        &mut self,
        state: S,
        receiver: Arc<R>,
        method: F,
    ) -> Result<&mut Self, RegistrationError>
    where
        R: Send + Sync + 'static,
        F: Fn(&R, &Context) -> TaskResult<S> + Send + Sync + 'static,
    {
        self.bind(Task::method(state, receiver, method))
    }

    /// Run `nested` as the handler of `state`; once it reaches its done
    /// state the parent moves on to `output`.
    pub fn register_sub_machine<C: State>(
        &mut self,
        state: S,
        nested: StateMachine<C>,
        output: S,
    ) -> Result<&mut Self, RegistrationError> {
        self.on_sub_machine(state, SubMachine::new(nested, output))
    }

    /// Bind a configured [`SubMachine`] to `state`.
    pub fn on_sub_machine<C: State>(
        &mut self,
        state: S,
        sub_machine: SubMachine<S, C>,
    ) -> Result<&mut Self, RegistrationError> {
        self.bind(sub_machine.into_task(state))
    }

    pub(crate) fn bind(&mut self, task: Task<S>) -> Result<&mut Self, RegistrationError> {
        self.tasks.bind(task)?;
        Ok(self)
    }

    pub fn has_task(&self, state: &S) -> bool {
        self.tasks.has_task(state)
    }

    pub fn tasks(&self) -> &TaskTable<S> {
        &self.tasks
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn running_flag(&self) -> RunningFlag {
        RunningFlag(Arc::clone(&self.running))
    }

    /// Snapshot of the active state set.
    pub fn active_states(&self) -> StateSet<S> {
        self.active.lock().clone()
    }

    /// Drive the machine from its start state until it stops.
    ///
    /// Blocks the calling thread. Every call starts over from
    /// `S::start()`. A handler error or panic aborts the run with
    /// [`EngineError::TaskFailed`] or [`EngineError::TaskPanicked`],
    /// whichever thread the handler ran on; in a concurrent step all
    /// branches finish before the first failure is reported.
    pub fn run(&self) -> Result<RunSummary<S>, EngineError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(EngineError::AlreadyRunning {
                machine: self.name.clone(),
            });
        }
        let _running = RunningGuard(&self.running);

        let span = info_span!("run", machine = %self.name, id = %self.id);
        let _entered = span.enter();

        *self.active.lock() = StateSet::single(S::start());
        debug!(start = S::start().name(), "run started");

        let result = self.drive();
        match &result {
            Ok(summary) => info!(
                termination = ?summary.termination,
                generations = summary.generations,
                dispatched = summary.dispatched,
                "run finished"
            ),
            Err(err) => error!(error = %err, "run aborted"),
        }
        result
    }

    fn drive(&self) -> Result<RunSummary<S>, EngineError> {
        let mut log = RunLog::new(self.config.record_history);

        loop {
            let active = self.active_states();
            let step = if active.is_concurrent() {
                self.concurrent_step(active, &mut log)?
            } else {
                self.sequential_step(active, &mut log)?
            };

            match step {
                Step::Continue(next) if next.is_empty() => {
                    *self.active.lock() = StateSet::new();
                    return Ok(log.finish(Termination::Exhausted, StateSet::new()));
                }
                Step::Continue(next) => {
                    *self.active.lock() = next;
                }
                Step::Stop(termination) => {
                    return Ok(log.finish(termination, self.active_states()));
                }
            }
        }
    }

    fn check_generation_limit(&self, log: &RunLog<S>) -> Result<(), EngineError> {
        match self.config.max_generations {
            Some(limit) if log.generations >= limit => {
                Err(EngineError::GenerationLimit { limit })
            }
            _ => Ok(()),
        }
    }

    fn sequential_step(
        &self,
        active: StateSet<S>,
        log: &mut RunLog<S>,
    ) -> Result<Step<S>, EngineError> {
        let Some(state) = active.first().cloned() else {
            return Ok(Step::Stop(Termination::Exhausted));
        };

        let Some(task) = self.tasks.get(&state) else {
            if state.is_done() {
                return Ok(Step::Stop(Termination::Done));
            }
            debug!(state = state.name(), "no task bound, stopping");
            return Ok(Step::Stop(Termination::Stalled(state)));
        };

        let started_at = Utc::now();

        if state.is_done() {
            debug!(state = state.name(), "running terminal handler");
            let drained = self.call(task, &state)?;
            log.dispatched += 1;
            if drained.iter().any(|next| !next.is_done()) {
                debug!(ignored = %drained.names(), "terminal handler returned successors, ignoring");
            }
            log.record(StepMode::Terminal, active, drained, started_at);
            return Ok(Step::Stop(Termination::Done));
        }

        self.check_generation_limit(log)?;
        log.generations += 1;
        debug!(generation = log.generations, state = state.name(), "sequential step");

        let next = self.call(task, &state)?;
        log.dispatched += 1;
        log.record(StepMode::Sequential, active, next.clone(), started_at);
        Ok(Step::Continue(next))
    }

    fn concurrent_step(
        &self,
        active: StateSet<S>,
        log: &mut RunLog<S>,
    ) -> Result<Step<S>, EngineError> {
        let mut carried = StateSet::new();
        let mut tasks = Vec::with_capacity(active.len());

        for state in &active {
            if state.is_done() {
                carried.insert(state.clone());
                continue;
            }
            match self.tasks.get(state) {
                Some(task) => tasks.push(task.clone()),
                None => {
                    warn!(state = state.name(), "no task bound to fan-out member, dropping it");
                    log.unbound.push(state.clone());
                }
            }
        }

        if tasks.is_empty() {
            return Ok(match active.first() {
                Some(_) if !carried.is_empty() => Step::Continue(carried),
                Some(first) => Step::Stop(Termination::Stalled(first.clone())),
                None => Step::Stop(Termination::Exhausted),
            });
        }

        self.check_generation_limit(log)?;
        log.generations += 1;

        let dispatched: StateSet<S> = tasks.iter().map(|task| task.state().clone()).collect();
        debug!(
            generation = log.generations,
            states = %dispatched.names(),
            "concurrent step"
        );

        let started_at = Utc::now();
        let outcomes = fanout::run_branches(&self.name, tasks, &self.context, &self.config)?;
        log.dispatched += outcomes.len();

        let mut next = StateSet::new();
        for outcome in outcomes {
            next.merge(outcome.into_successors()?);
        }
        next.merge(carried);

        log.record(StepMode::Concurrent, dispatched, next.clone(), started_at);
        Ok(Step::Continue(next))
    }

    /// Run a handler on the caller's thread. A panic is reported the same
    /// way as one on a fan-out worker.
    fn call(&self, task: &Task<S>, state: &S) -> Result<StateSet<S>, EngineError> {
        let state = state.name().to_string();
        match panic::catch_unwind(AssertUnwindSafe(|| task.call(&self.context))) {
            Ok(result) => result.map_err(|source| EngineError::TaskFailed { state, source }),
            Err(payload) => Err(EngineError::TaskPanicked {
                state,
                message: fanout::panic_message(payload.as_ref()),
            }),
        }
    }
}

impl<S: State> Default for StateMachine<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State> fmt::Debug for StateMachine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("tasks", &self.tasks.len())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::TaskError;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
    enum Color {
        Red,
        Blue,
        Green,
    }

    impl State for Color {
        fn name(&self) -> &str {
            match self {
                Self::Red => "Red",
                Self::Blue => "Blue",
                Self::Green => "Green",
            }
        }

        fn start() -> Self {
            Self::Red
        }

        fn done() -> Self {
            Self::Green
        }
    }

    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
    enum Work {
        Start,
        Left,
        Right,
        Join,
        Done,
    }

    impl State for Work {
        fn name(&self) -> &str {
            match self {
                Self::Start => "Start",
                Self::Left => "Left",
                Self::Right => "Right",
                Self::Join => "Join",
                Self::Done => "Done",
            }
        }

        fn start() -> Self {
            Self::Start
        }

        fn done() -> Self {
            Self::Done
        }
    }

    #[test]
    fn no_start_handler_terminates_immediately() {
        let machine: StateMachine<Color> = StateMachine::new();

        let summary = machine.run().unwrap();

        assert_eq!(summary.termination, Termination::Stalled(Color::Red));
        assert_eq!(summary.generations, 0);
        assert_eq!(summary.dispatched, 0);
        assert!(!machine.is_running());
        assert_eq!(machine.active_states(), StateSet::single(Color::Red));
    }

    #[test]
    fn start_to_done_is_one_generation() {
        let mut machine = StateMachine::new();
        machine
            .on(Color::Red, |_ctx: &Context| Ok(Color::Green.into()))
            .unwrap();

        let summary = machine.run().unwrap();

        assert!(summary.is_done());
        assert_eq!(summary.generations, 1);
        assert_eq!(summary.final_states, StateSet::single(Color::Green));
    }

    #[test]
    fn terminal_handler_runs_once() {
        let drained = Arc::new(AtomicUsize::new(0));
        let mut machine = StateMachine::new();
        machine
            .on(Color::Red, |_ctx: &Context| Ok(Color::Green.into()))
            .unwrap();
        {
            let drained = Arc::clone(&drained);
            machine
                .on(Color::Green, move |_ctx: &Context| {
                    drained.fetch_add(1, Ordering::SeqCst);
                    Ok(Color::Red.into())
                })
                .unwrap();
        }

        let summary = machine.run().unwrap();

        assert!(summary.is_done());
        assert_eq!(drained.load(Ordering::SeqCst), 1);
        assert_eq!(summary.generations, 1);
        assert_eq!(summary.dispatched, 2);
        assert_eq!(summary.history.steps()[1].mode, StepMode::Terminal);
    }

    #[test]
    fn empty_successors_exhaust_the_run() {
        let mut machine = StateMachine::new();
        machine
            .on(Color::Red, |_ctx: &Context| Ok(StateSet::new()))
            .unwrap();

        let summary = machine.run().unwrap();

        assert_eq!(summary.termination, Termination::Exhausted);
        assert!(summary.final_states.is_empty());
        assert!(machine.active_states().is_empty());
    }

    #[test]
    fn duplicate_registration_keeps_first() {
        let mut machine = StateMachine::new();
        machine
            .on(Color::Red, |_ctx: &Context| Ok(Color::Green.into()))
            .unwrap();
        let err = machine
            .on(Color::Red, |_ctx: &Context| Ok(Color::Blue.into()))
            .unwrap_err();

        assert_eq!(
            err,
            RegistrationError::Duplicate {
                state: "Red".to_string()
            }
        );

        let summary = machine.run().unwrap();
        assert_eq!(summary.generations, 1);
        assert!(summary.is_done());
    }

    #[test]
    fn fan_out_joins_and_deduplicates() {
        let mut machine = StateMachine::new();
        machine
            .on(Work::Start, |_ctx: &Context| Ok([Work::Left, Work::Right].into()))
            .unwrap()
            .on(Work::Left, |_ctx: &Context| Ok(Work::Join.into()))
            .unwrap()
            .on(Work::Right, |_ctx: &Context| Ok(Work::Join.into()))
            .unwrap()
            .on(Work::Join, |_ctx: &Context| Ok(Work::Done.into()))
            .unwrap();

        let summary = machine.run().unwrap();

        assert!(summary.is_done());
        assert_eq!(summary.generations, 3);
        assert_eq!(summary.dispatched, 4);
        let concurrent = &summary.history.steps()[1];
        assert_eq!(concurrent.mode, StepMode::Concurrent);
        assert_eq!(concurrent.next, StateSet::single(Work::Join));
    }

    #[test]
    fn done_member_waits_for_siblings() {
        let mut machine = StateMachine::new();
        machine
            .on(Work::Start, |_ctx: &Context| Ok([Work::Done, Work::Left].into()))
            .unwrap()
            .on(Work::Left, |_ctx: &Context| Ok(Work::Right.into()))
            .unwrap()
            .on(Work::Right, |_ctx: &Context| Ok(Work::Done.into()))
            .unwrap();

        let summary = machine.run().unwrap();

        assert!(summary.is_done());
        let visited: Vec<_> = summary.history.visited().into_iter().copied().collect();
        assert_eq!(visited, vec![Work::Start, Work::Left, Work::Right]);
    }

    #[test]
    fn unbound_fan_out_members_are_reported() {
        let mut machine = StateMachine::new();
        machine
            .on(Work::Start, |_ctx: &Context| Ok([Work::Left, Work::Right].into()))
            .unwrap()
            .on(Work::Left, |_ctx: &Context| Ok(Work::Done.into()))
            .unwrap();

        let summary = machine.run().unwrap();

        assert!(summary.is_done());
        assert_eq!(summary.unbound, vec![Work::Right]);
    }

    #[test]
    fn handler_error_aborts_run() {
        let mut machine = StateMachine::new();
        machine
            .on(Color::Red, |ctx: &Context| {
                let missing: i32 = ctx.get("missing")?;
                let next = if missing > 0 { Color::Blue } else { Color::Green };
                Ok(next.into())
            })
            .unwrap();

        let err = machine.run().unwrap_err();

        match err {
            EngineError::TaskFailed { state, source } => {
                assert_eq!(state, "Red");
                assert!(source.to_string().contains("missing"));
            }
            other => panic!("Expected TaskFailed, got {other:?}"),
        }
        assert!(!machine.is_running());
    }

    #[test]
    fn branch_failure_is_reported_after_join() {
        let finished = Arc::new(AtomicUsize::new(0));
        let mut machine = StateMachine::new();
        machine
            .on(Work::Start, |_ctx: &Context| Ok([Work::Left, Work::Right].into()))
            .unwrap()
            .on(Work::Left, |_ctx: &Context| {
                Err(TaskError::from("left branch failed"))
            })
            .unwrap();
        {
            let finished = Arc::clone(&finished);
            machine
                .on(Work::Right, move |_ctx: &Context| {
                    std::thread::sleep(Duration::from_millis(20));
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(Work::Done.into())
                })
                .unwrap();
        }

        let err = machine.run().unwrap_err();

        assert!(matches!(err, EngineError::TaskFailed { ref state, .. } if state == "Left"));
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn self_transition_loops_until_handler_stops() {
        let mut machine = StateMachine::new();
        machine.context().insert("laps", 0_u32);
        machine
            .on(Color::Red, |ctx: &Context| {
                let laps = ctx.with_mut("laps", |laps: &mut u32| {
                    *laps += 1;
                    *laps
                })?;
                let next = if laps < 5 { Color::Red } else { Color::Green };
                Ok(next.into())
            })
            .unwrap();

        let summary = machine.run().unwrap();

        assert_eq!(summary.generations, 5);
        assert_eq!(machine.context().get::<u32>("laps"), Ok(5));
    }

    #[test]
    fn generation_limit_stops_cycles() {
        let mut machine = StateMachine::new().with_config(EngineConfig::new().with_max_generations(3));
        machine
            .on(Color::Red, |_ctx: &Context| Ok(Color::Blue.into()))
            .unwrap()
            .on(Color::Blue, |_ctx: &Context| Ok(Color::Red.into()))
            .unwrap();

        let err = machine.run().unwrap_err();

        assert!(matches!(err, EngineError::GenerationLimit { limit: 3 }));
    }

    #[test]
    fn run_restarts_from_start() {
        let mut machine = StateMachine::new();
        machine.context().insert("runs", 0_u32);
        machine
            .on(Color::Red, |ctx: &Context| {
                ctx.update("runs", |runs: &mut u32| *runs += 1)?;
                Ok(Color::Green.into())
            })
            .unwrap();

        machine.run().unwrap();
        machine.run().unwrap();

        assert_eq!(machine.context().get::<u32>("runs"), Ok(2));
    }

    #[test]
    fn history_can_be_disabled() {
        let mut machine = StateMachine::new().with_config(EngineConfig::new().with_history(false));
        machine
            .on(Color::Red, |_ctx: &Context| Ok(Color::Green.into()))
            .unwrap();

        let summary = machine.run().unwrap();

        assert!(summary.history.is_empty());
        assert_eq!(summary.generations, 1);
    }

    #[test]
    fn machine_names_default_and_override() {
        let machine: StateMachine<Color> = StateMachine::new();
        assert!(machine.name().starts_with("machine-"));

        let named: StateMachine<Color> = StateMachine::new().named("painter");
        assert_eq!(named.name(), "painter");
        assert_ne!(machine.id(), named.id());
    }

    #[test]
    fn sequential_panic_becomes_task_panicked() {
        let mut machine = StateMachine::new();
        machine
            .on(Color::Red, |_ctx: &Context| -> TaskResult<Color> {
                panic!("red handler blew up")
            })
            .unwrap();

        let err = machine.run().unwrap_err();

        match err {
            EngineError::TaskPanicked { state, message } => {
                assert_eq!(state, "Red");
                assert!(message.contains("red handler blew up"));
            }
            other => panic!("Expected TaskPanicked, got {other:?}"),
        }
        assert!(!machine.is_running());
    }

    fn spin(laps: u32, record_history: bool) -> (RunSummary<Color>, Duration) {
        let mut machine =
            StateMachine::new().with_config(EngineConfig::new().with_history(record_history));
        machine.context().insert("laps", 0_u32);
        machine
            .on(Color::Red, move |ctx: &Context| {
                let lap = ctx.with_mut("laps", |n: &mut u32| {
                    *n += 1;
                    *n
                })?;
                let next = if lap < laps { Color::Red } else { Color::Green };
                Ok(next.into())
            })
            .unwrap();

        let started = Instant::now();
        let summary = machine.run().unwrap();
        (summary, started.elapsed())
    }

    #[test]
    fn long_self_loop_records_history_in_linear_time() {
        let (without, off) = spin(10_000, false);
        let (with, on) = spin(10_000, true);

        assert_eq!(without.generations, 10_000);
        assert_eq!(with.history.steps().len(), 10_000);
        assert_eq!(with.history.steps()[9_999].generation, 10_000);
        assert!(
            on < off * 20 + Duration::from_millis(500),
            "history on took {on:?}, off took {off:?}"
        );
    }
}
