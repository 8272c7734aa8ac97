//! Bounded worker pool for concurrent steps.
//!
//! Each concurrent step pushes one job per branch onto a shared queue and
//! spawns at most `max_workers` threads to drain it. Results come back over
//! a channel and are put back in branch order before the step merges them.

use crate::context::Context;
use crate::core::{State, StateSet};
use crate::engine::config::EngineConfig;
use crate::engine::error::{EngineError, TaskError};
use crate::engine::task::Task;
use crossbeam_queue::SegQueue;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, Span};

/// How one branch ended.
pub(crate) enum BranchResult<S: State> {
    Completed(Result<StateSet<S>, TaskError>),
    Panicked(String),
}

/// Result of one branch, tagged with its position in the fan-out.
pub(crate) struct BranchOutcome<S: State> {
    index: usize,
    pub(crate) state: S,
    pub(crate) result: BranchResult<S>,
}

impl<S: State> BranchOutcome<S> {
    pub(crate) fn into_successors(self) -> Result<StateSet<S>, EngineError> {
        let state = self.state.name().to_string();
        match self.result {
            BranchResult::Completed(Ok(next)) => Ok(next),
            BranchResult::Completed(Err(source)) => Err(EngineError::TaskFailed { state, source }),
            BranchResult::Panicked(message) => Err(EngineError::TaskPanicked { state, message }),
        }
    }
}

/// Run every task on the pool and wait for all of them.
///
/// Outcomes are returned in the order the tasks were given. Fails only if
/// a worker cannot be spawned or the configured join timeout expires.
pub(crate) fn run_branches<S: State>(
    machine: &str,
    tasks: Vec<Task<S>>,
    ctx: &Arc<Context>,
    config: &EngineConfig,
) -> Result<Vec<BranchOutcome<S>>, EngineError> {
    let total = tasks.len();
    let states: Vec<S> = tasks.iter().map(|task| task.state().clone()).collect();

    let queue = Arc::new(SegQueue::new());
    for (index, task) in tasks.into_iter().enumerate() {
        queue.push((index, task));
    }

    let (tx, rx) = mpsc::channel::<BranchOutcome<S>>();
    let workers = config.workers_for(total);
    debug!(branches = total, workers, "dispatching fan-out");

    for worker in 0..workers {
        let queue = Arc::clone(&queue);
        let ctx = Arc::clone(ctx);
        let tx = tx.clone();
        let span = Span::current();

        thread::Builder::new()
            .name(format!("{machine}-worker-{worker}"))
            .spawn(move || {
                let _entered = span.enter();
                while let Some((index, task)) = queue.pop() {
                    let state = task.state().clone();
                    let result = match panic::catch_unwind(AssertUnwindSafe(|| task.call(&ctx))) {
                        Ok(result) => BranchResult::Completed(result),
                        Err(payload) => BranchResult::Panicked(panic_message(payload.as_ref())),
                    };
                    // The receiver is gone once the join has timed out.
                    if tx.send(BranchOutcome { index, state, result }).is_err() {
                        break;
                    }
                }
            })
            .map_err(EngineError::Spawn)?;
    }
    drop(tx);

    let deadline = config.join_timeout.map(|timeout| (timeout, Instant::now() + timeout));
    let mut slots: Vec<Option<BranchOutcome<S>>> = (0..total).map(|_| None).collect();
    let mut received = 0;

    while received < total {
        let outcome = match deadline {
            Some((timeout, deadline)) => {
                match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(outcome) => outcome,
                    Err(RecvTimeoutError::Timeout) => {
                        let pending = pending_names(&slots, &states);
                        return Err(EngineError::JoinTimeout { timeout, pending });
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(outcome) => outcome,
                Err(_) => break,
            },
        };
        let index = outcome.index;
        slots[index] = Some(outcome);
        received += 1;
    }

    // Every sender is gone but some branch never reported: its worker died
    // outside the handler.
    Ok(slots
        .into_iter()
        .zip(states)
        .enumerate()
        .map(|(index, (slot, state))| {
            slot.unwrap_or_else(|| BranchOutcome {
                index,
                state,
                result: BranchResult::Panicked("worker exited without reporting".to_string()),
            })
        })
        .collect())
}

fn pending_names<S: State>(slots: &[Option<BranchOutcome<S>>], states: &[S]) -> Vec<String> {
    slots
        .iter()
        .zip(states)
        .filter(|(slot, _)| slot.is_none())
        .map(|(_, state)| state.name().to_string())
        .collect()
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
