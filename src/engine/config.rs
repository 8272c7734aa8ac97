//! Engine configuration.

use std::env;
use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;
use thiserror::Error;

pub const ENV_MAX_WORKERS: &str = "SWITCHYARD_MAX_WORKERS";
pub const ENV_JOIN_TIMEOUT_MS: &str = "SWITCHYARD_JOIN_TIMEOUT_MS";
pub const ENV_MAX_GENERATIONS: &str = "SWITCHYARD_MAX_GENERATIONS";

/// Errors reading configuration from the environment.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Environment variable {var}='{value}' is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Tuning knobs for a [`StateMachine`](crate::engine::StateMachine).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on worker threads for one concurrent step.
    pub max_workers: usize,

    /// How long a concurrent step waits for its branches. `None` waits forever.
    pub join_timeout: Option<Duration>,

    /// Abort the run after this many generations. `None` means no limit;
    /// a machine that cycles will then run until a handler stops it.
    pub max_generations: Option<usize>,

    /// Keep a [`RunHistory`](crate::core::RunHistory) of every step.
    pub record_history: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            join_timeout: None,
            max_generations: None,
            record_history: true,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = Some(timeout);
        self
    }

    pub fn with_max_generations(mut self, limit: usize) -> Self {
        self.max_generations = Some(limit);
        self
    }

    pub fn with_history(mut self, record: bool) -> Self {
        self.record_history = record;
        self
    }

    /// Defaults overlaid with `SWITCHYARD_*` environment variables.
    ///
    /// - `SWITCHYARD_MAX_WORKERS`: worker threads per concurrent step
    /// - `SWITCHYARD_JOIN_TIMEOUT_MS`: join timeout in milliseconds
    /// - `SWITCHYARD_MAX_GENERATIONS`: generation limit
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Defaults overlaid with values from `lookup`, keyed by the
    /// `SWITCHYARD_*` variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_MAX_WORKERS) {
            config.max_workers = parse_positive(ENV_MAX_WORKERS, &value)?;
        }
        if let Some(value) = lookup(ENV_JOIN_TIMEOUT_MS) {
            let millis = parse_positive(ENV_JOIN_TIMEOUT_MS, &value)?;
            config.join_timeout = Some(Duration::from_millis(millis as u64));
        }
        if let Some(value) = lookup(ENV_MAX_GENERATIONS) {
            config.max_generations = Some(parse_positive(ENV_MAX_GENERATIONS, &value)?);
        }

        Ok(config)
    }

    /// Worker threads to spawn for a fan-out of `branches` states.
    pub(crate) fn workers_for(&self, branches: usize) -> usize {
        self.max_workers.max(1).min(branches.max(1))
    }
}

fn parse_positive(var: &'static str, value: &str) -> Result<usize, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason,
    };

    match value.trim().parse::<usize>() {
        Ok(0) => Err(invalid("must be greater than zero".to_string())),
        Ok(parsed) => Ok(parsed),
        Err(e) => Err(invalid(e.to_string())),
    }
}
