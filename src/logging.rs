//! Log setup for binaries and demos built on switchyard.
//!
//! The library only emits `tracing` events; nothing is printed until the
//! application installs a subscriber, for example with
//! [`LoggingConfig::init`].

use std::env;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Set to any value to enable verbose output with targets, thread ids and
/// source locations.
pub const ENV_DEBUG: &str = "SWITCHYARD_DEBUG";

const DEFAULT_FILTER: &str = "switchyard=info,warn";
const DEBUG_FILTER: &str = "switchyard=debug,info";

/// Global subscriber setup.
pub struct LoggingConfig;

impl LoggingConfig {
    /// Install a fmt subscriber filtered by `RUST_LOG`.
    ///
    /// Without `RUST_LOG`, switchyard logs at info (debug when
    /// `SWITCHYARD_DEBUG` is set) and everything else at warn. Fails if a
    /// global subscriber is already installed.
    ///
    /// ```no_run
    /// use switchyard::logging::LoggingConfig;
    ///
    /// LoggingConfig::init().expect("subscriber already installed");
    /// tracing::info!("ready");
    /// ```
    pub fn init() -> Result<(), TryInitError> {
        let is_debug = Self::is_debug();

        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(if is_debug { DEBUG_FILTER } else { DEFAULT_FILTER })
        });

        let fmt_layer = fmt::layer()
            .with_target(is_debug)
            .with_file(is_debug)
            .with_line_number(is_debug)
            .with_thread_ids(is_debug)
            .with_thread_names(is_debug);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        if is_debug {
            tracing::debug!("debug logging enabled");
        }
        Ok(())
    }

    /// Install a fmt subscriber with an explicit filter directive.
    pub fn init_with_filter(filter: &str) -> Result<(), TryInitError> {
        tracing_subscriber::registry()
            .with(EnvFilter::new(filter))
            .with(fmt::layer())
            .try_init()
    }

    pub fn is_debug() -> bool {
        env::var_os(ENV_DEBUG).is_some()
    }
}
