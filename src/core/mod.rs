//! Core state types.
//!
//! This module contains the pieces every other module builds on:
//! - State identity via the `State` trait
//! - The active state set handlers return and the engine tracks
//! - Immutable run history

mod history;
mod state;

pub use history::{RunHistory, StepMode, StepRecord};
pub use state::{State, StateSet};
