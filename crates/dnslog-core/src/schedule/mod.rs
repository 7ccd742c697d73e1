// # Scheduler Implementations
//
// This module provides implementations of the Scheduler trait.
//
// - `TokioScheduler`: real timers on the Tokio runtime
// - `ManualScheduler`: virtual clock, advanced explicitly by tests

pub mod manual;
pub mod runtime;

pub use manual::ManualScheduler;
pub use runtime::TokioScheduler;
