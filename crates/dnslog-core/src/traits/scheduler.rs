// # Scheduler Trait
//
// Defines the timer capability injected into the polling engine.
//
// ## Purpose
//
// The engine never calls `tokio::time` directly. It asks a scheduler for the
// current time and for repeating timers, and cancels them through the
// returned handle. Production uses `TokioScheduler`; tests use
// `ManualScheduler`, whose clock only moves when the test advances it.
//
// ## Usage
//
// ```rust,ignore
// use dnslog_core::Scheduler;
// use std::sync::Arc;
// use std::time::Duration;
//
// let scheduler = /* Scheduler implementation */;
// let handle = scheduler.schedule_repeating(
//     Duration::from_secs(2),
//     Arc::new(|| println!("tick")),
// );
// handle.cancel();
// ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked on every timer tick
///
/// Ticks run synchronously on the scheduler; anything slow must be spawned.
pub type TickFn = Arc<dyn Fn() + Send + Sync>;

/// Handle to a scheduled repeating timer
///
/// Cancelling is idempotent. Dropping the handle cancels the timer, so a
/// timer can never outlive its owner.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl TimerHandle {
    /// Wrap the scheduler-specific cancellation action
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop future ticks
    pub fn cancel(mut self) {
        self.cancel_inner();
    }

    fn cancel_inner(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel_inner();
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Trait for timer capabilities
///
/// # Contract
///
/// - The first tick fires one `period` after scheduling, never immediately
/// - Tick *N+1* fires strictly after tick *N*
/// - After `cancel()` (or drop) returns, no further tick starts
pub trait Scheduler: Send + Sync {
    /// Monotonic time since the scheduler was created
    fn now(&self) -> Duration;

    /// Invoke `tick` every `period` until the handle is cancelled
    fn schedule_repeating(&self, period: Duration, tick: TickFn) -> TimerHandle;
}
