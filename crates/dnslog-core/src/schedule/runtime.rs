// # Tokio Scheduler
//
// Scheduler backed by `tokio::time`.
//
// Each repeating timer is a spawned task driving a `tokio::time::Interval`.
// The task stops when the handle is cancelled or dropped: the handle owns the
// sending half of a oneshot channel the task selects on.

use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};

use crate::Error;
use crate::traits::scheduler::{Scheduler, TickFn, TimerHandle};

/// Shortest period a timer is driven at
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Scheduler running on the Tokio runtime it was created in
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    runtime: Handle,
    origin: Instant,
}

impl TokioScheduler {
    /// Create a scheduler bound to the current Tokio runtime
    ///
    /// # Errors
    ///
    /// Returns an error when called outside a Tokio runtime.
    pub fn new() -> Result<Self, Error> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::config(format!("TokioScheduler needs a Tokio runtime: {}", e)))?;
        Ok(Self {
            runtime,
            origin: Instant::now(),
        })
    }
}

impl Scheduler for TokioScheduler {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn schedule_repeating(&self, period: Duration, tick: TickFn) -> TimerHandle {
        let period = period.max(MIN_PERIOD);
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        self.runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            // A late tick is not made up for with a burst
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut cancel_rx => break,
                    _ = interval.tick() => tick(),
                }
            }
            tracing::trace!("Timer task finished");
        });

        TimerHandle::new(move || {
            let _ = cancel_tx.send(());
        })
    }
}
