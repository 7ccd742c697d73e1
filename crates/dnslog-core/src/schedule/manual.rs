// # Manual Scheduler
//
// Scheduler with a virtual clock.
//
// Time only moves when `advance()` is called. Every timer that falls due
// during the advance fires, in time order, with the clock set to the exact
// due time. Timers due at the same instant fire in scheduling order.
//
// Ticks are invoked without the internal lock held, so a tick may cancel its
// own timer or schedule new ones.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::traits::scheduler::{Scheduler, TickFn, TimerHandle};

/// Shortest period a timer is driven at
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Deterministic scheduler for tests and simulations
///
/// # Example
///
/// ```rust
/// use dnslog_core::schedule::ManualScheduler;
/// use dnslog_core::traits::Scheduler;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
///
/// let scheduler = ManualScheduler::new();
/// let ticks = Arc::new(AtomicUsize::new(0));
/// let counter = ticks.clone();
/// let _timer = scheduler.schedule_repeating(
///     Duration::from_millis(500),
///     Arc::new(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     }),
/// );
///
/// scheduler.advance(Duration::from_millis(1600));
/// assert_eq!(ticks.load(Ordering::SeqCst), 3);
/// ```
#[derive(Clone, Default)]
pub struct ManualScheduler {
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_id: u64,
    timers: BTreeMap<u64, ManualTimer>,
}

struct ManualTimer {
    period: Duration,
    next_due: Duration,
    tick: TickFn,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `by`, firing every timer that falls due
    pub fn advance(&self, by: Duration) {
        let target = self.lock().now + by;

        loop {
            let due = {
                let mut state = self.lock();
                let next = state
                    .timers
                    .iter()
                    .filter(|(_, timer)| timer.next_due <= target)
                    .min_by_key(|(id, timer)| (timer.next_due, **id))
                    .map(|(id, timer)| (*id, timer.next_due));

                match next {
                    Some((id, due_at)) => {
                        state.now = due_at;
                        state.timers.get_mut(&id).map(|timer| {
                            timer.next_due += timer.period;
                            timer.tick.clone()
                        })
                    }
                    None => {
                        state.now = target;
                        None
                    }
                }
            };

            match due {
                Some(tick) => tick(),
                None => break,
            }
        }
    }

    /// Number of timers that have not been cancelled
    pub fn active_timers(&self) -> usize {
        self.lock().timers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &state.now)
            .field("active_timers", &state.timers.len())
            .finish()
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Duration {
        self.lock().now
    }

    fn schedule_repeating(&self, period: Duration, tick: TickFn) -> TimerHandle {
        let period = period.max(MIN_PERIOD);
        let id = {
            let mut state = self.lock();
            let id = state.next_id;
            state.next_id += 1;
            let next_due = state.now + period;
            state.timers.insert(
                id,
                ManualTimer {
                    period,
                    next_due,
                    tick,
                },
            );
            id
        };

        let inner = Arc::downgrade(&self.inner);
        TimerHandle::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .timers
                    .remove(&id);
            }
        })
    }
}
