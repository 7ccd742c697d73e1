//! Polling engine
//!
//! The PollingEngine is responsible for:
//! - Dispatching one fetch immediately when a session starts
//! - Dispatching one fetch per scheduler tick afterwards
//! - Expiring the session once its time budget is spent
//! - Rescheduling when the interval changes mid-session
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Scheduler  │─── tick ───┐
//! └─────────────┘            │
//!                            ▼
//!                   ┌────────────────┐
//!                   │ PollingEngine  │
//!                   └────────────────┘
//!                            │
//!              ┌─────────────┴─────────────┐
//!              │                           │
//!              ▼                           ▼
//!     ┌────────────────┐          ┌──────────────┐
//!     │ PollTask       │          │   Events     │
//!     │ (spawned)      │          │  (notify)    │
//!     └────────────────┘          └──────────────┘
//! ```
//!
//! ## State Machine
//!
//! ```text
//! Idle ── start ──▶ Running ── stop ──▶ Idle
//!                      │
//!                      └── budget spent ──▶ Expired ── start ──▶ Running
//! ```
//!
//! ## Tick Flow
//!
//! 1. Ignore ticks from a timer that has since been replaced
//! 2. If the time budget is spent, cancel the timer and expire
//! 3. Otherwise spawn `PollTask::poll_once()` and return immediately
//!
//! Fetches are fire-and-forget: a slow fetch neither delays nor skips the
//! next tick, and `stop()` does not abort fetches already in flight.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::config::{MIN_POLL_INTERVAL, PollConfig};
use crate::error::{Error, Result};
use crate::traits::{PollTask, Scheduler, TimerHandle};

/// Events emitted by the PollingEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A session started
    Started {
        interval: Duration,
        max_duration: Option<Duration>,
    },

    /// A fetch was handed to the runtime
    FetchDispatched {
        /// Scheduler time of the dispatch
        at: Duration,
    },

    /// The interval changed
    IntervalChanged {
        interval: Duration,
    },

    /// The time budget ran out
    Expired {
        /// Time since the session started
        elapsed: Duration,
    },

    /// The session was stopped
    Stopped,
}

/// Lifecycle phase of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollPhase {
    /// No timer scheduled
    #[default]
    Idle,
    /// Timer scheduled, fetching on every tick
    Running,
    /// The time budget ran out; no timer scheduled
    Expired,
}

/// Read-only view of the current polling session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSession {
    pub phase: PollPhase,
    /// Scheduler time the session started; `None` unless running
    pub started_at: Option<Duration>,
    pub interval: Duration,
    pub max_duration: Option<Duration>,
}

impl PollSession {
    pub fn is_active(&self) -> bool {
        self.phase == PollPhase::Running
    }
}

/// Polling engine
///
/// The engine drives one [`PollTask`] on a [`Scheduler`]. It never waits on
/// the task: each dispatch is spawned on the Tokio runtime.
///
/// ## Lifecycle
///
/// 1. Create with [`PollingEngine::new()`]
/// 2. Start a session with [`PollingEngine::start()`]
/// 3. The session runs until [`PollingEngine::stop()`] or until it expires
/// 4. Drop to cancel any scheduled timer
///
/// ## Timer Ownership
///
/// At most one timer is alive at a time. Every start, stop, expiry and
/// interval change bumps a generation counter; a tick carrying an older
/// generation is ignored, so a replaced timer can never double-tick.
///
/// ## Load Resistance
///
/// Events go through a bounded channel. When it is full, new events are
/// dropped with a warning rather than blocking a tick.
pub struct PollingEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    /// Clock and timers
    scheduler: Arc<dyn Scheduler>,

    /// Work performed per tick
    task: Arc<dyn PollTask>,

    /// Mutable session state
    state: Mutex<EngineState>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

struct EngineState {
    phase: PollPhase,
    config: PollConfig,
    started_at: Option<Duration>,
    generation: u64,
    timer: Option<TimerHandle>,
}

impl PollingEngine {
    /// Create a new polling engine
    ///
    /// # Parameters
    ///
    /// - `scheduler`: Clock and timer implementation
    /// - `task`: Fetch performed on every tick
    /// - `config`: Initial polling configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver)
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        task: Arc<dyn PollTask>,
        config: PollConfig,
    ) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity.max(1));

        let inner = Arc::new(EngineInner {
            scheduler,
            task,
            state: Mutex::new(EngineState {
                phase: PollPhase::Idle,
                config,
                started_at: None,
                generation: 0,
                timer: None,
            }),
            event_tx,
        });

        (Self { inner }, event_rx)
    }

    /// Start a polling session
    ///
    /// A running session is cancelled first. One fetch is dispatched right
    /// away, then one per `config.interval()`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for a zero interval; the engine is left
    /// untouched.
    pub fn start(&self, config: PollConfig) -> Result<()> {
        if config.interval_ms == 0 {
            return Err(Error::invalid_input("Poll interval must be > 0"));
        }

        let now = self.inner.scheduler.now();
        let (generation, previous) = {
            let mut state = self.inner.lock();
            state.generation += 1;
            state.phase = PollPhase::Running;
            state.started_at = Some(now);
            state.config = PollConfig {
                event_channel_capacity: state.config.event_channel_capacity,
                ..config
            };
            (state.generation, state.timer.take())
        };
        if previous.is_some() {
            debug!("Replacing the running poll session");
        }
        drop(previous);

        info!(
            "Polling started: task={} interval={}ms max_duration={}ms",
            self.inner.task.task_name(),
            config.interval_ms,
            config.max_duration_ms
        );
        self.inner.emit_event(EngineEvent::Started {
            interval: config.interval(),
            max_duration: config.max_duration(),
        });

        self.inner.dispatch(now);
        EngineInner::arm(&self.inner, generation, config.interval());
        Ok(())
    }

    /// Stop the current session
    ///
    /// Idempotent. Fetches already in flight still complete.
    pub fn stop(&self) {
        let timer = {
            let mut state = self.inner.lock();
            state.generation += 1;
            state.phase = PollPhase::Idle;
            state.started_at = None;
            state.timer.take()
        };

        if let Some(timer) = timer {
            timer.cancel();
            info!("Polling stopped");
            self.inner.emit_event(EngineEvent::Stopped);
        }
    }

    /// Change the polling interval
    ///
    /// A running session is rescheduled at the new interval and keeps its
    /// start time, so expiry is still measured from the original start.
    ///
    /// # Returns
    ///
    /// `false` (and no change) when `interval` is below 500 ms
    pub fn set_interval(&self, interval: Duration) -> bool {
        if interval < MIN_POLL_INTERVAL {
            warn!(
                "Ignoring poll interval of {}ms (minimum is {}ms)",
                interval.as_millis(),
                MIN_POLL_INTERVAL.as_millis()
            );
            return false;
        }

        let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        let (rearm, previous) = {
            let mut state = self.inner.lock();
            state.config.interval_ms = interval_ms;
            if state.phase == PollPhase::Running {
                state.generation += 1;
                (Some(state.generation), state.timer.take())
            } else {
                (None, None)
            }
        };
        drop(previous);

        if let Some(generation) = rearm {
            EngineInner::arm(&self.inner, generation, interval);
        }
        debug!("Poll interval set to {}ms", interval_ms);
        self.inner.emit_event(EngineEvent::IntervalChanged { interval });
        true
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> PollPhase {
        self.inner.lock().phase
    }

    pub fn is_running(&self) -> bool {
        self.phase() == PollPhase::Running
    }

    /// Snapshot of the current session
    pub fn session(&self) -> PollSession {
        let state = self.inner.lock();
        PollSession {
            phase: state.phase,
            started_at: state.started_at,
            interval: state.config.interval(),
            max_duration: state.config.max_duration(),
        }
    }
}

impl std::fmt::Debug for PollingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingEngine")
            .field("task", &self.inner.task.task_name())
            .field("session", &self.session())
            .finish()
    }
}

impl EngineInner {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Schedule the repeating timer for `generation`
    ///
    /// The handle is discarded if another start/stop won the race meanwhile.
    fn arm(this: &Arc<Self>, generation: u64, interval: Duration) {
        let weak: Weak<Self> = Arc::downgrade(this);
        let handle = this.scheduler.schedule_repeating(
            interval,
            Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.on_tick(generation);
                }
            }),
        );

        let stale = {
            let mut state = this.lock();
            if state.generation == generation {
                state.timer = Some(handle);
                None
            } else {
                Some(handle)
            }
        };
        drop(stale);
    }

    fn on_tick(&self, generation: u64) {
        let now = self.scheduler.now();

        let expired = {
            let mut state = self.lock();
            if state.generation != generation || state.phase != PollPhase::Running {
                return;
            }

            let elapsed = state
                .started_at
                .map(|started| now.saturating_sub(started))
                .unwrap_or_default();
            match state.config.max_duration() {
                Some(max) if elapsed >= max => {
                    state.generation += 1;
                    state.phase = PollPhase::Expired;
                    state.started_at = None;
                    Some((elapsed, state.timer.take()))
                }
                _ => None,
            }
        };

        match expired {
            Some((elapsed, timer)) => {
                drop(timer);
                info!("Polling expired after {}ms", elapsed.as_millis());
                self.emit_event(EngineEvent::Expired { elapsed });
            }
            None => self.dispatch(now),
        }
    }

    /// Hand one fetch to the runtime without waiting for it
    fn dispatch(&self, at: Duration) {
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let task = self.task.clone();
                runtime.spawn(async move { task.poll_once().await });
                debug!("Fetch dispatched at {}ms", at.as_millis());
                self.emit_event(EngineEvent::FetchDispatched { at });
            }
            Err(_) => warn!("No Tokio runtime available, skipping fetch"),
        }
    }

    fn emit_event(&self, event: EngineEvent) {
        // Never block a tick on a slow consumer
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
