//! Core traits for the DNSLog client
//!
//! This module defines the capabilities the core is built on.
//!
//! - [`Transport`]: Perform one HTTP exchange
//! - [`KeyValueStore`]: Durable client-side storage
//! - [`Scheduler`]: Clock and repeating timers
//! - [`PollTask`]: The fetch performed on each polling tick

pub mod transport;
pub mod storage;
pub mod scheduler;
pub mod poll_task;

pub use transport::{Transport, HttpRequest, HttpResponse, Method, TransportError};
pub use storage::KeyValueStore;
pub use scheduler::{Scheduler, TickFn, TimerHandle};
pub use poll_task::PollTask;
