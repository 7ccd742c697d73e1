// # dnslog-core
//
// Client-side core for the DNSLog out-of-band DNS logging service.
//
// ## Architecture Overview
//
// This library provides everything a DNSLog client needs short of the wire:
// - **SharedSession**: The owned session tree every component reads and writes
// - **CredentialStore**: Resolves, validates and persists the access key
// - **RequestGateway**: Attaches the key, calls the backend, classifies failures
// - **PollingEngine**: Drives a poll task on an injected scheduler
// - **PersistenceManager**: Snapshots and restores the session tree
// - **TokenWatch / SubmitWatch**: The fetches performed on each tick
//
// Capabilities are traits so that the core stays deterministic under test:
// - **Transport**: One HTTP exchange (implemented by `dnslog-http`)
// - **KeyValueStore**: Durable client-side storage
// - **Scheduler**: Clock and repeating timers
//
// ## Design Principles
//
// 1. **Explicit state**: The session is constructed once and passed to each component
// 2. **Configuration once**: The environment is read in one place at startup
// 3. **Classified failures**: Every failed call surfaces as exactly one `ApiError`
// 4. **Non-fatal persistence**: Corrupt storage falls back to defaults

pub mod api;
pub mod classify;
pub mod config;
pub mod credential;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod model;
pub mod persist;
pub mod reconcile;
pub mod schedule;
pub mod session;
pub mod store;
pub mod token;
pub mod traits;
pub mod watch;

// Re-export core types for convenience
pub use api::{DnslogApi, PageQuery};
pub use classify::{classify, ApiError, ApiErrorKind};
pub use config::{ClientConfig, PollConfig, SortOrder, WatchConfig};
pub use credential::{is_valid_api_key_format, mask_api_key, Credential, CredentialSource, CredentialStore};
pub use engine::{EngineEvent, PollPhase, PollSession, PollingEngine};
pub use error::{Error, RestoreError, Result};
pub use gateway::RequestGateway;
pub use persist::PersistenceManager;
pub use reconcile::{reconcile, OnFailure, ReconcileMode};
pub use schedule::{ManualScheduler, TokioScheduler};
pub use session::{RuntimeConfig, SessionState, SharedSession};
pub use store::{FileStore, MemoryStore};
pub use token::{parse_token, Token, TokenRejected};
pub use traits::{KeyValueStore, PollTask, Scheduler, Transport};
pub use watch::{SubmitWatch, TokenWatch};
