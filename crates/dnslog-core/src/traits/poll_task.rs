// # Poll Task Trait
//
// One unit of work performed per polling tick.
//
// The engine dispatches `poll_once()` fire-and-forget: a slow fetch never
// delays the next tick, and several fetches may be in flight at once.
// Implementations therefore write their results back with a single
// synchronous session update after the await, and must tolerate completing
// after the engine was stopped.

use async_trait::async_trait;

#[async_trait]
pub trait PollTask: Send + Sync {
    /// Fetch once and write the outcome into the session
    async fn poll_once(&self);

    /// Task name (for logging)
    fn task_name(&self) -> &'static str;
}
