// # Key/Value Store Trait
//
// Defines the interface for durable client-side storage.
//
// ## Purpose
//
// Durable storage survives process restarts. It holds:
// - The persisted credential (current and legacy keys)
// - The serialized session state tree
//
// Durability is an optimization: losing the store costs the user a re-entry
// of their domain and key, never correctness of a running session.
//
// ## Implementations
//
// - `MemoryStore`: in-process, for tests and ephemeral runs
// - `FileStore`: JSON file with atomic writes and backup recovery
//
// ## Usage
//
// ```rust,ignore
// use dnslog_core::KeyValueStore;
//
// let store = /* KeyValueStore implementation */;
// store.set("DNSLOG_API_KEY", &key).await?;
// let key = store.get("DNSLOG_API_KEY").await?;
// ```

use async_trait::async_trait;

/// Trait for durable key/value storage
///
/// Values are opaque strings; callers own their encoding.
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// ## Implementation Guidelines
///
/// - **Async I/O only**: never block the runtime
/// - **Explicit flush**: `flush()` must persist all pending changes
/// - **Missing is not an error**: `get` of an absent key is `Ok(None)` and
///   `remove` of an absent key is `Ok(())`
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    ///
    /// # Returns
    ///
    /// - `Ok(Some(value))`: The stored value
    /// - `Ok(None)`: Nothing stored under `key`
    /// - `Err(Error)`: Storage error
    async fn get(&self, key: &str) -> Result<Option<String>, crate::Error>;

    /// Create or overwrite a value
    async fn set(&self, key: &str, value: &str) -> Result<(), crate::Error>;

    /// Delete a value (no-op when absent)
    async fn remove(&self, key: &str) -> Result<(), crate::Error>;

    /// List all keys in the store
    async fn keys(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
