//! Snapshot and restore of the session tree
//!
//! The whole tree is stored as one JSON document under [`STATE_KEY`].
//! Restoring merges the persisted document over the defaults one module at a
//! time, so a module added in a newer release keeps its defaults and a module
//! that no longer exists is dropped. A module whose persisted fields no longer
//! decode falls back to its defaults without taking the other modules with it.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Error, RestoreError};
use crate::session::SessionState;
use crate::traits::KeyValueStore;

/// Storage key of the serialized session tree
pub const STATE_KEY: &str = "STORE";

/// Writes and reads the session tree
#[derive(Clone)]
pub struct PersistenceManager {
    storage: Arc<dyn KeyValueStore>,
}

impl PersistenceManager {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Persist `state`, reporting failures to the caller
    pub async fn try_snapshot(&self, state: &SessionState) -> Result<(), Error> {
        let json = serde_json::to_string(state)?;
        self.storage.set(STATE_KEY, &json).await?;
        self.storage.flush().await?;
        debug!("Session snapshot written ({} bytes)", json.len());
        Ok(())
    }

    /// Persist `state`, best effort
    ///
    /// A failed snapshot only costs the next run its restored state, so it is
    /// logged and otherwise ignored.
    pub async fn snapshot(&self, state: &SessionState) {
        if let Err(e) = self.try_snapshot(state).await {
            warn!("Failed to persist session snapshot: {}", e);
        }
    }

    /// Rebuild the session from storage on top of `defaults`
    ///
    /// # Returns
    ///
    /// - `Ok(defaults)` when nothing was persisted
    /// - `Ok(merged)` when a snapshot was found and merged
    /// - `Err(RestoreError)` when storage failed or the snapshot is not JSON
    pub async fn restore(&self, defaults: SessionState) -> Result<SessionState, RestoreError> {
        let raw = match self.storage.get(STATE_KEY).await {
            Ok(Some(raw)) if !raw.trim().is_empty() => raw,
            Ok(_) => {
                debug!("No persisted session, using defaults");
                return Ok(defaults);
            }
            Err(e) => return Err(RestoreError::Storage(e)),
        };

        let persisted: Value = serde_json::from_str(&raw).map_err(RestoreError::Corrupt)?;
        let default_tree = serde_json::to_value(&defaults).map_err(RestoreError::Shape)?;
        let merged = adopt_modules(default_tree.clone(), merge_snapshot(default_tree, persisted));

        let mut restored: SessionState =
            serde_json::from_value(merged).map_err(RestoreError::Shape)?;
        // Not part of the tree; resolved separately at boot
        restored.api_key = defaults.api_key;
        info!("Session restored from storage");
        Ok(restored)
    }

    /// [`restore`](Self::restore), falling back to `defaults` on any error
    pub async fn restore_or_defaults(&self, defaults: SessionState) -> SessionState {
        match self.restore(defaults.clone()).await {
            Ok(state) => state,
            Err(e) => {
                warn!("{}; starting from defaults", e);
                defaults
            }
        }
    }
}

/// Move merged modules into `tree` one at a time
///
/// A module is adopted only if the tree still decodes with it in place;
/// otherwise the default module stays.
fn adopt_modules(mut tree: Value, merged: Value) -> Value {
    let Value::Object(modules) = merged else {
        return tree;
    };

    for (key, module) in modules {
        let mut candidate = tree.clone();
        if let Some(fields) = candidate.as_object_mut() {
            fields.insert(key.clone(), module);
        }
        match serde_json::from_value::<SessionState>(candidate.clone()) {
            Ok(_) => tree = candidate,
            Err(e) => warn!("Persisted module '{}' does not decode ({}), keeping defaults", key, e),
        }
    }
    tree
}

/// Merge a persisted tree over the default tree
///
/// - a module present in both is shallow-merged, persisted fields winning
/// - a module present only in `defaults` is kept as is
/// - a key present only in `persisted` is dropped
/// - a persisted module that is not an object where the default is one is
///   ignored
pub fn merge_snapshot(defaults: Value, persisted: Value) -> Value {
    let Value::Object(defaults) = defaults else {
        return defaults;
    };
    let Value::Object(mut persisted) = persisted else {
        warn!("Persisted session is not an object, ignoring it");
        return Value::Object(defaults);
    };

    let merged: Map<String, Value> = defaults
        .into_iter()
        .map(|(key, default_module)| {
            let module = match (default_module, persisted.remove(&key)) {
                (default_module, None) => default_module,
                (Value::Object(mut fields), Some(Value::Object(overrides))) => {
                    fields.extend(overrides);
                    Value::Object(fields)
                }
                (Value::Object(fields), Some(_)) => {
                    warn!("Persisted module '{}' is not an object, keeping defaults", key);
                    Value::Object(fields)
                }
                (_, Some(value)) => value,
            };
            (key, module)
        })
        .collect();

    for dropped in persisted.keys() {
        debug!("Dropping unknown persisted module '{}'", dropped);
    }
    Value::Object(merged)
}
