// # File Store
//
// File-based implementation of KeyValueStore with crash recovery.
//
// ## Purpose
//
// Durable storage across runs of the watcher: the persisted credential and
// the serialized session tree both live here.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Serialized writes: one writer at a time owns the temp file and the rename
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good file
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "entries": {
//     "DNSLOG_API_KEY": {
//       "value": "…64 hex chars…",
//       "updated_at": "2025-01-09T12:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use crate::Error;
use crate::traits::storage::KeyValueStore;

/// Store file format version
const STORE_FILE_VERSION: &str = "1.0";

/// File-based key/value store with crash recovery
///
/// Every mutation is written through immediately.
///
/// # Example
///
/// ```rust,no_run
/// use dnslog_core::store::FileStore;
/// use dnslog_core::traits::KeyValueStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStore::new("/var/lib/dnslog/state.json").await?;
///     store.set("text", "hello").await?;
///     assert_eq!(store.get("text").await?.as_deref(), Some("hello"));
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
    /// Held across snapshot, temp write and rename
    write_lock: Arc<Mutex<()>>,
}

#[derive(Debug)]
struct FileState {
    entries: HashMap<String, StoredValue>,
    dirty: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoredValue {
    value: String,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoreFileFormat {
    version: String,
    entries: HashMap<String, StoredValue>,
}

impl FileStore {
    /// Create or load a file store
    ///
    /// This will:
    /// 1. Try to load the existing file
    /// 2. If corruption detected, try to load from backup
    /// 3. If both fail, start empty
    /// 4. Create parent directories if needed
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let entries = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                entries,
                dirty: false,
            })),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last modification time of a value
    pub async fn updated_at(&self, key: &str) -> Option<DateTime<Utc>> {
        let guard = self.state.read().await;
        guard.entries.get(key).map(|v| v.updated_at)
    }

    async fn load_with_recovery(path: &Path) -> Result<HashMap<String, StoredValue>, Error> {
        match Self::load(path).await {
            Ok(entries) => {
                tracing::debug!("Loaded store from file: {} entries", entries.len());
                Ok(entries)
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "Store file {} appears corrupted: {}. Attempting recovery from backup.",
                    path.display(),
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with empty store.");
                    return Ok(HashMap::new());
                }

                match Self::load(&backup_path).await {
                    Ok(entries) => {
                        tracing::info!("Recovered store from backup: {} entries", entries.len());
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore store file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(entries)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also corrupted: {}. Starting with empty store.",
                            backup_err
                        );
                        Ok(HashMap::new())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn load(path: &Path) -> Result<HashMap<String, StoredValue>, Error> {
        if !path.exists() {
            tracing::debug!("Store file does not exist: {}", path.display());
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::storage(format!("Failed to read store file {}: {}", path.display(), e))
        })?;

        let file: StoreFileFormat = serde_json::from_str(&content)?;

        if file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Store file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STORE_FILE_VERSION,
                file.version
            );
        }

        Ok(file.entries)
    }

    /// Write the whole file atomically
    ///
    /// Writers are serialized, so the file on disk always ends up holding the
    /// entries of the latest snapshot taken.
    async fn write(&self) -> Result<(), Error> {
        let _writer = self.write_lock.lock().await;

        let file = {
            let mut guard = self.state.write().await;
            guard.dirty = false;
            StoreFileFormat {
                version: STORE_FILE_VERSION.to_string(),
                entries: guard.entries.clone(),
            }
        };

        let result = self.write_file(&file).await;
        if result.is_err() {
            self.state.write().await.dirty = true;
        }
        result
    }

    async fn write_file(&self, file: &StoreFileFormat) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(file)?;

        let temp_path = self.temp_path();
        {
            let mut temp = fs::File::create(&temp_path).await.map_err(|e| {
                Error::storage(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            temp.write_all(json.as_bytes()).await.map_err(|e| {
                Error::storage(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            temp.flush().await.map_err(|e| {
                Error::storage(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::storage(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Store written to file: {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let guard = self.state.read().await;
        Ok(guard.entries.get(key).map(|v| v.value.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        {
            let mut guard = self.state.write().await;
            guard.entries.insert(
                key.to_string(),
                StoredValue {
                    value: value.to_string(),
                    updated_at: Utc::now(),
                },
            );
            guard.dirty = true;
        }
        self.write().await
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        {
            let mut guard = self.state.write().await;
            if guard.entries.remove(key).is_none() {
                return Ok(());
            }
            guard.dirty = true;
        }
        self.write().await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let guard = self.state.read().await;
        Ok(guard.entries.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty { self.write().await } else { Ok(()) }
    }
}
