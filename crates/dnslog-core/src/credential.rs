//! Access credential resolution and persistence
//!
//! Precedence at boot is: valid persisted value, then valid environment
//! default, then nothing. A persisted value with a broken format is removed
//! on sight. Only credentials the user set explicitly are ever persisted;
//! the environment default is used but never written to storage.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::session::SharedSession;
use crate::traits::KeyValueStore;

/// Storage key of the persisted credential
pub const API_KEY_STORAGE_KEY: &str = "DNSLOG_API_KEY";

/// Storage key used by older clients; read, never written
pub const API_KEY_LEGACY_STORAGE_KEY: &str = "api_key";

/// Header carrying the credential on every call
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Required credential length
pub const API_KEY_LEN: usize = 64;

/// Where the current credential came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialSource {
    /// Set by the user and persisted
    Local,
    /// Environment default
    Env,
    #[default]
    None,
}

/// The access credential
///
/// `value` is either empty (`source == None`) or exactly 64 hex characters.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Credential {
    pub value: String,
    pub source: CredentialSource,
}

impl Credential {
    pub fn none() -> Self {
        Self::default()
    }

    fn local(value: String) -> Self {
        Self {
            value,
            source: CredentialSource::Local,
        }
    }

    fn env(value: String) -> Self {
        Self {
            value,
            source: CredentialSource::Env,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Log-safe rendering of the value
    pub fn masked(&self) -> String {
        mask_api_key(&self.value, 6)
    }
}

// Custom Debug implementation that hides the credential
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("value", &self.masked())
            .field("source", &self.source)
            .finish()
    }
}

/// Exactly 64 characters, all in `[0-9a-fA-F]`
pub fn is_valid_api_key_format(key: &str) -> bool {
    key.len() == API_KEY_LEN && key.bytes().all(|b| b.is_ascii_hexdigit())
}

/// First `prefix` characters followed by the length, e.g. `0a1b2c...(len=64)`
pub fn mask_api_key(key: &str, prefix: usize) -> String {
    if key.is_empty() {
        return String::new();
    }
    let head: String = key.chars().take(prefix).collect();
    format!("{}...(len={})", head, key.chars().count())
}

/// Resolves, validates and persists the credential
///
/// The resolved credential is mirrored into the session so the request
/// gateway can attach it without touching storage.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn KeyValueStore>,
    env_default: Option<String>,
    session: SharedSession,
}

impl CredentialStore {
    /// # Parameters
    ///
    /// - `storage`: Durable storage holding the persisted credential
    /// - `env_default`: Credential supplied by configuration, if any
    /// - `session`: Session that receives the current credential
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        env_default: Option<String>,
        session: SharedSession,
    ) -> Self {
        Self {
            storage,
            env_default,
            session,
        }
    }

    /// Resolve the credential at boot
    ///
    /// Storage failures are treated as "nothing persisted".
    pub async fn resolve(&self) -> Credential {
        let resolved = match self.stored().await {
            Some(stored) if is_valid_api_key_format(&stored) => Credential::local(stored),
            Some(_) => {
                warn!("Persisted API key has an invalid format, discarding it");
                self.remove_persisted().await;
                self.from_env()
            }
            None => self.from_env(),
        };

        info!(
            "API key resolved: source={:?} key={}",
            resolved.source,
            if resolved.is_empty() { "none".to_string() } else { resolved.masked() }
        );
        self.publish(resolved.clone());
        resolved
    }

    /// Set the credential from user input
    ///
    /// Empty or malformed input is not an error: it clears the persisted
    /// credential and leaves the client without one.
    pub async fn set(&self, raw: &str) -> Credential {
        let trimmed = raw.trim();
        if !is_valid_api_key_format(trimmed) {
            if !trimmed.is_empty() {
                debug!("Rejected API key with invalid format ({} chars)", trimmed.len());
            }
            self.clear().await;
            return Credential::none();
        }

        if let Err(e) = self.storage.set(API_KEY_STORAGE_KEY, trimmed).await {
            warn!("Failed to persist API key: {}", e);
        }
        let credential = Credential::local(trimmed.to_string());
        self.publish(credential.clone());
        credential
    }

    /// Forget the credential, persisted and in memory
    pub async fn clear(&self) {
        self.remove_persisted().await;
        self.publish(Credential::none());
    }

    /// Credential currently in effect
    pub fn current(&self) -> Credential {
        self.session.credential()
    }

    async fn stored(&self) -> Option<String> {
        for key in [API_KEY_STORAGE_KEY, API_KEY_LEGACY_STORAGE_KEY] {
            match self.storage.get(key).await {
                Ok(Some(value)) if !value.is_empty() => return Some(value),
                Ok(_) => {}
                Err(e) => warn!("Failed to read persisted API key from {}: {}", key, e),
            }
        }
        None
    }

    fn from_env(&self) -> Credential {
        match self.env_default.as_deref().map(str::trim) {
            Some(key) if is_valid_api_key_format(key) => Credential::env(key.to_string()),
            Some(key) if !key.is_empty() => {
                warn!("Environment API key has an invalid format, ignoring it");
                Credential::none()
            }
            _ => Credential::none(),
        }
    }

    async fn remove_persisted(&self) {
        for key in [API_KEY_STORAGE_KEY, API_KEY_LEGACY_STORAGE_KEY] {
            if let Err(e) = self.storage.remove(key).await {
                warn!("Failed to remove persisted API key {}: {}", key, e);
            }
        }
    }

    fn publish(&self, credential: Credential) {
        self.session.update(|s| s.api_key = credential);
    }
}
