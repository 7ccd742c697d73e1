//! The authoritative in-memory session state
//!
//! The state tree is split into modules (`text`, `system`, `runtimeConfig`,
//! `results`) that persist and restore independently. The credential is held
//! here too but is persisted only by the
//! [`CredentialStore`](crate::credential::CredentialStore).
//!
//! ## Sharing
//!
//! [`SharedSession`] is a cheap, cloneable handle. All access goes through
//! closures (`read` / `update`), so a read-modify-write happens under one lock
//! acquisition and can never straddle an `.await`.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

use crate::classify::ApiError;
use crate::credential::Credential;
use crate::model::{DnsRecord, DnsResult, TokenStatus};

/// Full client state tree
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Current credential (persisted separately)
    #[serde(skip)]
    pub api_key: Credential,

    /// What the user typed
    #[serde(default)]
    pub text: TextState,

    /// Last call outcome
    #[serde(default)]
    pub system: SystemState,

    /// Backend runtime configuration
    #[serde(default)]
    pub runtime_config: RuntimeConfig,

    /// Accumulated observations
    #[serde(default)]
    pub results: ResultsState,
}

/// User input module
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextState {
    /// Probe domain or bare token
    pub domain: String,
}

/// Call outcome module
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SystemState {
    /// The current failure; cleared by the next successful call
    pub api_error: Option<ApiError>,
}

/// Runtime configuration reported by `GET /config`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub api_key_required: bool,
    pub dns_port: String,
    pub root_domain: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            api_key_required: true,
            dns_port: "15353".to_string(),
            root_domain: String::new(),
        }
    }
}

/// Accumulated results module
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResultsState {
    /// Resolution results from `POST /submit`
    pub dns_results: Vec<DnsResult>,
    /// Observation records of the watched token
    pub records: Vec<DnsRecord>,
    /// Total number of records the backend holds for the token
    pub records_total: u64,
    /// Latest token status snapshot
    pub token_status: Option<TokenStatus>,
    /// User-facing message of the last failed fetch, empty when healthy
    pub error: String,
}

/// Shared handle to the session state
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<RwLock<SessionState>>,
}

impl SharedSession {
    pub fn new(state: SessionState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Run `f` against the current state
    pub fn read<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Run `f` with exclusive access to the state
    pub fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Clone of the whole tree
    pub fn snapshot(&self) -> SessionState {
        self.read(SessionState::clone)
    }

    /// Swap in a whole tree (used after restore)
    pub fn replace(&self, state: SessionState) {
        self.update(|current| *current = state);
    }

    pub fn credential(&self) -> Credential {
        self.read(|s| s.api_key.clone())
    }

    pub fn domain(&self) -> String {
        self.read(|s| s.text.domain.clone())
    }

    pub fn set_domain(&self, domain: impl Into<String>) {
        let domain = domain.into();
        self.update(|s| s.text.domain = domain);
    }

    pub fn api_error(&self) -> Option<ApiError> {
        self.read(|s| s.system.api_error.clone())
    }

    pub fn set_api_error(&self, error: ApiError) {
        self.update(|s| s.system.api_error = Some(error));
    }

    pub fn clear_api_error(&self) {
        self.update(|s| s.system.api_error = None);
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        self.read(|s| s.runtime_config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ApiErrorKind;

    #[test]
    fn test_default_runtime_config_assumes_auth() {
        let state = SessionState::default();
        assert!(state.runtime_config.api_key_required);
        assert_eq!(state.runtime_config.dns_port, "15353");
    }

    #[test]
    fn test_serialized_tree_uses_module_keys() {
        let json = serde_json::to_value(SessionState::default()).unwrap();
        let object = json.as_object().unwrap();

        assert!(object.contains_key("text"));
        assert!(object.contains_key("system"));
        assert!(object.contains_key("runtimeConfig"));
        assert!(object.contains_key("results"));
        assert!(!object.contains_key("apiKey"));
        assert_eq!(json["system"]["apiError"], serde_json::Value::Null);
    }

    #[test]
    fn test_clones_share_state() {
        let session = SharedSession::default();
        let other = session.clone();

        session.set_domain("a1b2c3d4e5.example.com");
        assert_eq!(other.domain(), "a1b2c3d4e5.example.com");

        other.set_api_error(ApiError::new(429, ApiErrorKind::RateLimited, "slow down"));
        assert_eq!(session.api_error().map(|e| e.kind), Some(ApiErrorKind::RateLimited));

        session.clear_api_error();
        assert_eq!(other.api_error(), None);
    }
}
