//! Payload types exchanged with the DNSLog backend
//!
//! Field names follow the backend's JSON. Every field is defaulted so that a
//! backend adding or dropping optional fields does not break decoding.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One DNS query observed by the backend for a token
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsRecord {
    pub id: i64,
    pub domain: String,
    pub client_ip: String,
    pub protocol: String,
    pub qtype: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub server: String,
    pub token: String,
}

impl DnsRecord {
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        millis_to_datetime(self.timestamp)
    }
}

/// Lifecycle of a probe token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenState {
    #[default]
    Init,
    Hit,
    Expired,
}

/// Status snapshot of a probe token
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenStatus {
    pub token: String,
    pub domain: String,
    pub status: TokenState,
    pub first_seen: i64,
    pub last_seen: i64,
    pub hit_count: i64,
    pub expires_at: i64,
    pub expired: bool,
}

impl TokenStatus {
    pub fn last_seen_at(&self) -> Option<DateTime<Utc>> {
        millis_to_datetime(self.last_seen)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        millis_to_datetime(self.expires_at)
    }
}

/// Entry of the token listing
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenSummary {
    pub token: String,
    pub domain: String,
    pub status: TokenState,
    pub first_seen: i64,
    pub last_seen: i64,
    pub hit_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub expires_at: i64,
}

/// One resolution result returned by `POST /submit`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsResult {
    pub ip: String,
    pub address: String,
}

/// Payload of `POST /submit`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitResult {
    /// Canonical form of the submitted domain
    pub domain: String,
    pub results: Vec<DnsResult>,
}

/// A page of a paginated listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub size: u32,
    pub order: Option<String>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page: 1,
            size: 0,
            order: None,
        }
    }
}

/// API key as listed by the backend (hash prefix only, never the key)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeyInfo {
    pub id: i64,
    pub name: String,
    pub enabled: bool,
    pub created_at: i64,
    pub last_used_at: i64,
    pub comment: String,
    pub hash_prefix: String,
}

/// A freshly created API key; `key` is shown exactly once by the backend
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreatedApiKey {
    pub id: i64,
    pub name: String,
    pub key: String,
}

// Custom Debug implementation that hides the plaintext key
impl std::fmt::Debug for CreatedApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreatedApiKey")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("key", &"<REDACTED>")
            .finish()
    }
}

/// Blacklisted client address
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlacklistEntry {
    pub id: i64,
    pub ip: String,
    pub reason: String,
    pub enabled: bool,
    pub created_at: i64,
}

fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    if ms <= 0 {
        return None;
    }
    Utc.timestamp_millis_opt(ms).single()
}
