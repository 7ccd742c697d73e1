//! Configuration types for the DNSLog client
//!
//! Configuration is resolved exactly once at startup into an immutable
//! [`ClientConfig`] and threaded explicitly into the components that need it.
//! Nothing else in the crate reads the environment.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::reconcile::{OnFailure, ReconcileMode};

/// Smallest polling interval accepted anywhere in the crate
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Main client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Normalized API base URL (always ends in `/api`)
    pub api_base_url: String,

    /// Credential supplied by the environment, used when nothing is persisted
    #[serde(default)]
    pub env_api_key: Option<String>,

    /// Per-request HTTP timeout (in seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Path of the JSON file backing durable storage
    #[serde(default = "default_state_path")]
    pub state_path: String,

    /// Polling settings
    #[serde(default)]
    pub poll: PollConfig,

    /// What each poll tick fetches and how results are merged
    #[serde(default)]
    pub watch: WatchConfig,
}

impl ClientConfig {
    /// Create a configuration with defaults for the given base URL
    pub fn new(api_base_url: &str) -> Self {
        Self {
            api_base_url: normalize_base_url(Some(api_base_url)),
            env_api_key: None,
            request_timeout_secs: default_request_timeout_secs(),
            state_path: default_state_path(),
            poll: PollConfig::default(),
            watch: WatchConfig::default(),
        }
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, crate::Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// Unset and empty variables both mean "use the default". Numeric
    /// variables that fail to parse are configuration errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, crate::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut config = Self::new(&var("DNSLOG_API_BASE_URL").unwrap_or_default());
        config.env_api_key = var("DNSLOG_API_KEY");

        if let Some(ms) = var("DNSLOG_POLL_INTERVAL_MS") {
            config.poll.interval_ms = parse_number("DNSLOG_POLL_INTERVAL_MS", &ms)?;
        }
        if let Some(ms) = var("DNSLOG_POLL_MAX_DURATION_MS") {
            config.poll.max_duration_ms = parse_number("DNSLOG_POLL_MAX_DURATION_MS", &ms)?;
        }
        if let Some(secs) = var("DNSLOG_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = parse_number("DNSLOG_REQUEST_TIMEOUT_SECS", &secs)?;
        }
        if let Some(path) = var("DNSLOG_STATE_PATH") {
            config.state_path = path;
        }
        if let Some(mode) = var("DNSLOG_WATCH_MODE") {
            config.watch.mode = match mode.to_lowercase().as_str() {
                "replace" => ReconcileMode::Replace,
                "append" => ReconcileMode::Append,
                other => {
                    return Err(crate::Error::config(format!(
                        "DNSLOG_WATCH_MODE '{}' is not valid. Valid modes: replace, append",
                        other
                    )));
                }
            };
        }
        if let Some(policy) = var("DNSLOG_WATCH_ON_FAILURE") {
            config.watch.on_failure = match policy.to_lowercase().as_str() {
                "keep" => OnFailure::Keep,
                "clear" => OnFailure::Clear,
                other => {
                    return Err(crate::Error::config(format!(
                        "DNSLOG_WATCH_ON_FAILURE '{}' is not valid. Valid policies: keep, clear",
                        other
                    )));
                }
            };
        }
        if let Some(size) = var("DNSLOG_PAGE_SIZE") {
            config.watch.page_size = parse_number("DNSLOG_PAGE_SIZE", &size)?;
        }

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.api_base_url.is_empty() {
            return Err(crate::Error::config("API base URL cannot be empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(crate::Error::config("Request timeout must be > 0"));
        }
        if self.state_path.is_empty() {
            return Err(crate::Error::config("State path cannot be empty"));
        }
        self.poll.validate()?;
        self.watch.validate()?;
        Ok(())
    }

    /// Per-request HTTP timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Polling configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Interval between ticks (in milliseconds, at least 500)
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,

    /// Time budget for one polling session (in milliseconds)
    ///
    /// Set to 0 for an unbounded session.
    #[serde(default)]
    pub max_duration_ms: u64,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped with a warning.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl PollConfig {
    pub fn new(interval_ms: u64, max_duration_ms: u64) -> Self {
        Self {
            interval_ms,
            max_duration_ms,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval() < MIN_POLL_INTERVAL {
            return Err(crate::Error::config(format!(
                "Poll interval must be at least {}ms. Got: {}ms",
                MIN_POLL_INTERVAL.as_millis(),
                self.interval_ms
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// `None` when the session is unbounded
    pub fn max_duration(&self) -> Option<Duration> {
        (self.max_duration_ms > 0).then(|| Duration::from_millis(self.max_duration_ms))
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new(default_poll_interval_ms(), 0)
    }
}

/// Record ordering requested from the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Watch task configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// How fetched records merge into the accumulated set
    #[serde(default)]
    pub mode: ReconcileMode,

    /// What happens to accumulated records when a fetch fails
    #[serde(default)]
    pub on_failure: OnFailure,

    /// Records page size
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Records ordering
    #[serde(default)]
    pub order: SortOrder,
}

impl WatchConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.page_size == 0 {
            return Err(crate::Error::config("Page size must be > 0"));
        }
        Ok(())
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            mode: ReconcileMode::default(),
            on_failure: OnFailure::default(),
            page_size: default_page_size(),
            order: SortOrder::default(),
        }
    }
}

/// Normalize a user-supplied base URL so that it always ends in `/api`
///
/// - unset, empty or `/` → `/api`
/// - trailing slashes are stripped
/// - absolute URLs (`http://`, `https://`, `//`) get `/api` appended unless
///   they already end with it
/// - relative paths get a leading `/` and the `/api` suffix
pub fn normalize_base_url(raw: Option<&str>) -> String {
    let trimmed = raw.unwrap_or_default().trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return "/api".to_string();
    }

    let absolute = trimmed.starts_with("http://")
        || trimmed.starts_with("https://")
        || trimmed.starts_with("//");
    let base = if absolute || trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    };

    if base.ends_with("/api") {
        base
    } else {
        format!("{}/api", base)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, crate::Error> {
    value.parse().map_err(|_| {
        crate::Error::config(format!("{} must be a non-negative integer. Got: {}", key, value))
    })
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_state_path() -> String {
    "dnslog-state.json".to_string()
}

fn default_page_size() -> u32 {
    20
}
