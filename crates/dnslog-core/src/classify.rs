//! Classification of failed backend calls
//!
//! Every failure that crosses the request gateway is turned into exactly one
//! [`ApiError`]. The taxonomy is closed: callers match on [`ApiErrorKind`]
//! and show [`ApiError::message`] to the user without re-classifying.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message used when the server gave no usable explanation
pub const GENERIC_FAILURE_MESSAGE: &str = "request failed";

/// Closed set of failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 429
    RateLimited,
    /// No response was obtained at all
    Network,
    /// Rejected client-side before any request was made
    Validation,
    /// Anything else that is not an application-level success
    Unknown,
}

impl ApiErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiErrorKind::Unauthorized => "unauthorized",
            ApiErrorKind::Forbidden => "forbidden",
            ApiErrorKind::NotFound => "not_found",
            ApiErrorKind::RateLimited => "rate_limited",
            ApiErrorKind::Network => "network",
            ApiErrorKind::Validation => "validation",
            ApiErrorKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified backend failure
///
/// `status` is the HTTP status of the response, or 0 when none was received.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ApiError {
    pub status: u16,
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(status: u16, kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    /// A client-side rejection that never reached the network
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(0, ApiErrorKind::Validation, message)
    }
}

/// What the gateway observed about a failed call
#[derive(Debug, Clone, Copy, Default)]
pub struct Failure<'a> {
    /// HTTP status, if a response arrived
    pub status: Option<u16>,
    /// The transport gave up before a response arrived
    pub transport_failed: bool,
    /// Request path, quoted in "not found" messages
    pub path: &'a str,
    /// `message` field of the response envelope, if any
    pub server_message: Option<&'a str>,
}

/// Map a failed call to an [`ApiError`]
///
/// `api_key_required` is the client's own belief about whether the backend
/// enforces authentication (from the runtime config). It only changes the
/// wording of a 401, never its kind.
///
/// Rules, first match wins:
/// 1. no response → `network`
/// 2. 401 → `unauthorized`
/// 3. 403 → `forbidden`
/// 4. 404 → `not_found`
/// 5. 429 → `rate_limited`
/// 6. anything else → `unknown`, server message or a generic fallback
pub fn classify(failure: &Failure<'_>, api_key_required: Option<bool>) -> ApiError {
    let status = match failure.status {
        Some(status) if !failure.transport_failed => status,
        _ => {
            return ApiError::new(
                failure.status.unwrap_or(0),
                ApiErrorKind::Network,
                "network error or service unavailable",
            );
        }
    };

    match status {
        401 => {
            let message = if api_key_required == Some(false) {
                "backend reports authentication disabled but returned 401; \
                 the request path or backend configuration is likely inconsistent"
            } else {
                "unauthorized: configure an API key"
            };
            ApiError::new(status, ApiErrorKind::Unauthorized, message)
        }
        403 => ApiError::new(
            status,
            ApiErrorKind::Forbidden,
            "access denied: blacklisted or missing permission",
        ),
        404 => ApiError::new(
            status,
            ApiErrorKind::NotFound,
            format!("endpoint or resource not found: {}", failure.path),
        ),
        429 => ApiError::new(
            status,
            ApiErrorKind::RateLimited,
            "too many requests, retry later",
        ),
        _ => {
            let message = failure
                .server_message
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or(GENERIC_FAILURE_MESSAGE);
            ApiError::new(status, ApiErrorKind::Unknown, message)
        }
    }
}
