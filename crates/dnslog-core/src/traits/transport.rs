// # Transport Trait
//
// Defines the HTTP capability the request gateway sits on.
//
// ## Purpose
//
// The core never talks to the network itself. A transport performs exactly
// one HTTP exchange per call and reports either the raw response or the fact
// that no response was obtained. Interpreting the response (envelope, status
// classification, session bookkeeping) is owned by `RequestGateway`.
//
// ## Implementations
//
// - `dnslog-http`: reqwest-based transport
// - Test doubles in `tests/common`

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// HTTP method of an outbound call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound request, relative to the API base URL
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// Path below the base URL, starting with `/`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Value of a header, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response as received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// No response was obtained
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// The request did not complete in time
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Anything else before a status line arrived
    #[error("request failed: {0}")]
    Other(String),
}

/// Trait for HTTP transports
///
/// # Contract
///
/// - **Single-shot**: one request per call, no retries
/// - **Status is data**: a 4xx/5xx is `Ok(HttpResponse)`, not an error
/// - **No interpretation**: the envelope is parsed by the gateway
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one request
    ///
    /// # Returns
    ///
    /// - `Ok(HttpResponse)`: A response arrived, whatever its status
    /// - `Err(TransportError)`: No response was obtained
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Transport name (for logging)
    fn transport_name(&self) -> &'static str;
}
