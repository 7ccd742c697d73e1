// # HTTP Transport
//
// This crate provides the reqwest-based Transport for the DNSLog client.
//
// ## Purpose
//
// Performs exactly one HTTP exchange per call against the DNSLog REST API.
// Everything above the wire (credential header, envelope parsing, failure
// classification, session bookkeeping) lives in `dnslog-core`'s
// `RequestGateway`; this crate only moves bytes.
//
// ## Status Handling
//
// Any response that arrives is returned as `Ok(HttpResponse)`, whatever its
// status. `TransportError` is reserved for "no response at all": connection
// failures, timeouts and body read failures.

use dnslog_core::traits::{HttpRequest, HttpResponse, Method, Transport, TransportError};
use dnslog_core::{ClientConfig, Error, Result};

use std::time::Duration;

use reqwest::Url;
use tracing::{debug, trace};

/// Default per-request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    /// Absolute base URL, without trailing slash (e.g. `https://dnslog.example/api`)
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a new transport
    ///
    /// # Parameters
    ///
    /// - `base_url`: Absolute API base URL (e.g., "https://dnslog.example/api")
    /// - `timeout`: Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not an absolute http(s) URL or the
    /// client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();

        let parsed = Url::parse(&base_url).map_err(|e| {
            Error::config(format!(
                "API base URL '{}' must be an absolute http(s) URL: {}",
                base_url, e
            ))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "Unsupported API base URL scheme '{}'. Valid schemes: http, https",
                parsed.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { base_url, client })
    }

    /// Create a transport from the client configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(&config.api_base_url, config.request_timeout())
    }

    /// Create a transport with the default timeout
    pub fn with_default_timeout(base_url: &str) -> Result<Self> {
        Self::new(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        let url = self.url_for(&request.path);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match &request.body {
            Some(body) => builder.json(body),
            // Matches what the backend expects for body-less POSTs
            None if matches!(request.method, Method::Post | Method::Put) => {
                builder.json(&serde_json::json!({}))
            }
            None => builder,
        };

        let response = builder.send().await.map_err(|e| {
            debug!("{} {} failed: {}", request.method, url, e);
            map_reqwest_error(e)
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            TransportError::Other(format!("Failed to read response body: {}", e))
        })?;

        trace!("{} {} -> {} ({} bytes)", request.method, url, status, body.len());
        Ok(HttpResponse { status, body })
    }

    fn transport_name(&self) -> &'static str {
        "reqwest"
    }
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}
