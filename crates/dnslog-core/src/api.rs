//! Typed wrappers over the backend endpoints
//!
//! Each method builds one [`HttpRequest`] and hands it to the
//! [`RequestGateway`]. Session bookkeeping for failures happens there; the
//! only session write done here is adopting the runtime configuration.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::classify::{ApiError, ApiErrorKind};
use crate::config::SortOrder;
use crate::gateway::RequestGateway;
use crate::model::{
    ApiKeyInfo, BlacklistEntry, CreatedApiKey, DnsRecord, Page, SubmitResult, TokenStatus,
    TokenSummary,
};
use crate::session::RuntimeConfig;
use crate::token::Token;
use crate::traits::{HttpRequest, Method};

/// Page selection for paginated listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub page: u32,
    pub page_size: u32,
    pub order: SortOrder,
}

impl PageQuery {
    pub fn first(page_size: u32, order: SortOrder) -> Self {
        Self {
            page: 1,
            page_size,
            order,
        }
    }

    fn apply(&self, request: HttpRequest) -> HttpRequest {
        request
            .with_query("page", self.page)
            .with_query("pageSize", self.page_size)
            .with_query("order", self.order.as_str())
    }
}

impl Default for PageQuery {
    fn default() -> Self {
        Self::first(20, SortOrder::default())
    }
}

/// Backend endpoints
#[derive(Clone)]
pub struct DnslogApi {
    gateway: RequestGateway,
}

impl DnslogApi {
    pub fn new(gateway: RequestGateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &RequestGateway {
        &self.gateway
    }

    /// `POST /submit`: resolve a probe domain
    pub async fn submit_domain(&self, domain: &str) -> Result<SubmitResult, ApiError> {
        let request =
            HttpRequest::new(Method::Post, "/submit").with_body(json!({ "domain_name": domain }));
        self.gateway.call_json(request).await
    }

    /// `POST /random-domain`: mint a fresh probe domain
    pub async fn random_domain(&self) -> Result<String, ApiError> {
        let data = self
            .gateway
            .call(HttpRequest::new(Method::Post, "/random-domain"))
            .await?;

        let domain = match &data {
            Value::String(domain) => Some(domain.as_str()),
            other => other.get("domain").and_then(Value::as_str),
        };
        match domain.map(str::trim).filter(|d| !d.is_empty()) {
            Some(domain) => Ok(domain.to_string()),
            None => Err(self.unexpected("/random-domain")),
        }
    }

    /// `GET /tokens/{token}`
    pub async fn token_status(&self, token: &Token) -> Result<TokenStatus, ApiError> {
        let path = format!("/tokens/{}", encode_path_segment(token.as_str()));
        self.gateway.call_json(HttpRequest::new(Method::Get, path)).await
    }

    /// `GET /tokens/{token}/records`
    pub async fn token_records(
        &self,
        token: &Token,
        query: PageQuery,
    ) -> Result<Page<DnsRecord>, ApiError> {
        let path = format!("/tokens/{}/records", encode_path_segment(token.as_str()));
        let request = query.apply(HttpRequest::new(Method::Get, path));
        self.gateway.call_json(request).await
    }

    /// `GET /tokens`
    pub async fn list_tokens(&self, query: PageQuery) -> Result<Page<TokenSummary>, ApiError> {
        let request = query.apply(HttpRequest::new(Method::Get, "/tokens"));
        self.gateway.call_json(request).await
    }

    /// `POST /keys`: the plaintext key is only ever returned here
    pub async fn create_api_key(
        &self,
        name: &str,
        comment: Option<&str>,
    ) -> Result<CreatedApiKey, ApiError> {
        let mut body = json!({ "name": name });
        if let Some(comment) = comment {
            body["comment"] = Value::from(comment);
        }
        let request = HttpRequest::new(Method::Post, "/keys").with_body(body);
        self.gateway.call_json(request).await
    }

    /// `GET /keys`
    pub async fn list_api_keys(&self, query: PageQuery) -> Result<Page<ApiKeyInfo>, ApiError> {
        let request = query.apply(HttpRequest::new(Method::Get, "/keys"));
        self.gateway.call_json(request).await
    }

    /// `POST /keys/{id}/disable`
    pub async fn disable_api_key(&self, id: i64) -> Result<(), ApiError> {
        let path = format!("/keys/{}/disable", id);
        self.gateway
            .call(HttpRequest::new(Method::Post, path))
            .await
            .map(drop)
    }

    /// `POST /blacklist`
    pub async fn add_blacklist(&self, ip: &str, reason: Option<&str>) -> Result<Value, ApiError> {
        let body = json!({ "ip": ip, "reason": reason.unwrap_or_default() });
        let request = HttpRequest::new(Method::Post, "/blacklist").with_body(body);
        self.gateway.call(request).await
    }

    /// `GET /blacklist`
    pub async fn list_blacklist(
        &self,
        query: PageQuery,
    ) -> Result<Page<BlacklistEntry>, ApiError> {
        let request = query.apply(HttpRequest::new(Method::Get, "/blacklist"));
        self.gateway.call_json(request).await
    }

    /// `POST /blacklist/{id}/disable`
    pub async fn disable_blacklist(&self, id: i64) -> Result<(), ApiError> {
        let path = format!("/blacklist/{}/disable", id);
        self.gateway
            .call(HttpRequest::new(Method::Post, path))
            .await
            .map(drop)
    }

    /// `GET /config`
    pub async fn runtime_config(&self) -> Result<RuntimeConfig, ApiError> {
        let data = self
            .gateway
            .call(HttpRequest::new(Method::Get, "/config"))
            .await?;
        let raw: RawRuntimeConfig = serde_json::from_value(data)
            .map_err(|_| self.unexpected("/config"))?;
        Ok(raw.into_runtime_config())
    }

    /// Fetch the runtime configuration and adopt it into the session
    ///
    /// On failure the session keeps what it had, which by default assumes
    /// authentication is required.
    pub async fn load_runtime_config(&self) -> RuntimeConfig {
        match self.runtime_config().await {
            Ok(config) => {
                info!(
                    "Runtime config: api_key_required={} dns_port={} root_domain={}",
                    config.api_key_required, config.dns_port, config.root_domain
                );
                let adopted = config.clone();
                self.gateway.session().update(|s| s.runtime_config = adopted);
                config
            }
            Err(e) => {
                warn!("Failed to load runtime config, keeping defaults: {}", e);
                self.gateway.session().runtime_config()
            }
        }
    }

    fn unexpected(&self, path: &str) -> ApiError {
        let error = ApiError::new(
            200,
            ApiErrorKind::Unknown,
            format!("unexpected response from {}", path),
        );
        self.gateway.session().set_api_error(error.clone());
        error
    }
}

/// `GET /config` payload as the backend sends it, in either casing
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRuntimeConfig {
    #[serde(rename = "apiKeyRequired")]
    api_key_required_camel: Option<bool>,
    api_key_required: Option<bool>,
    #[serde(rename = "dnsPort")]
    dns_port_camel: Option<Value>,
    dns_port: Option<Value>,
    dns_listen_addr: Option<String>,
    #[serde(rename = "rootDomain")]
    root_domain_camel: Option<String>,
    root_domain: Option<String>,
}

impl RawRuntimeConfig {
    fn into_runtime_config(self) -> RuntimeConfig {
        let defaults = RuntimeConfig::default();

        let dns_port = self
            .dns_port_camel
            .or(self.dns_port)
            .and_then(|v| match v {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|p| !p.is_empty())
            .or_else(|| self.dns_listen_addr.as_deref().and_then(infer_port))
            .unwrap_or(defaults.dns_port);

        RuntimeConfig {
            api_key_required: self
                .api_key_required_camel
                .or(self.api_key_required)
                .unwrap_or(defaults.api_key_required),
            dns_port,
            root_domain: self
                .root_domain_camel
                .or(self.root_domain)
                .unwrap_or(defaults.root_domain),
        }
    }
}

/// Port part of a listen address such as `0.0.0.0:15353` or `[::]:53`
fn infer_port(addr: &str) -> Option<String> {
    let (_, port) = addr.rsplit_once(':')?;
    let port = port.trim();
    (!port.is_empty()).then(|| port.to_string())
}

/// Percent-encode everything outside the RFC 3986 unreserved set
fn encode_path_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: Value) -> RuntimeConfig {
        serde_json::from_value::<RawRuntimeConfig>(value)
            .unwrap()
            .into_runtime_config()
    }

    #[test]
    fn test_runtime_config_accepts_both_casings() {
        let camel = parse(json!({ "apiKeyRequired": false, "dnsPort": "53", "rootDomain": "d.io" }));
        let snake = parse(json!({ "api_key_required": false, "dns_port": 53, "root_domain": "d.io" }));

        assert_eq!(camel, snake);
        assert!(!camel.api_key_required);
        assert_eq!(camel.dns_port, "53");
        assert_eq!(camel.root_domain, "d.io");
    }

    #[test]
    fn test_runtime_config_port_falls_back_to_listen_addr() {
        let config = parse(json!({ "dns_listen_addr": "0.0.0.0:5353" }));
        assert_eq!(config.dns_port, "5353");
        assert!(config.api_key_required);

        let defaults = parse(json!({ "dns_listen_addr": "no-port" }));
        assert_eq!(defaults, RuntimeConfig::default());
    }

    #[test]
    fn test_infer_port() {
        assert_eq!(infer_port("[::]:53").as_deref(), Some("53"));
        assert_eq!(infer_port("127.0.0.1:").as_deref(), None);
        assert_eq!(infer_port("localhost").as_deref(), None);
    }

    #[test]
    fn test_encode_path_segment() {
        assert_eq!(encode_path_segment("a1b2c3d4e5"), "a1b2c3d4e5");
        assert_eq!(encode_path_segment("a/b c"), "a%2Fb%20c");
    }

    #[test]
    fn test_page_query_params() {
        let request = PageQuery::first(50, SortOrder::Asc)
            .apply(HttpRequest::new(Method::Get, "/tokens"));
        assert_eq!(
            request.query,
            vec![
                ("page".to_string(), "1".to_string()),
                ("pageSize".to_string(), "50".to_string()),
                ("order".to_string(), "asc".to_string()),
            ]
        );
    }
}
