//! Contract Test: Gateway over the real HTTP transport
//!
//! This test verifies the whole call path against a mock backend.
//!
//! Constraints verified:
//! - The resolved credential reaches the wire as `X-API-Key`
//! - Envelope payloads decode into the typed models
//! - HTTP failures are classified and recorded in the session

use dnslog_core::credential::API_KEY_STORAGE_KEY;
use dnslog_core::{
    parse_token, ApiErrorKind, CredentialStore, DnslogApi, MemoryStore, RequestGateway,
    SharedSession,
};
use dnslog_http::ReqwestTransport;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

async fn api_for(server: &MockServer) -> (DnslogApi, SharedSession) {
    let session = SharedSession::default();
    let credentials = CredentialStore::new(
        Arc::new(MemoryStore::with_entries([(API_KEY_STORAGE_KEY, KEY)])),
        None,
        session.clone(),
    );
    credentials.resolve().await;

    let transport = ReqwestTransport::with_default_timeout(&format!("{}/api", server.uri())).unwrap();
    let gateway = RequestGateway::new(Arc::new(transport), session.clone());
    (DnslogApi::new(gateway), session)
}

#[tokio::test]
async fn token_status_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tokens/a1b2c3d4e5"))
        .and(header("X-API-Key", KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "message": "success",
            "data": {
                "token": "a1b2c3d4e5",
                "domain": "a1b2c3d4e5.dnslog.example",
                "status": "HIT",
                "hit_count": 4,
                "expired": false
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (api, session) = api_for(&server).await;
    let token = parse_token("a1b2c3d4e5.dnslog.example").unwrap();

    let status = api.token_status(&token).await.unwrap();
    assert_eq!(status.hit_count, 4);
    assert_eq!(status.status, dnslog_core::model::TokenState::Hit);
    assert_eq!(session.api_error(), None);
}

#[tokio::test]
async fn unauthorized_is_classified_and_recorded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/keys"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "code": 401, "message": "bad key" })),
        )
        .mount(&server)
        .await;

    let (api, session) = api_for(&server).await;
    let err = api
        .list_api_keys(dnslog_core::PageQuery::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ApiErrorKind::Unauthorized);
    assert_eq!(err.status, 401);
    assert_eq!(session.api_error(), Some(err));
}

#[tokio::test]
async fn runtime_config_is_adopted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "data": {
                "api_key_required": false,
                "dns_listen_addr": "0.0.0.0:5353",
                "root_domain": "dnslog.example"
            }
        })))
        .mount(&server)
        .await;

    let (api, session) = api_for(&server).await;
    api.load_runtime_config().await;

    let config = session.runtime_config();
    assert!(!config.api_key_required);
    assert_eq!(config.dns_port, "5353");
    assert_eq!(config.root_domain, "dnslog.example");
}
