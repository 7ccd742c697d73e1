//! Contract Test: Typed Endpoint Wrappers
//!
//! This test verifies that each wrapper hits the right route with the right
//! payload and decodes what comes back.
//!
//! Constraints verified:
//! - Management calls use their documented method, path and body
//! - Random domains decode from either payload shape
//! - An empty random domain is a failure, not an empty string
//! - Created keys never print their plaintext
//!
//! If this test fails, someone has changed a route or a request shape.

mod common;

use common::*;
use dnslog_core::traits::Method;
use dnslog_core::{ApiErrorKind, PageQuery};
use serde_json::json;

#[tokio::test]
async fn random_domain_accepts_both_shapes() {
    let transport = ScriptedTransport::new();
    transport
        .respond("/random-domain", ok_envelope(json!(TOKEN_DOMAIN)))
        .respond("/random-domain", ok_envelope(json!({ "domain": TOKEN_DOMAIN })))
        .respond("/random-domain", ok_envelope(json!({ "domain": "  " })));
    let (api, session) = scripted_api(&transport);

    assert_eq!(api.random_domain().await.unwrap(), TOKEN_DOMAIN);
    assert_eq!(api.random_domain().await.unwrap(), TOKEN_DOMAIN);

    let err = api.random_domain().await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Unknown);
    assert_eq!(session.api_error(), Some(err));
    assert_eq!(transport.requests()[0].method, Method::Post);
}

#[tokio::test]
async fn api_key_management_routes() {
    let transport = ScriptedTransport::new();
    transport.respond(
        "/keys",
        ok_envelope(json!({ "id": 7, "name": "ci", "key": KEY_A })),
    );
    transport.respond("/keys/7/disable", ok_envelope(json!(null)));
    let (api, _session) = scripted_api(&transport);

    let created = api.create_api_key("ci", Some("pipeline")).await.unwrap();
    assert_eq!(created.id, 7);
    assert_eq!(created.key, KEY_A);
    assert!(!format!("{:?}", created).contains(KEY_A));

    api.disable_api_key(7).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].method, Method::Post);
    assert_eq!(
        requests[0].body,
        Some(json!({ "name": "ci", "comment": "pipeline" }))
    );
    assert_eq!(requests[1].path, "/keys/7/disable");
    assert_eq!(requests[1].method, Method::Post);
}

#[tokio::test]
async fn blacklist_routes() {
    let transport = ScriptedTransport::new();
    transport
        .respond("/blacklist", ok_envelope(json!({ "id": 3 })))
        .respond(
            "/blacklist",
            ok_envelope(json!({
                "items": [{ "id": 3, "ip": "198.51.100.9", "reason": "abuse", "enabled": true }],
                "total": 1,
                "page": 1,
                "size": 20
            })),
        );
    transport.respond("/blacklist/3/disable", ok_envelope(json!(null)));
    let (api, _session) = scripted_api(&transport);

    api.add_blacklist("198.51.100.9", None).await.unwrap();
    let listed = api.list_blacklist(PageQuery::default()).await.unwrap();
    api.disable_blacklist(3).await.unwrap();

    assert_eq!(listed.total, 1);
    assert_eq!(listed.items[0].ip, "198.51.100.9");

    let requests = transport.requests();
    assert_eq!(
        requests[0].body,
        Some(json!({ "ip": "198.51.100.9", "reason": "" }))
    );
    assert_eq!(requests[1].method, Method::Get);
    assert_eq!(requests[2].path, "/blacklist/3/disable");
}

#[tokio::test]
async fn token_listing_uses_page_query() {
    let transport = ScriptedTransport::new();
    transport.respond(
        "/tokens",
        ok_envelope(json!({
            "items": [{ "token": "a1b2c3d4e5", "domain": TOKEN_DOMAIN, "hit_count": 2 }],
            "total": 1
        })),
    );
    let (api, _session) = scripted_api(&transport);

    let page = api.list_tokens(PageQuery::default()).await.unwrap();
    assert_eq!(page.items[0].hit_count, 2);

    let query = &transport.requests()[0].query;
    assert!(query.contains(&("page".to_string(), "1".to_string())));
    assert!(query.contains(&("pageSize".to_string(), "20".to_string())));
    assert!(query.contains(&("order".to_string(), "desc".to_string())));
}
