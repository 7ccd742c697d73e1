//! Contract Test: Snapshot and Restore
//!
//! This test verifies that the session survives a restart and that broken
//! storage never takes the client down.
//!
//! Constraints verified:
//! - Nothing persisted restores the defaults
//! - A snapshot restores across a FileStore reopen
//! - Modules missing from the snapshot keep their defaults
//! - Corrupt snapshots are reported, and fall back explicitly
//! - A module that no longer decodes falls back to its own defaults only
//! - Storage failures during snapshot are swallowed
//! - The credential is never part of the snapshot
//!
//! If this test fails, someone has added:
//! - A panic on corrupt storage
//! - A snapshot that serializes the credential

mod common;

use common::*;
use dnslog_core::credential::API_KEY_STORAGE_KEY;
use dnslog_core::persist::STATE_KEY;
use dnslog_core::traits::KeyValueStore;
use dnslog_core::{
    ApiError, ApiErrorKind, CredentialStore, FileStore, MemoryStore, PersistenceManager,
    RestoreError, SessionState, SharedSession,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn nothing_persisted_restores_defaults() {
    let manager = PersistenceManager::new(Arc::new(MemoryStore::new()));

    let restored = manager.restore(SessionState::default()).await.unwrap();
    assert_eq!(restored, SessionState::default());
}

#[tokio::test]
async fn snapshot_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");

    {
        let store = Arc::new(FileStore::new(&path).await.unwrap());
        let session = SharedSession::default();
        session.set_domain(TOKEN_DOMAIN);
        session.update(|s| {
            s.runtime_config.root_domain = "dnslog.example".to_string();
            s.results.records_total = 3;
        });
        session.set_api_error(ApiError::new(429, ApiErrorKind::RateLimited, "slow down"));

        tokio_test::assert_ok!(
            PersistenceManager::new(store).try_snapshot(&session.snapshot()).await
        );
    }

    let store = Arc::new(FileStore::new(&path).await.unwrap());
    let restored = PersistenceManager::new(store)
        .restore(SessionState::default())
        .await
        .unwrap();

    assert_eq!(restored.text.domain, TOKEN_DOMAIN);
    assert_eq!(restored.runtime_config.root_domain, "dnslog.example");
    assert_eq!(restored.runtime_config.dns_port, "15353");
    assert_eq!(restored.results.records_total, 3);
    assert_eq!(restored.system.api_error.map(|e| e.kind), Some(ApiErrorKind::RateLimited));
}

#[tokio::test]
async fn untouched_module_survives_unmerged() {
    let store = MemoryStore::with_entries([(STATE_KEY, r#"{"text":{"domain":"x"}}"#)]);
    let manager = PersistenceManager::new(Arc::new(store));

    let mut defaults = SessionState::default();
    defaults.system.api_error = None;
    defaults.runtime_config.root_domain = "default.example".to_string();

    let restored = manager.restore(defaults.clone()).await.unwrap();
    assert_eq!(restored.text.domain, "x");
    assert_eq!(restored.system, defaults.system);
    assert_eq!(restored.runtime_config, defaults.runtime_config);
    assert_eq!(restored.results, defaults.results);
}

#[tokio::test]
async fn corrupt_snapshot_is_reported_and_falls_back() {
    let store = MemoryStore::with_entries([(STATE_KEY, "{ definitely not json")]);
    let manager = PersistenceManager::new(Arc::new(store));

    let result = manager.restore(SessionState::default()).await;
    assert!(matches!(result, Err(RestoreError::Corrupt(_))));

    let fallback = manager.restore_or_defaults(SessionState::default()).await;
    assert_eq!(fallback, SessionState::default());
}

#[tokio::test]
async fn mis_typed_module_falls_back_alone() {
    let store = MemoryStore::with_entries([(
        STATE_KEY,
        r#"{"text":{"domain":"a1b2c3d4e5.x"},"runtimeConfig":{"dnsPort":53,"rootDomain":"d.io"}}"#,
    )]);
    let manager = PersistenceManager::new(Arc::new(store));

    let restored = manager.restore(SessionState::default()).await.unwrap();
    assert_eq!(restored.text.domain, "a1b2c3d4e5.x");
    assert_eq!(restored.runtime_config, SessionState::default().runtime_config);
}

#[tokio::test]
async fn mis_typed_field_does_not_poison_other_modules() {
    let store = MemoryStore::with_entries([(
        STATE_KEY,
        r#"{"text":{"domain":42},"results":{"recordsTotal":5}}"#,
    )]);
    let manager = PersistenceManager::new(Arc::new(store));

    let restored = manager.restore(SessionState::default()).await.unwrap();
    assert_eq!(restored.text, SessionState::default().text);
    assert_eq!(restored.results.records_total, 5);
}

#[tokio::test]
async fn storage_failures_are_non_fatal() {
    let manager = PersistenceManager::new(Arc::new(FailingStore));

    // Best effort: must not panic or propagate
    manager.snapshot(&SessionState::default()).await;
    tokio_test::assert_err!(manager.try_snapshot(&SessionState::default()).await);

    let result = manager.restore(SessionState::default()).await;
    assert!(matches!(result, Err(RestoreError::Storage(_))));
    assert_eq!(
        manager.restore_or_defaults(SessionState::default()).await,
        SessionState::default()
    );
}

#[tokio::test]
async fn credential_is_never_snapshotted() {
    let storage = MemoryStore::new();
    let session = SharedSession::default();
    let credentials = CredentialStore::new(Arc::new(storage.clone()), Some(KEY_B.into()), session.clone());
    credentials.resolve().await;
    assert!(!session.credential().is_empty());

    let manager = PersistenceManager::new(Arc::new(storage.clone()));
    manager.snapshot(&session.snapshot()).await;

    let raw = storage.get(STATE_KEY).await.unwrap().unwrap();
    assert!(!raw.contains(KEY_B));
    let tree: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(tree.get("apiKey"), None);

    // The env key is used, never written
    assert_eq!(storage.get(API_KEY_STORAGE_KEY).await.unwrap(), None);

    let restored = manager.restore(SessionState::default()).await.unwrap();
    assert!(restored.api_key.is_empty());
}

#[tokio::test]
async fn persisted_credential_resolves_after_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");

    {
        let store = Arc::new(FileStore::new(&path).await.unwrap());
        let credentials = CredentialStore::new(store, None, SharedSession::default());
        credentials.set(KEY_A).await;
    }

    let store = Arc::new(FileStore::new(&path).await.unwrap());
    let credentials = CredentialStore::new(store, Some(KEY_B.into()), SharedSession::default());
    let resolved = credentials.resolve().await;
    assert_eq!(resolved.value, KEY_A);
    assert_eq!(resolved.source, dnslog_core::CredentialSource::Local);
}

#[tokio::test]
async fn unknown_persisted_modules_are_dropped() {
    let blob = json!({
        "text": { "domain": "x" },
        "legacyModule": { "anything": true }
    });
    let store = MemoryStore::with_entries([(STATE_KEY, blob.to_string())]);
    let manager = PersistenceManager::new(Arc::new(store.clone()));

    let restored = manager.restore(SessionState::default()).await.unwrap();
    manager.snapshot(&restored).await;

    let rewritten: Value = serde_json::from_str(&store.get(STATE_KEY).await.unwrap().unwrap()).unwrap();
    assert_eq!(rewritten.get("legacyModule"), None);
    assert_eq!(rewritten["text"]["domain"], "x");
}
