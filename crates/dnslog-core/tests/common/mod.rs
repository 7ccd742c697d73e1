//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles that let the contract tests
//! observe the core without a network, a disk, or a wall clock.

#![allow(dead_code)]

use async_trait::async_trait;
use dnslog_core::error::{Error, Result};
use dnslog_core::traits::{
    HttpRequest, HttpResponse, KeyValueStore, PollTask, Transport, TransportError,
};
use dnslog_core::{DnslogApi, RequestGateway, SharedSession};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, Notify};

/// A well-formed 64-hex credential
pub const KEY_A: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

/// Another well-formed credential, mixed case
pub const KEY_B: &str = "ABCDEF0123456789abcdef0123456789ABCDEF0123456789abcdef0123456789";

pub const TOKEN_DOMAIN: &str = "a1b2c3d4e5.dnslog.example";

/// Success envelope carrying `data`
pub fn ok_envelope(data: Value) -> HttpResponse {
    HttpResponse::new(200, json!({ "code": 200, "message": "success", "data": data }).to_string())
}

/// Failure envelope with the given HTTP status and envelope code
pub fn error_envelope(status: u16, code: i64, message: &str) -> HttpResponse {
    HttpResponse::new(status, json!({ "code": code, "message": message }).to_string())
}

/// A record as the backend serializes it
pub fn record(id: i64) -> Value {
    json!({
        "id": id,
        "domain": TOKEN_DOMAIN,
        "client_ip": "203.0.113.7",
        "protocol": "udp",
        "qtype": "A",
        "timestamp": 1_736_424_000_000i64 + id,
        "server": "ns1",
        "token": "a1b2c3d4e5"
    })
}

pub fn records_page(ids: &[i64], total: u64) -> Value {
    json!({
        "items": ids.iter().map(|id| record(*id)).collect::<Vec<_>>(),
        "total": total,
        "page": 1,
        "size": ids.len(),
        "order": "desc"
    })
}

pub fn token_status(hit_count: i64) -> Value {
    json!({
        "token": "a1b2c3d4e5",
        "domain": TOKEN_DOMAIN,
        "status": if hit_count > 0 { "HIT" } else { "INIT" },
        "first_seen": 1_736_424_000_000i64,
        "last_seen": 1_736_424_000_000i64,
        "hit_count": hit_count,
        "expires_at": 1_736_427_600_000i64,
        "expired": false
    })
}

type Scripted = std::result::Result<HttpResponse, TransportError>;

/// A transport answering from per-path scripts
///
/// Responses queued for a path are served in order; the last one keeps being
/// served once the queue is down to it. Unscripted paths answer 404.
///
/// Requests to a held path pick their response on arrival, then wait until
/// released one by one with [`ScriptedTransport::release_held`].
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    scripts: Arc<Mutex<HashMap<String, VecDeque<Scripted>>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
    held_paths: Arc<Mutex<HashSet<String>>>,
    parked: Arc<Mutex<HashMap<String, Vec<Option<oneshot::Sender<()>>>>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `path`
    pub fn respond(&self, path: &str, response: HttpResponse) -> &Self {
        self.push(path, Ok(response))
    }

    /// Queue a transport failure for `path`
    pub fn fail(&self, path: &str, error: TransportError) -> &Self {
        self.push(path, Err(error))
    }

    /// All requests received so far
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests received for `path`
    pub fn calls_to(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }

    /// Hold every later request to `path` until released
    pub fn hold(&self, path: &str) -> &Self {
        self.held_paths.lock().unwrap().insert(path.to_string());
        self
    }

    /// Number of requests to `path` that were held, released or not
    pub fn held(&self, path: &str) -> usize {
        self.parked.lock().unwrap().get(path).map_or(0, Vec::len)
    }

    /// Let the `nth` held request to `path` (in arrival order) complete
    pub fn release_held(&self, path: &str, nth: usize) {
        let sender = self
            .parked
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(|parked| parked.get_mut(nth))
            .and_then(Option::take);
        if let Some(sender) = sender {
            let _ = sender.send(());
        }
    }

    fn push(&self, path: &str, scripted: Scripted) -> &Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(scripted);
        self
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        let path = request.path.clone();
        self.requests.lock().unwrap().push(request);

        let response = {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(&path) {
                Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
                Some(queue) if !queue.is_empty() => queue[0].clone(),
                _ => Ok(error_envelope(404, 404, "not found")),
            }
        };

        let release = if self.held_paths.lock().unwrap().contains(&path) {
            let (sender, receiver) = oneshot::channel();
            self.parked
                .lock()
                .unwrap()
                .entry(path)
                .or_default()
                .push(Some(sender));
            Some(receiver)
        } else {
            None
        };
        if let Some(release) = release {
            let _ = release.await;
        }

        response
    }

    fn transport_name(&self) -> &'static str {
        "scripted"
    }
}

/// Session, gateway and API wired to a scripted transport
pub fn scripted_api(transport: &ScriptedTransport) -> (DnslogApi, SharedSession) {
    let session = SharedSession::default();
    let gateway = RequestGateway::new(Arc::new(transport.clone()), session.clone());
    (DnslogApi::new(gateway), session)
}

/// A poll task that counts its runs
///
/// When gated, each run blocks until [`CountingPollTask::release`] is
/// called, which simulates a slow backend.
#[derive(Clone, Default)]
pub struct CountingPollTask {
    started: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
    gate: Option<Arc<Notify>>,
}

impl CountingPollTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Notify::new())),
            ..Self::default()
        }
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Let every blocked run complete
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_waiters();
        }
    }
}

#[async_trait]
impl PollTask for CountingPollTask {
    async fn poll_once(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
    }

    fn task_name(&self) -> &'static str {
        "counting"
    }
}

/// Let spawned tasks run on the current-thread test runtime
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// A store on which every operation fails
#[derive(Debug, Default)]
pub struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(Error::storage("disk unavailable"))
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(Error::storage("disk unavailable"))
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        Err(Error::storage("disk unavailable"))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Err(Error::storage("disk unavailable"))
    }

    async fn flush(&self) -> Result<()> {
        Err(Error::storage("disk unavailable"))
    }
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
