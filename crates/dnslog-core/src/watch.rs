//! Poll tasks: what the engine fetches on every tick
//!
//! Both tasks read their input from the session at the start of the fetch and
//! write the outcome back in a single session update once the fetch
//! completes. Overlapping fetches are therefore last-write-wins per update,
//! and under `append` each completed fetch contributes what it received.
//!
//! After every completed fetch the task bumps a revision counter observable
//! through [`TokenWatch::subscribe`] / [`SubmitWatch::subscribe`].

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use crate::api::{DnslogApi, PageQuery};
use crate::config::WatchConfig;
use crate::reconcile::{reconcile, reconcile_failure, OnFailure};
use crate::session::SharedSession;
use crate::token::parse_token;
use crate::traits::PollTask;

/// Shown when there is nothing to submit
pub const EMPTY_DOMAIN_HINT: &str = "enter a domain to query";

/// Watches the observation records of the session's probe token
pub struct TokenWatch {
    api: DnslogApi,
    session: SharedSession,
    config: WatchConfig,
    revision: watch::Sender<u64>,
}

impl TokenWatch {
    pub fn new(api: DnslogApi, session: SharedSession, config: WatchConfig) -> Self {
        Self {
            api,
            session,
            config,
            revision: watch::Sender::new(0),
        }
    }

    /// Receiver notified after every completed fetch
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

#[async_trait]
impl PollTask for TokenWatch {
    async fn poll_once(&self) {
        let domain = self.session.domain();

        // Rejected client-side, without a network call
        let token = match parse_token(&domain) {
            Ok(token) => token,
            Err(rejected) => {
                self.session.update(|s| {
                    s.results.error = rejected.reason;
                    s.results.records.clear();
                    s.results.records_total = 0;
                    s.results.token_status = None;
                });
                bump(&self.revision);
                return;
            }
        };

        let status = self.api.token_status(&token).await;
        let page = self
            .api
            .token_records(&token, PageQuery::first(self.config.page_size, self.config.order))
            .await;

        let WatchConfig { mode, on_failure, .. } = self.config;
        self.session.update(|s| {
            let existing = std::mem::take(&mut s.results.records);
            match (status, page) {
                (Ok(status), Ok(page)) => {
                    debug!(
                        "Token {}: status={:?} hits={} records={}",
                        token, status.status, status.hit_count, page.items.len()
                    );
                    s.results.token_status = Some(status);
                    s.results.records = reconcile(existing, page.items, mode);
                    s.results.records_total = page.total;
                    s.results.error.clear();
                }
                (status, page) => {
                    let error = status.err().or(page.err()).map(|e| e.message).unwrap_or_default();
                    s.results.records = reconcile_failure(existing, on_failure);
                    if on_failure == OnFailure::Clear {
                        s.results.records_total = 0;
                        s.results.token_status = None;
                    }
                    s.results.error = error;
                }
            }
        });
        bump(&self.revision);
    }

    fn task_name(&self) -> &'static str {
        "token-watch"
    }
}

/// Resolves the session's domain through the backend on every tick
pub struct SubmitWatch {
    api: DnslogApi,
    session: SharedSession,
    config: WatchConfig,
    revision: watch::Sender<u64>,
}

impl SubmitWatch {
    pub fn new(api: DnslogApi, session: SharedSession, config: WatchConfig) -> Self {
        Self {
            api,
            session,
            config,
            revision: watch::Sender::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

#[async_trait]
impl PollTask for SubmitWatch {
    async fn poll_once(&self) {
        let domain = self.session.domain();
        let domain = domain.trim();
        if domain.is_empty() {
            self.session
                .update(|s| s.results.error = EMPTY_DOMAIN_HINT.to_string());
            bump(&self.revision);
            return;
        }

        let outcome = self.api.submit_domain(domain).await;

        let WatchConfig { mode, on_failure, .. } = self.config;
        self.session.update(|s| {
            let existing = std::mem::take(&mut s.results.dns_results);
            match outcome {
                Ok(result) => {
                    if !result.domain.is_empty() {
                        s.text.domain = result.domain;
                    }
                    s.results.dns_results = reconcile(existing, result.results, mode);
                    s.results.error.clear();
                }
                Err(e) => {
                    s.results.dns_results = reconcile_failure(existing, on_failure);
                    s.results.error = e.message;
                }
            }
        });
        bump(&self.revision);
    }

    fn task_name(&self) -> &'static str {
        "submit-watch"
    }
}

fn bump(revision: &watch::Sender<u64>) {
    revision.send_modify(|r| *r = r.wrapping_add(1));
}
