// # dnslogw - DNSLog Watcher
//
// The dnslogw binary is responsible for:
// 1. Reading configuration from environment variables
// 2. Restoring the persisted session and resolving the credential
// 3. Picking the probe domain to watch
// 4. Polling its token until interrupted or until the time budget runs out
// 5. Persisting the session on the way out
//
// All client logic lives in dnslog-core; this is wiring only.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// - `DNSLOG_API_BASE_URL`: Backend base URL, required (absolute http(s), `/api` is appended)
// - `DNSLOG_API_KEY`: Default credential when none is persisted
// - `DNSLOG_POLL_INTERVAL_MS`: Polling interval (>= 500, default 2000)
// - `DNSLOG_POLL_MAX_DURATION_MS`: Time budget, 0 for none (default 0)
// - `DNSLOG_REQUEST_TIMEOUT_SECS`: Per-request timeout (default 10)
// - `DNSLOG_STATE_PATH`: Session file (default dnslog-state.json)
// - `DNSLOG_WATCH_MODE`: replace or append (default replace)
// - `DNSLOG_WATCH_ON_FAILURE`: keep or clear (default keep)
// - `DNSLOG_PAGE_SIZE`: Records page size (default 20)
// - `DNSLOG_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export DNSLOG_API_BASE_URL=https://dnslog.example
// export DNSLOG_API_KEY=0123...cdef
// export DNSLOG_POLL_MAX_DURATION_MS=600000
//
// dnslogw a1b2c3d4e5.dnslog.example
// ```

use anyhow::{Context, Result};
use dnslog_core::model::DnsRecord;
use dnslog_core::traits::KeyValueStore;
use dnslog_core::{
    parse_token, ClientConfig, CredentialStore, DnslogApi, EngineEvent, FileStore,
    PersistenceManager, PollingEngine, RequestGateway, SessionState, SharedSession, TokenWatch,
    TokioScheduler,
};
use dnslog_http::ReqwestTransport;
use std::collections::HashSet;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Clean shutdown (signal or expired session)
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DnslogwExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DnslogwExitCode> for ExitCode {
    fn from(code: DnslogwExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Why the watch loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchEnd {
    Signal(&'static str),
    Expired,
}

fn parse_log_level(raw: &str) -> Result<Level> {
    match raw.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "DNSLOG_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            raw
        ),
    }
}

/// The watcher talks to the backend directly, so the relative default base
/// URL is not usable here
fn require_absolute_base_url(url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        return Ok(());
    }
    anyhow::bail!(
        "DNSLOG_API_BASE_URL is required and must be an absolute http(s) URL \
        (e.g. https://dnslog.example). Got: {}",
        url
    )
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match ClientConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DnslogwExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DnslogwExitCode::ConfigError.into();
    }

    if let Err(e) = require_absolute_base_url(&config.api_base_url) {
        eprintln!("Configuration validation error: {}", e);
        return DnslogwExitCode::ConfigError.into();
    }

    let log_level = match parse_log_level(
        &env::var("DNSLOG_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
    ) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration validation error: {}", e);
            return DnslogwExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DnslogwExitCode::ConfigError.into();
    }

    let transport = match ReqwestTransport::from_config(&config) {
        Ok(transport) => transport,
        Err(e) => {
            error!("Failed to create HTTP transport: {}", e);
            return DnslogwExitCode::ConfigError.into();
        }
    };

    let domain_arg = env::args().nth(1).filter(|d| !d.trim().is_empty());

    info!("Starting dnslogw");
    info!(
        "API: {} (interval={}ms, max_duration={}ms, mode={:?})",
        config.api_base_url, config.poll.interval_ms, config.poll.max_duration_ms, config.watch.mode
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DnslogwExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_watcher(config, transport, domain_arg).await {
            Ok(end) => {
                info!("Watcher finished: {:?}", end);
                DnslogwExitCode::CleanShutdown
            }
            Err(e) => {
                error!("Watcher error: {:#}", e);
                DnslogwExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Run the watcher until a signal arrives or the session expires
async fn run_watcher(
    config: ClientConfig,
    transport: ReqwestTransport,
    domain_arg: Option<String>,
) -> Result<WatchEnd> {
    let storage = Arc::new(
        FileStore::new(&config.state_path)
            .await
            .with_context(|| format!("Failed to open state file {}", config.state_path))?,
    );
    let persistence = PersistenceManager::new(storage.clone());

    let restored = match persistence.restore(SessionState::default()).await {
        Ok(state) => state,
        Err(e) => {
            warn!("Could not restore session ({}), starting fresh", e);
            SessionState::default()
        }
    };
    let session = SharedSession::new(restored);

    let credentials = CredentialStore::new(storage.clone(), config.env_api_key.clone(), session.clone());
    credentials.resolve().await;

    let api = DnslogApi::new(RequestGateway::new(Arc::new(transport), session.clone()));
    api.load_runtime_config().await;

    if let Some(domain) = domain_arg {
        session.set_domain(domain.trim());
    } else if session.domain().trim().is_empty() {
        let minted = api
            .random_domain()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to generate a probe domain: {}", e))?;
        info!("Generated probe domain: {}", minted);
        session.set_domain(minted);
    }

    let domain = session.domain();
    match parse_token(&domain) {
        Ok(token) => info!("Watching {} (token {})", domain, token),
        Err(rejected) => warn!("{}: {}", domain, rejected),
    }

    let watch = Arc::new(TokenWatch::new(api, session.clone(), config.watch));
    let revisions = WatchStream::new(watch.subscribe());

    let scheduler = Arc::new(TokioScheduler::new()?);
    let (engine, mut events) = PollingEngine::new(scheduler, watch, config.poll);
    engine.start(config.poll)?;

    let outcome = watch_loop(&session, revisions, &mut events).await;

    engine.stop();
    persistence.snapshot(&session.snapshot()).await;
    if let Err(e) = storage.flush().await {
        warn!("Failed to flush state file: {}", e);
    }
    info!("Session saved to {}", config.state_path);

    outcome
}

/// Report results as they arrive until shutdown or expiry
async fn watch_loop(
    session: &SharedSession,
    mut revisions: WatchStream<u64>,
    events: &mut mpsc::Receiver<EngineEvent>,
) -> Result<WatchEnd> {
    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    let mut seen: HashSet<i64> = HashSet::new();
    let mut last_error = String::new();

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                let signal = signal?;
                info!("Received shutdown signal: {}", signal);
                return Ok(WatchEnd::Signal(signal));
            }
            Some(_) = revisions.next() => {
                report(session, &mut seen, &mut last_error);
            }
            Some(event) = events.recv() => {
                if let EngineEvent::Expired { elapsed } = event {
                    info!("Polling session expired after {}s", elapsed.as_secs());
                    return Ok(WatchEnd::Expired);
                }
            }
        }
    }
}

fn report(session: &SharedSession, seen: &mut HashSet<i64>, last_error: &mut String) {
    let (fresh, total, error): (Vec<DnsRecord>, u64, String) = session.read(|s| {
        let fresh = s
            .results
            .records
            .iter()
            .filter(|r| !seen.contains(&r.id))
            .cloned()
            .collect();
        (fresh, s.results.records_total, s.results.error.clone())
    });

    for record in &fresh {
        seen.insert(record.id);
        let when = record
            .observed_at()
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        info!(
            "[{}] {} {} from {} via {} ({} total)",
            when, record.qtype, record.domain, record.client_ip, record.protocol, total
        );
    }

    if error != *last_error {
        if !error.is_empty() {
            warn!("Fetch failed: {}", error);
        }
        *last_error = error;
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
