//! Single entry point for backend calls
//!
//! The gateway attaches the credential, performs the exchange through the
//! injected [`Transport`], and interprets the response envelope
//! `{ code, message?, data? }`. An envelope `code` of 200 is the only success
//! signal, whatever the HTTP status says.
//!
//! ## Session bookkeeping
//!
//! - success clears `system.apiError`
//! - failure writes the classified [`ApiError`] into `system.apiError`
//!   *before* the error is returned, so the session reflects the failure even
//!   when the caller drops the result
//!
//! Nothing escapes as a panic or a foreign error type: every failure is an
//! [`ApiError`].

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::classify::{classify, ApiError, ApiErrorKind, Failure};
use crate::credential::API_KEY_HEADER;
use crate::session::SharedSession;
use crate::traits::{HttpRequest, Transport};

/// Envelope code of a successful call
pub const SUCCESS_CODE: i64 = 200;

/// Performs backend calls on behalf of every other component
#[derive(Clone)]
pub struct RequestGateway {
    transport: Arc<dyn Transport>,
    session: SharedSession,
}

impl RequestGateway {
    pub fn new(transport: Arc<dyn Transport>, session: SharedSession) -> Self {
        Self { transport, session }
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Perform one call and return the envelope `data`
    ///
    /// # Returns
    ///
    /// - `Ok(Value)`: envelope `data`, or `Value::Null` when absent
    /// - `Err(ApiError)`: the classified failure, already recorded in the session
    pub async fn call(&self, request: HttpRequest) -> Result<Value, ApiError> {
        let credential = self.session.credential();
        let request = if credential.is_empty() {
            request
        } else {
            request.with_header(API_KEY_HEADER, credential.value.clone())
        };

        debug!(
            "[{}] {} {} key={} injected={}",
            self.transport.transport_name(),
            request.method,
            request.path,
            if credential.is_empty() { "none".to_string() } else { credential.masked() },
            !credential.is_empty()
        );

        let path = request.path.clone();
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                debug!("{} failed without a response: {}", path, e);
                let failure = Failure {
                    transport_failed: true,
                    path: &path,
                    ..Failure::default()
                };
                return Err(self.fail(classify(&failure, self.api_key_required())));
            }
        };

        let envelope: Option<Value> = serde_json::from_str(&response.body).ok();
        let code = envelope
            .as_ref()
            .and_then(|e| e.get("code"))
            .and_then(Value::as_i64);

        if code == Some(SUCCESS_CODE) {
            self.session.clear_api_error();
            let data = envelope
                .and_then(|mut e| e.get_mut("data").map(Value::take))
                .unwrap_or(Value::Null);
            return Ok(data);
        }

        let server_message = envelope
            .as_ref()
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str);
        let failure = Failure {
            status: Some(response.status),
            transport_failed: false,
            path: &path,
            server_message,
        };
        let error = classify(&failure, self.api_key_required());
        debug!(
            "{} failed: status={} code={:?} kind={}",
            path, response.status, code, error.kind
        );
        Err(self.fail(error))
    }

    /// Perform one call and decode the envelope `data` into `T`
    ///
    /// A `data` payload that does not decode is reported as `unknown`.
    pub async fn call_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T, ApiError> {
        let path = request.path.clone();
        let data = self.call(request).await?;
        serde_json::from_value(data).map_err(|e| {
            warn!("Unexpected payload from {}: {}", path, e);
            self.fail(ApiError::new(
                200,
                ApiErrorKind::Unknown,
                format!("unexpected response from {}", path),
            ))
        })
    }

    fn api_key_required(&self) -> Option<bool> {
        Some(self.session.runtime_config().api_key_required)
    }

    fn fail(&self, error: ApiError) -> ApiError {
        self.session.set_api_error(error.clone());
        error
    }
}
