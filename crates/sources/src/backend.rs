//! Fetch operation that proxies through the dashboard backend API
//!
//! Every built-in integration talks to its service through the backend:
//! scheduled polls read `GET {api_base}/{route}/{widget_id}`, credential
//! checks send the unsaved configuration to `POST {api_base}/{route}/test`.

use crate::http_error::error_message;
use async_trait::async_trait;
use log::trace;
use pulseboard_core::{FetchError, FetchOperation, FetchRequest};
use pulseboard_types::FetchPayload;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default location of the dashboard backend API
pub const DEFAULT_API_BASE: &str = "http://localhost:8080/api/v1";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Shared HTTP client for the backend API
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    api_base: String,
}

impl BackendClient {
    pub fn new(api_base: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn poll_url(&self, route: &str, widget_id: impl std::fmt::Display) -> String {
        format!("{}/{}/{}", self.api_base, route, widget_id)
    }

    fn test_url(&self, route: &str) -> String {
        format!("{}/{}/test", self.api_base, route)
    }
}

/// Fetch operation for one backend route
#[derive(Debug, Clone)]
pub struct BackendFetch {
    client: Arc<BackendClient>,
    route: &'static str,
    service: &'static str,
}

impl BackendFetch {
    pub fn new(client: Arc<BackendClient>, route: &'static str, service: &'static str) -> Self {
        Self {
            client,
            route,
            service,
        }
    }
}

#[async_trait]
impl FetchOperation for BackendFetch {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchPayload, FetchError> {
        let builder = match request.instance_id {
            Some(id) if !request.validation_only => self.client.http.get(self.client.poll_url(self.route, id)),
            _ => self
                .client
                .http
                .post(self.client.test_url(self.route))
                .json(&*request.config),
        };
        trace!("{} request for route {}", self.service, self.route);

        let response = builder.send().await.map_err(|e| transport_error(e, self.service))?;
        let status = response.status();

        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("");
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::http(
                status.as_u16(),
                error_message(status.as_u16(), reason, &body, self.service),
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchError::Malformed(format!("{} returned invalid JSON: {}", self.service, e)))?;
        Ok(unwrap_envelope(body))
    }
}

fn transport_error(err: reqwest::Error, service: &str) -> FetchError {
    if err.is_decode() {
        FetchError::Malformed(err.to_string())
    } else if err.is_connect() {
        FetchError::Transport(format!("Connection refused - {} may be offline", service))
    } else {
        FetchError::Transport(err.to_string())
    }
}

/// Convert a backend body into a payload
///
/// Bodies shaped `{success, data, error}` are unwrapped and an explicit
/// `success: false` becomes a reported failure; any other body is the data.
pub fn unwrap_envelope(body: Value) -> FetchPayload {
    let Some(success) = body.get("success").and_then(Value::as_bool) else {
        return FetchPayload::ok(body.clone()).with_data(body);
    };

    if !success {
        let error = body
            .get("error")
            .and_then(Value::as_str)
            .filter(|e| !e.trim().is_empty())
            .unwrap_or("Unknown error occurred");
        return FetchPayload::failed(error);
    }

    let data = body.get("data").cloned().unwrap_or(Value::Null);
    let stats = if data.is_object() {
        data.clone()
    } else {
        Value::Object(Default::default())
    };
    let mut payload = FetchPayload::ok(stats).with_data(data);
    if let Some(state) = body.get("status").and_then(Value::as_str) {
        payload = payload.with_state(state);
    }
    payload
}
