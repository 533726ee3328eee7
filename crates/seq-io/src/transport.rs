//! The GraphQL HTTP transport: posts `{query, variables}` to a single
//! endpoint, classifies the response, and records every request/response
//! pair into a [`RequestLog`] for later persistence.

use async_trait::async_trait;
use seq_core::{StepError, Transport, Value};
use serde_json::json;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{error, info};

/// One logged request/response pair, in the shape persisted to
/// `http_requests_<ts>.json`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LoggedRequest {
    pub request_id: String,
    pub timestamp: String,
    pub duration_seconds: f64,
    pub request: Value,
    pub response: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Accumulates [`LoggedRequest`] entries across a run. Disabled logging is a
/// no-op recorder rather than an `Option<RequestLog>` at every call site.
pub struct RequestLog {
    enabled: bool,
    entries: Mutex<Vec<LoggedRequest>>,
}

impl RequestLog {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, entries: Mutex::new(Vec::new()) }
    }

    fn record(&self, entry: LoggedRequest) {
        if self.enabled {
            self.entries.lock().unwrap().push(entry);
        }
    }

    pub fn entries(&self) -> Vec<LoggedRequest> {
        self.entries.lock().unwrap().clone()
    }
}

pub struct HttpTransport {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    log: RequestLog,
}

impl HttpTransport {
    pub fn new(
        client: reqwest::Client,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        log_enabled: bool,
    ) -> Self {
        Self { client, api_url: api_url.into(), api_key: api_key.into(), log: RequestLog::new(log_enabled) }
    }

    pub fn log(&self) -> &RequestLog {
        &self.log
    }

    fn redacted_key(&self) -> String {
        let tail: String = self.api_key.chars().rev().take(4).collect();
        format!("***{}", tail.chars().rev().collect::<String>())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, StepError> {
        let full_id = uuid::Uuid::new_v4().to_string();
        let request_id = full_id[..8].to_string();
        info!(request_id = %request_id, url = %self.api_url, "executing graphql request");

        let payload = json!({ "query": query, "variables": variables });
        let request_summary = json!({
            "url": self.api_url,
            "method": "POST",
            "headers": { "x-api-key": self.redacted_key() },
            "payload": payload,
        });

        let started = Instant::now();
        let response = match self
            .client
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let duration = started.elapsed().as_secs_f64();
                let message = err.to_string();
                error!(request_id = %request_id, error = %message, "transport request failed");
                self.log.record(LoggedRequest {
                    request_id,
                    timestamp: chrono::Utc::now().to_rfc3339(),
                    duration_seconds: duration,
                    request: request_summary,
                    response: json!({ "status_code": null, "headers": {}, "body": {} }),
                    error: Some(message.clone()),
                });
                return Err(StepError::Transport { status: None, body: json!({ "error": message }) });
            }
        };

        let status = response.status();
        let headers: serde_json::Map<String, Value> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v.to_str().unwrap_or_default())))
            .collect();
        let body_text = response.text().await.unwrap_or_default();
        let body: Value =
            serde_json::from_str(&body_text).unwrap_or_else(|_| json!({ "raw_text": body_text }));
        let duration = started.elapsed().as_secs_f64();

        let response_summary = json!({
            "status_code": status.as_u16(),
            "headers": headers,
            "body": body,
        });

        // Status is classified before the `errors` key, matching the source:
        // `raise_for_status()` runs before its `errors` check, so a non-2xx
        // response is always a transport error even if the body also
        // carries a GraphQL `errors` array.
        if !status.is_success() {
            let message = format!("http status {status}");
            error!(request_id = %request_id, status = %status, "transport returned error status");
            self.log.record(LoggedRequest {
                request_id,
                timestamp: chrono::Utc::now().to_rfc3339(),
                duration_seconds: duration,
                request: request_summary,
                response: response_summary,
                error: Some(message),
            });
            return Err(StepError::Transport { status: Some(status.as_u16()), body });
        }

        if let Some(errors) = body.get("errors") {
            let message = format!("graphql errors: {errors}");
            error!(request_id = %request_id, "graphql response contained errors");
            self.log.record(LoggedRequest {
                request_id,
                timestamp: chrono::Utc::now().to_rfc3339(),
                duration_seconds: duration,
                request: request_summary,
                response: response_summary,
                error: Some(message),
            });
            return Err(StepError::GraphQl { errors: errors.clone() });
        }

        info!(request_id = %request_id, status = %status, duration = duration, "request succeeded");
        self.log.record(LoggedRequest {
            request_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
            duration_seconds: duration,
            request: request_summary,
            response: response_summary,
            error: None,
        });
        Ok(body)
    }
}

/// Lets the CLI keep a handle to the request log after handing the
/// transport to the orchestrator as a boxed trait object.
#[async_trait]
impl Transport for std::sync::Arc<HttpTransport> {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, StepError> {
        HttpTransport::execute(self, query, variables).await
    }
}
