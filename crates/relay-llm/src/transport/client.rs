//! `reqwest` transport

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use http::StatusCode;
use http::header::RETRY_AFTER;
use reqwest::Client;
use serde_json::Value;

use super::{SseStream, Transport};
use crate::adapter::WireRequest;
use crate::error::LlmError;
use crate::types::SseEvent;

/// HTTP transport backed by a shared `reqwest` client
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport whose requests give up after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Internal(anyhow::anyhow!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn execute(&self, request: &WireRequest) -> Result<reqwest::Response, LlmError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!(url = %request.url, error = %e, "upstream request failed");
            LlmError::provider(e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            tracing::warn!(url = %request.url, retry_after = ?retry_after, "upstream rate limited");
            return Err(LlmError::RateLimited { retry_after });
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(url = %request.url, status = %status, "upstream returned error");
        Err(LlmError::ProviderApi {
            status: Some(status.as_u16()),
            message: error_message(&body),
        })
    }
}

/// Provider error message from an error body, or the body itself
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .or_else(|| value.get("message"))
                .and_then(Value::as_str)
                .map(ToOwned::to_owned)
        })
        .unwrap_or_else(|| body.to_owned())
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &WireRequest) -> Result<Value, LlmError> {
        let response = self.execute(request).await?;
        response
            .json()
            .await
            .map_err(|e| LlmError::provider(format!("failed to parse response: {e}")))
    }

    async fn stream(&self, request: &WireRequest) -> Result<SseStream, LlmError> {
        let response = self.execute(request).await?;

        let events = response.bytes_stream().eventsource().map(|result| match result {
            Ok(event) => Ok(SseEvent {
                event: event.event,
                data: event.data,
            }),
            Err(e) => Err(LlmError::Streaming(e.to_string())),
        });

        Ok(Box::pin(events))
    }
}
