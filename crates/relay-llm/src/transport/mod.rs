//! Moving wire requests to providers and answers back

pub mod client;
pub mod scripted;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde_json::Value;

pub use client::HttpTransport;
pub use scripted::{GenerationRecorder, RecordedRequest, ScriptedReply, ScriptedTransport};

use crate::adapter::WireRequest;
use crate::error::LlmError;
use crate::types::SseEvent;

/// Server-sent events of one streaming response
pub type SseStream = Pin<Box<dyn Stream<Item = Result<SseEvent, LlmError>> + Send>>;

/// Performs wire requests
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and decode its JSON answer
    async fn send(&self, request: &WireRequest) -> Result<Value, LlmError>;

    /// Send a request and return its event stream
    async fn stream(&self, request: &WireRequest) -> Result<SseStream, LlmError>;
}
