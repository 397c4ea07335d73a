//! In-process transport replaying canned answers
//!
//! Requests are recorded into a [`GenerationRecorder`] owned by the caller,
//! so parallel tests never observe each other's traffic.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use http::Method;
use serde_json::Value;
use url::Url;

use super::{SseStream, Transport};
use crate::adapter::WireRequest;
use crate::error::LlmError;
use crate::types::SseEvent;

/// Canned answer to one request
#[derive(Debug)]
pub enum ScriptedReply {
    /// Non-streaming JSON body
    Json(Value),
    /// Complete event stream
    Events(Vec<SseEvent>),
    /// Events followed by a transport failure
    Interrupted(Vec<SseEvent>, LlmError),
    /// Events followed by a stream that never ends
    Stalled(Vec<SseEvent>),
    /// Request-level failure
    Failure(LlmError),
}

/// What the transport was asked to do
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<Value>,
    /// Whether the request asked for a stream
    pub streaming: bool,
}

/// Shared log of recorded requests
#[derive(Debug, Clone, Default)]
pub struct GenerationRecorder {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl GenerationRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecordedRequest>> {
        self.requests.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn record(&self, request: &WireRequest, streaming: bool) {
        self.lock().push(RecordedRequest {
            method: request.method.clone(),
            url: request.url.clone(),
            body: request.body.clone(),
            streaming,
        });
    }

    /// Snapshot of every recorded request, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Transport answering from a script
#[derive(Debug)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<ScriptedReply>>,
    recorder: GenerationRecorder,
}

impl ScriptedTransport {
    pub fn new(recorder: GenerationRecorder) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            recorder,
        }
    }

    /// Queue the answer to the next unanswered request
    #[must_use]
    pub fn reply(self, reply: ScriptedReply) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(reply);
        self
    }

    fn next_reply(&self, request: &WireRequest, streaming: bool) -> Result<ScriptedReply, LlmError> {
        self.recorder.record(request, streaming);
        self.replies
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| LlmError::Internal(anyhow::anyhow!("no scripted reply for {}", request.url)))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &WireRequest) -> Result<Value, LlmError> {
        match self.next_reply(request, false)? {
            ScriptedReply::Json(value) => Ok(value),
            ScriptedReply::Failure(error) => Err(error),
            other => Err(LlmError::Internal(anyhow::anyhow!(
                "scripted stream reply {other:?} for a non-streaming request"
            ))),
        }
    }

    async fn stream(&self, request: &WireRequest) -> Result<SseStream, LlmError> {
        match self.next_reply(request, true)? {
            ScriptedReply::Events(events) => Ok(Box::pin(stream::iter(events.into_iter().map(Ok)))),
            ScriptedReply::Interrupted(events, error) => Ok(Box::pin(
                stream::iter(events.into_iter().map(Ok)).chain(stream::once(async move { Err(error) })),
            )),
            ScriptedReply::Stalled(events) => {
                Ok(Box::pin(stream::iter(events.into_iter().map(Ok)).chain(stream::pending())))
            }
            ScriptedReply::Failure(error) => Err(error),
            ScriptedReply::Json(value) => Err(LlmError::Internal(anyhow::anyhow!(
                "scripted JSON reply {value} for a streaming request"
            ))),
        }
    }
}
