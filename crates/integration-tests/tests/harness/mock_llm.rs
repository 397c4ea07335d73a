//! Mock LLM backend server for integration tests
//!
//! Speaks just enough of the chat completions, responses, messages, Vertex
//! raw-predict and Azure deployment APIs to exercise every adapter over real
//! HTTP. Every request is recorded for later inspection.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::{StreamExt, stream};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// How the mock answers completion requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Answer normally
    Normal,
    /// Fail the first `n` requests with 500
    Failing(u32),
    /// Answer every request with 429 and `retry-after: 7`
    RateLimited,
    /// Send the first stream event, then never finish
    Stalled,
}

/// A request as the mock received it
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Mock LLM backend that returns predictable responses
pub struct MockLlm {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockLlmState>,
}

struct MockLlmState {
    behavior: Behavior,
    failures_left: AtomicU32,
    received: Mutex<Vec<ReceivedRequest>>,
}

impl MockLlmState {
    fn record(&self, uri: &Uri, headers: &HeaderMap, body: &Value) {
        self.received
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(ReceivedRequest {
                path: uri.path().to_owned(),
                query: uri.query().map(str::to_owned),
                headers: headers.clone(),
                body: body.clone(),
            });
    }

    /// Error response demanded by the configured behavior, if any
    fn scripted_failure(&self) -> Option<Response> {
        match self.behavior {
            Behavior::RateLimited => Some(
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, "7")],
                    Json(json!({"error": {"message": "slow down", "type": "rate_limit_error"}})),
                )
                    .into_response(),
            ),
            Behavior::Failing(_) if self.failures_left.load(Ordering::Relaxed) > 0 => {
                self.failures_left.fetch_sub(1, Ordering::Relaxed);
                Some(
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({"error": {"message": "mock server intentional failure", "type": "server_error"}})),
                    )
                        .into_response(),
                )
            }
            _ => None,
        }
    }
}

impl MockLlm {
    /// Start the mock server, returning immediately
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with(Behavior::Normal).await
    }

    pub async fn start_with(behavior: Behavior) -> anyhow::Result<Self> {
        let failures = match behavior {
            Behavior::Failing(n) => n,
            _ => 0,
        };
        let state = Arc::new(MockLlmState {
            behavior,
            failures_left: AtomicU32::new(failures),
            received: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_chat))
            .route("/v1/responses", routing::post(handle_responses))
            .route("/v1/messages", routing::post(handle_messages))
            .route("/v1/messages/count_tokens", routing::post(handle_count_tokens))
            .route("/v1/models", routing::get(handle_models))
            .route(
                "/openai/deployments/{deployment}/chat/completions",
                routing::post(handle_azure_chat),
            )
            .route(
                "/v1/projects/{project}/locations/{region}/publishers/anthropic/models/{action}",
                routing::post(handle_raw_predict),
            )
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Root URL without any API prefix
    pub fn root_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Base URL for OpenAI-style and Anthropic providers
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Every request received so far, oldest first
    pub fn received(&self) -> Vec<ReceivedRequest> {
        self.state
            .received
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// The most recent request
    pub fn last_request(&self) -> ReceivedRequest {
        self.received().pop().expect("mock received no request")
    }
}

impl Drop for MockLlm {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// -- Handlers --

async fn handle_chat(
    State(state): State<Arc<MockLlmState>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record(&uri, &headers, &body);
    if let Some(failure) = state.scripted_failure() {
        return failure;
    }
    chat_completion(&state, &body)
}

async fn handle_azure_chat(
    State(state): State<Arc<MockLlmState>>,
    Path(_deployment): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record(&uri, &headers, &body);
    chat_completion(&state, &body)
}

fn chat_completion(state: &MockLlmState, body: &Value) -> Response {
    let model = body["model"].as_str().unwrap_or("mock-model").to_owned();
    let has_tools = body.get("tools").is_some();

    if body["stream"].as_bool().unwrap_or(false) {
        return sse_response(state.behavior, chat_stream_events(&model, has_tools));
    }

    let message = if has_tools {
        json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_test_123",
                "type": "function",
                "function": {"name": "get_weather", "arguments": "{\"location\":\"San Francisco\"}"}
            }]
        })
    } else {
        json!({"role": "assistant", "content": "Hello from mock LLM"})
    };

    let finish_reason = if has_tools { "tool_calls" } else { "stop" };
    Json(json!({
        "id": "chatcmpl-test-123",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": model,
        "choices": [{
            "index": 0,
            "message": message,
            "finish_reason": finish_reason,
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    }))
    .into_response()
}

fn chat_stream_events(model: &str, has_tools: bool) -> Vec<(Option<&'static str>, Value)> {
    let chunk = |delta: Value, finish: Value| {
        json!({
            "id": "chatcmpl-test-stream",
            "object": "chat.completion.chunk",
            "created": 1_700_000_000,
            "model": model,
            "choices": [{"index": 0, "delta": delta, "finish_reason": finish}]
        })
    };

    let mut events = vec![chunk(json!({"role": "assistant", "content": ""}), Value::Null)];
    if has_tools {
        events.push(chunk(
            json!({"tool_calls": [{
                "index": 0,
                "id": "call_test_stream",
                "type": "function",
                "function": {"name": "get_weather", "arguments": ""}
            }]}),
            Value::Null,
        ));
        for part in ["{\"location\":", "\"San Francisco\"}"] {
            events.push(chunk(
                json!({"tool_calls": [{"index": 0, "function": {"arguments": part}}]}),
                Value::Null,
            ));
        }
        events.push(chunk(json!({}), json!("tool_calls")));
    } else {
        for word in ["Hello", " from", " mock", " LLM"] {
            events.push(chunk(json!({"content": word}), Value::Null));
        }
        events.push(chunk(json!({}), json!("stop")));
    }

    events.push(json!({
        "id": "chatcmpl-test-stream",
        "object": "chat.completion.chunk",
        "created": 1_700_000_000,
        "model": model,
        "choices": [],
        "usage": {"prompt_tokens": 10, "completion_tokens": 4, "total_tokens": 14}
    }));

    events.into_iter().map(|event| (None, event)).collect()
}

async fn handle_responses(
    State(state): State<Arc<MockLlmState>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record(&uri, &headers, &body);
    if let Some(failure) = state.scripted_failure() {
        return failure;
    }

    Json(json!({
        "id": "resp_test_123",
        "object": "response",
        "model": body["model"],
        "status": "completed",
        "output": [{
            "type": "message",
            "id": "msg_1",
            "role": "assistant",
            "content": [{"type": "output_text", "text": "{\"answer\":42}"}]
        }],
        "usage": {"input_tokens": 12, "output_tokens": 6, "total_tokens": 18}
    }))
    .into_response()
}

async fn handle_messages(
    State(state): State<Arc<MockLlmState>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record(&uri, &headers, &body);
    if let Some(failure) = state.scripted_failure() {
        return failure;
    }
    let model = body["model"].as_str().unwrap_or("claude-mock").to_owned();
    anthropic_message(&state, &body, &model)
}

async fn handle_raw_predict(
    State(state): State<Arc<MockLlmState>>,
    Path((_project, _region, action)): Path<(String, String, String)>,
    uri: Uri,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    state.record(&uri, &headers, &body);
    let (model, method) = action.split_once(':').unwrap_or((action.as_str(), "rawPredict"));
    if method == "streamRawPredict" {
        body["stream"] = Value::Bool(true);
    }
    anthropic_message(&state, &body, model)
}

fn anthropic_message(state: &MockLlmState, body: &Value, model: &str) -> Response {
    let has_tools = body.get("tools").is_some();

    if body["stream"].as_bool().unwrap_or(false) {
        return sse_response(state.behavior, anthropic_stream_events(model, has_tools));
    }

    let content = if has_tools {
        json!([
            {"type": "text", "text": "Let me check."},
            {"type": "tool_use", "id": "toolu_test", "name": "get_weather", "input": {"location": "Paris"}}
        ])
    } else {
        json!([{"type": "text", "text": "Hello from mock Claude"}])
    };

    let stop_reason = if has_tools { "tool_use" } else { "end_turn" };
    Json(json!({
        "id": "msg_test_123",
        "type": "message",
        "role": "assistant",
        "model": model,
        "content": content,
        "stop_reason": stop_reason,
        "usage": {"input_tokens": 20, "output_tokens": 8}
    }))
    .into_response()
}

fn anthropic_stream_events(model: &str, has_tools: bool) -> Vec<(Option<&'static str>, Value)> {
    let mut events = vec![
        (
            Some("message_start"),
            json!({"type": "message_start", "message": {
                "id": "msg_test_stream", "type": "message", "role": "assistant",
                "model": model, "content": [], "usage": {"input_tokens": 20, "output_tokens": 0}
            }}),
        ),
        (Some("ping"), json!({"type": "ping"})),
        (
            Some("content_block_start"),
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
        ),
        (
            Some("content_block_delta"),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Hello from"}}),
        ),
        (
            Some("content_block_delta"),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": " mock Claude"}}),
        ),
        (Some("content_block_stop"), json!({"type": "content_block_stop", "index": 0})),
    ];

    if has_tools {
        events.push((
            Some("content_block_start"),
            json!({"type": "content_block_start", "index": 1, "content_block": {
                "type": "tool_use", "id": "toolu_stream", "name": "get_weather", "input": {}
            }}),
        ));
        for part in ["{\"location\"", ": \"Paris\"}"] {
            events.push((
                Some("content_block_delta"),
                json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": part}}),
            ));
        }
        events.push((Some("content_block_stop"), json!({"type": "content_block_stop", "index": 1})));
    }

    let stop_reason = if has_tools { "tool_use" } else { "end_turn" };
    events.push((
        Some("message_delta"),
        json!({"type": "message_delta", "delta": {"stop_reason": stop_reason}, "usage": {"output_tokens": 8}}),
    ));
    events.push((Some("message_stop"), json!({"type": "message_stop"})));
    events
}

async fn handle_count_tokens(
    State(state): State<Arc<MockLlmState>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record(&uri, &headers, &body);
    Json(json!({"input_tokens": 42})).into_response()
}

async fn handle_models(State(state): State<Arc<MockLlmState>>, uri: Uri, headers: HeaderMap) -> Response {
    state.record(&uri, &headers, &Value::Null);
    Json(json!({
        "object": "list",
        "data": [
            {"id": "mock-model-1", "object": "model", "created": 1_700_000_000, "owned_by": "mock"},
            {"id": "mock-model-2", "object": "model", "created": 1_700_000_000, "owned_by": "mock"}
        ]
    }))
    .into_response()
}

// -- SSE --

fn sse_frame(name: Option<&str>, data: &Value) -> String {
    match name {
        Some(name) => format!("event: {name}\ndata: {data}\n\n"),
        None => format!("data: {data}\n\n"),
    }
}

/// Stream `events` as an SSE body, ending with `[DONE]` for unnamed streams
fn sse_response(behavior: Behavior, events: Vec<(Option<&'static str>, Value)>) -> Response {
    let named = events.first().is_some_and(|(name, _)| name.is_some());
    let mut frames: Vec<String> = events.iter().map(|(name, data)| sse_frame(*name, data)).collect();
    if !named {
        frames.push("data: [DONE]\n\n".to_owned());
    }

    let body = if behavior == Behavior::Stalled {
        frames.truncate(1);
        Body::from_stream(stream::iter(frames.into_iter().map(Ok::<_, Infallible>)).chain(stream::pending()))
    } else {
        Body::from_stream(stream::iter(frames.into_iter().map(Ok::<_, Infallible>)))
    };

    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}
