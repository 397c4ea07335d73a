//! Streaming reconstruction state machine
//!
//! One [`StreamState`] per generation moves IDLE → OPEN → UPDATE* → CLOSE.
//! The engine itself only holds the broadcaster, so a single instance can
//! drive any number of generations as long as each owns its state.

use std::collections::BTreeMap;
use std::mem;

use super::events::{LifecycleEvent, StreamDelta};
use super::merger::ToolCallMerger;
use crate::types::{
    Content, FinishReason, Message, Prompt, Response, SharedBroadcaster, StreamChunk, Usage,
};

/// Mutable state of one in-flight generation
#[derive(Debug, Default)]
pub struct StreamState {
    message_stack: BTreeMap<usize, Message>,
    text: BTreeMap<usize, String>,
    merger: ToolCallMerger,
    open: bool,
    closed: bool,
    aborted: bool,
    terminal_seen: bool,
    usage: Option<Usage>,
    finish_reason: Option<FinishReason>,
    id: Option<String>,
    model: Option<String>,
}

impl StreamState {
    /// Whether the generation has opened and not yet closed
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// Whether the generation has closed
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_message(&mut self, message_index: usize) {
        self.message_stack
            .entry(message_index)
            .or_insert_with(|| Message::assistant(""));
    }

    fn snapshot(&self, message_index: usize) -> Message {
        let mut message = self
            .message_stack
            .get(&message_index)
            .cloned()
            .unwrap_or_else(|| Message::assistant(""));
        if !self.closed {
            message.content = Content::Text(self.text.get(&message_index).cloned().unwrap_or_default());
            message.requested_actions = self.merger.snapshot(message_index);
        }
        message
    }

    fn last_index(&self) -> usize {
        self.message_stack.keys().next_back().copied().unwrap_or_default()
    }
}

/// Result of a finished generation
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutcome {
    /// Every reconstructed message, in stack order
    pub messages: Vec<Message>,
    /// Token counters folded from usage chunks
    pub usage: Option<Usage>,
    /// Last reported finish reason
    pub finish_reason: Option<FinishReason>,
    /// Provider response id
    pub id: Option<String>,
    /// Serving model
    pub model: Option<String>,
    /// Whether the provider's terminal event arrived
    pub completed: bool,
    /// Whether the caller aborted the generation
    pub aborted: bool,
}

impl StreamOutcome {
    /// Final message; the last one on the stack
    pub fn message(&self) -> Message {
        self.messages.last().cloned().unwrap_or_else(|| Message::assistant(""))
    }

    /// Build the canonical response for this generation
    pub fn into_response(self, prompt: &Prompt) -> Response {
        let mut response = Response::new(prompt, self.message(), serde_json::Value::Null);
        response.success = self.completed && !self.aborted;
        response.usage = self.usage;
        response.finish_reason = self.finish_reason;
        response.id = self.id;
        response.model = self.model;
        response
    }
}

/// Drives [`StreamState`]s and notifies the broadcaster
#[derive(Debug, Clone, Default)]
pub struct StreamEngine {
    broadcaster: Option<SharedBroadcaster>,
}

impl StreamEngine {
    pub const fn new(broadcaster: Option<SharedBroadcaster>) -> Self {
        Self { broadcaster }
    }

    /// Fresh state for a new generation
    #[allow(clippy::unused_self)]
    pub fn begin(&self) -> StreamState {
        StreamState::default()
    }

    /// Merge one chunk, returning the lifecycle events it produced
    pub fn process(&self, state: &mut StreamState, chunk: StreamChunk) -> Vec<LifecycleEvent> {
        if state.closed {
            if matches!(chunk, StreamChunk::Done) {
                tracing::debug!("ignoring terminal event after close");
            } else {
                tracing::debug!(chunk = ?chunk, "ignoring chunk after close");
            }
            return Vec::new();
        }

        let mut events = Vec::new();

        match chunk {
            StreamChunk::Start { message_index, role } => {
                state
                    .message_stack
                    .entry(message_index)
                    .and_modify(|m| m.role = role)
                    .or_insert_with(|| Message::new(role, ""));
                self.open(state, message_index, &mut events);
            }
            StreamChunk::Content { message_index, text } => {
                state.ensure_message(message_index);
                state.text.entry(message_index).or_default().push_str(&text);
                self.open(state, message_index, &mut events);
                self.update(state, message_index, StreamDelta::Text { text }, &mut events);
            }
            StreamChunk::ToolCall(fragment) => {
                let message_index = fragment.message_index;
                state.ensure_message(message_index);
                state.merger.merge(&fragment);
                self.open(state, message_index, &mut events);
                self.update(state, message_index, StreamDelta::ToolCall(fragment), &mut events);
            }
            StreamChunk::Usage(usage) => {
                state.usage.get_or_insert_with(Usage::default).merge(usage);
            }
            StreamChunk::Metadata { id, model } => {
                if id.is_some() {
                    state.id = id;
                }
                if model.is_some() {
                    state.model = model;
                }
            }
            StreamChunk::Finish { reason } => state.finish_reason = Some(reason),
            StreamChunk::Done => {
                state.terminal_seen = true;
                self.close(state, false, &mut events);
            }
            StreamChunk::Informational { kind } => {
                tracing::debug!(kind = %kind, "absorbed informational stream event");
            }
        }

        events
    }

    /// Force CLOSE without a terminal event; a second call is a no-op
    pub fn abort(&self, state: &mut StreamState) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        if !state.closed {
            tracing::debug!("aborting stream");
            self.close(state, true, &mut events);
        }
        events
    }

    /// Consume the state, closing it first if the provider never did
    pub fn finish(&self, mut state: StreamState) -> StreamOutcome {
        if !state.closed {
            tracing::debug!("stream ended without a terminal event");
            self.close(&mut state, false, &mut Vec::new());
        }

        StreamOutcome {
            messages: state.message_stack.into_values().collect(),
            usage: state.usage,
            finish_reason: state.finish_reason,
            id: state.id,
            model: state.model,
            completed: state.terminal_seen,
            aborted: state.aborted,
        }
    }

    fn open(&self, state: &mut StreamState, message_index: usize, events: &mut Vec<LifecycleEvent>) {
        if state.open {
            return;
        }
        state.open = true;
        self.emit(
            LifecycleEvent::Open {
                message_index,
                message: state.snapshot(message_index),
            },
            events,
        );
    }

    fn update(&self, state: &StreamState, message_index: usize, delta: StreamDelta, events: &mut Vec<LifecycleEvent>) {
        self.emit(
            LifecycleEvent::Update {
                message_index,
                message: state.snapshot(message_index),
                delta,
            },
            events,
        );
    }

    fn close(&self, state: &mut StreamState, aborted: bool, events: &mut Vec<LifecycleEvent>) {
        state.closed = true;
        state.open = false;
        state.aborted = aborted;

        // Argument buffers are parsed exactly once, here
        for (message_index, actions) in mem::take(&mut state.merger).finalize() {
            state.ensure_message(message_index);
            if let Some(message) = state.message_stack.get_mut(&message_index) {
                message.requested_actions = actions;
            }
        }
        for (message_index, text) in mem::take(&mut state.text) {
            state.ensure_message(message_index);
            if let Some(message) = state.message_stack.get_mut(&message_index) {
                message.content = Content::Text(text);
            }
        }

        let message_index = state.last_index();
        self.emit(
            LifecycleEvent::Close {
                message_index,
                message: state.snapshot(message_index),
                aborted,
            },
            events,
        );
    }

    fn emit(&self, event: LifecycleEvent, events: &mut Vec<LifecycleEvent>) {
        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.0.broadcast(&event);
        }
        events.push(event);
    }
}
