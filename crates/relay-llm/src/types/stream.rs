use serde::{Deserialize, Serialize};

use super::message::Role;
use super::response::{FinishReason, Usage};

/// Provider-agnostic unit decoded from one streaming wire event
///
/// Decoders may turn a single wire event into several chunks (a role marker
/// followed by content, for example) or none at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// Explicit role marker for the message at `message_index`
    Start {
        /// Position in the message stack
        message_index: usize,
        /// Author role announced by the provider
        role: Role,
    },
    /// Text fragment
    Content {
        /// Position in the message stack
        message_index: usize,
        /// Fragment to append
        text: String,
    },
    /// Tool-call fragment
    ToolCall(ToolCallFragment),
    /// Token counters
    Usage(Usage),
    /// Response-level identifiers
    Metadata {
        /// Provider response id
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Serving model
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },
    /// Reason generation stopped; not terminal on its own
    Finish {
        /// Normalised reason
        reason: FinishReason,
    },
    /// Provider's end-of-response signal
    Done,
    /// Event that carries no new content (pings, signatures, citations, ...)
    Informational {
        /// Provider event name
        kind: String,
    },
}

/// Partial tool call as delivered by the provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallFragment {
    /// Position of the owning message in the message stack
    pub message_index: usize,
    /// Position of this call among the message's tool calls
    pub index: usize,
    /// Call id, usually only on the first fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Tool name, usually only on the first fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Argument text to append; `Some("")` means the provider sent an explicit empty string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl ToolCallFragment {
    /// First fragment of call `index` on message 0
    pub fn start(index: usize, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            id: Some(id.into()),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Argument continuation for call `index` on message 0
    pub fn arguments(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            arguments: Some(text.into()),
            ..Self::default()
        }
    }
}

impl StreamChunk {
    /// Text fragment for message 0
    pub fn text(text: impl Into<String>) -> Self {
        Self::Content {
            message_index: 0,
            text: text.into(),
        }
    }

    /// Whether this chunk contributes content to a message
    pub const fn is_content(&self) -> bool {
        matches!(self, Self::Content { .. } | Self::ToolCall(_))
    }
}

/// One server-sent event as read off the wire
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name; empty when the server sent only `data:` lines
    pub event: String,
    /// Event payload
    pub data: String,
}

impl SseEvent {
    /// Unnamed event carrying `data`
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            event: String::new(),
            data: data.into(),
        }
    }

    /// Named event carrying `data`
    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }
}
