use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::types::{Message, ToolCallFragment};

/// Lifecycle event emitted while a generation streams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// First content or role marker arrived
    Open {
        /// Position in the message stack
        message_index: usize,
        /// Snapshot at open time
        message: Message,
    },
    /// Content-bearing chunk merged
    Update {
        /// Position in the message stack
        message_index: usize,
        /// Cumulative snapshot after merging
        message: Message,
        /// The chunk's own contribution
        delta: StreamDelta,
    },
    /// Generation finished or was aborted
    Close {
        /// Position of the final message in the message stack
        message_index: usize,
        /// Final message with parsed tool calls
        message: Message,
        /// Closed by the caller rather than the provider
        aborted: bool,
    },
}

/// Incremental contribution of one chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamDelta {
    /// Appended text
    Text {
        /// Fragment
        text: String,
    },
    /// Tool-call fragment
    ToolCall(ToolCallFragment),
}

impl LifecycleEvent {
    /// Message carried by the event
    pub const fn message(&self) -> &Message {
        match self {
            Self::Open { message, .. } | Self::Update { message, .. } | Self::Close { message, .. } => message,
        }
    }
}

/// Receiver of lifecycle events
///
/// Called inline from the chunk loop; a slow broadcaster slows only the
/// generation it is attached to.
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, event: &LifecycleEvent);
}

impl<F> Broadcaster for F
where
    F: Fn(&LifecycleEvent) + Send + Sync,
{
    fn broadcast(&self, event: &LifecycleEvent) {
        self(event);
    }
}

/// Forwards lifecycle events into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster(pub UnboundedSender<LifecycleEvent>);

impl Broadcaster for ChannelBroadcaster {
    fn broadcast(&self, event: &LifecycleEvent) {
        if self.0.send(event.clone()).is_err() {
            tracing::debug!("lifecycle receiver dropped");
        }
    }
}
