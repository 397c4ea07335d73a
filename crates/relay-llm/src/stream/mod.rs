//! Streaming lifecycle: tool-call merging, state machine, broadcasting

pub mod engine;
pub mod events;
pub mod merger;

pub use engine::{StreamEngine, StreamOutcome, StreamState};
pub use events::{Broadcaster, ChannelBroadcaster, LifecycleEvent, StreamDelta};
pub use merger::ToolCallMerger;
