//! Canonical, provider-agnostic model
//!
//! Every adapter translates between these types and its provider's wire
//! format; nothing here knows about any particular provider.

pub mod action;
pub mod canonical;
pub mod message;
pub mod prompt;
pub mod response;
pub mod stream;

pub use action::{Action, ActionDefinition, ActionStatus, ToolArguments};
pub use canonical::IntoCanonical;
pub use message::{Content, ContentPart, FileReference, Message, Role};
pub use prompt::{Prompt, PromptOptions, ResponseSchema, SharedBroadcaster, ToolChoice, ToolChoiceMode};
pub use response::{FinishReason, Response, Usage};
pub use stream::{SseEvent, StreamChunk, ToolCallFragment};
