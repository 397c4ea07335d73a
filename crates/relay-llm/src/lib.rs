//! Generation-provider protocol layer
//!
//! One canonical prompt/response model over `OpenAI` (chat completions and
//! responses), Anthropic, gateway-hosted Anthropic, Azure, Ollama and
//! `OpenRouter`, with streamed responses reassembled into complete messages
//! and exactly-once lifecycle events.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod adapter;
pub mod convert;
pub mod error;
pub mod generator;
pub mod protocol;
pub mod rescue;
pub mod stream;
pub mod tool_choice;
pub mod transport;
pub mod types;

pub use adapter::{Adapter, Operation, StreamDecoder, WireProtocol, WireRequest};
pub use error::{ErrorKind, LlmError};
pub use generator::Generator;
pub use rescue::{Outcome, Rescue};
pub use stream::{Broadcaster, LifecycleEvent, StreamEngine};
pub use tool_choice::clear_tool_choice;
pub use transport::{HttpTransport, Transport};
pub use types::{Action, Message, Prompt, Response, Role};
