use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::Message;
use super::prompt::Prompt;

/// Reason the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of generation
    Stop,
    /// Hit the `max_tokens` limit
    Length,
    /// Model decided to call a tool
    ToolCalls,
    /// Content was filtered by safety systems
    ContentFilter,
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt
    pub input_tokens: u32,
    /// Tokens generated in the completion
    pub output_tokens: u32,
    /// Total tokens (input + output)
    pub total_tokens: u32,
}

impl Usage {
    pub const fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
        }
    }

    /// Fold a later usage report into this one
    ///
    /// Providers report input tokens up front and output tokens at the end,
    /// so non-zero counters win over zero ones.
    pub const fn merge(&mut self, other: Self) {
        if other.input_tokens > 0 {
            self.input_tokens = other.input_tokens;
        }
        if other.output_tokens > 0 {
            self.output_tokens = other.output_tokens;
        }
        self.total_tokens = self.input_tokens.saturating_add(self.output_tokens);
    }
}

/// Canonical result of one generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// The generated assistant message
    pub message: Message,
    /// Snapshot of the prompt that produced it
    pub prompt: Prompt,
    /// Raw wire payload, kept for diagnostics
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub raw: Value,
    /// Whether the generation completed normally
    pub success: bool,
    /// Token counters, when the provider reported them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Provider response identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Model that actually served the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Why generation stopped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl Response {
    /// Build a successful response around `message`
    pub fn new(prompt: &Prompt, message: Message, raw: Value) -> Self {
        Self {
            message,
            prompt: prompt.clone(),
            raw,
            success: true,
            usage: None,
            id: None,
            model: None,
            finish_reason: None,
        }
    }

    /// Text content of the generated message
    pub fn text(&self) -> String {
        self.message.content.as_text()
    }
}
