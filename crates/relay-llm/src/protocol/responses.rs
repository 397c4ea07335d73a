//! Responses API wire format (`OpenAI` and Azure)

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// -- Request types --

/// Responses API request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesRequest {
    /// Model identifier
    pub model: String,
    /// Conversation items
    pub input: Vec<ResponsesInputItem>,
    /// System-level instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Whether to stream the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Tool definitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ResponsesTool>>,
    /// Tool choice configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    /// Text output configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<ResponsesText>,
    /// Provider-specific top-level fields
    #[serde(flatten, default)]
    pub extras: Map<String, Value>,
}

/// Input item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesInputItem {
    /// Conversation message
    Message {
        /// Author role
        role: String,
        /// Content parts
        content: Vec<ResponsesInputContent>,
    },
    /// Tool call previously made by the model
    FunctionCall {
        /// Call identifier
        call_id: String,
        /// Tool name
        name: String,
        /// JSON-encoded arguments
        arguments: String,
    },
    /// Result of executing a tool call
    FunctionCallOutput {
        /// Call identifier this answers
        call_id: String,
        /// Tool output text
        output: String,
    },
}

/// Content part within an input message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesInputContent {
    /// User or system text
    InputText {
        /// The text string
        text: String,
    },
    /// Assistant text from an earlier turn
    OutputText {
        /// The text string
        text: String,
    },
    /// Image reference
    InputImage {
        /// Image URL or base64 data URI
        image_url: String,
        /// Detail level
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// File reference
    InputFile {
        /// Uploaded file id
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_id: Option<String>,
        /// Publicly reachable URL
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_url: Option<String>,
        /// Base64 data URI
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_data: Option<String>,
        /// Original file name
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
}

/// Tool definition; flat, with no nested `function` object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesTool {
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for parameters
    pub parameters: Value,
    /// Strict schema adherence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

/// Text output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesText {
    /// Output format
    pub format: ResponsesTextFormat,
}

/// Output format within `text`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesTextFormat {
    /// Unconstrained text
    Text,
    /// Output constrained to a JSON schema
    JsonSchema {
        /// Schema name
        name: String,
        /// Description
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        /// The schema itself
        schema: Value,
        /// Strict adherence
        #[serde(default, skip_serializing_if = "Option::is_none")]
        strict: Option<bool>,
    },
}

// -- Response types --

/// Responses API response object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesResponse {
    /// Response identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Model used
    #[serde(default)]
    pub model: Option<String>,
    /// Lifecycle status ("completed", "incomplete", "failed", ...)
    #[serde(default)]
    pub status: Option<String>,
    /// Output items in order
    #[serde(default)]
    pub output: Vec<ResponsesOutputItem>,
    /// Why the response is incomplete, when it is
    #[serde(default)]
    pub incomplete_details: Option<ResponsesIncompleteDetails>,
    /// Failure details, when status is "failed"
    #[serde(default)]
    pub error: Option<ResponsesError>,
    /// Token usage
    #[serde(default)]
    pub usage: Option<ResponsesUsage>,
}

/// Output item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesOutputItem {
    /// Assistant message
    Message {
        /// Item identifier
        #[serde(default)]
        id: Option<String>,
        /// Declared role
        #[serde(default = "assistant_role")]
        role: String,
        /// Content parts
        #[serde(default)]
        content: Vec<ResponsesOutputContent>,
    },
    /// Tool call
    FunctionCall {
        /// Item identifier
        #[serde(default)]
        id: Option<String>,
        /// Call identifier used to answer the call
        call_id: String,
        /// Tool name
        name: String,
        /// JSON-encoded arguments
        #[serde(default)]
        arguments: Option<String>,
    },
    /// Reasoning, web search and other item types
    #[serde(other)]
    Other,
}

fn assistant_role() -> String {
    "assistant".to_owned()
}

/// Content part within an output message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesOutputContent {
    /// Generated text
    OutputText {
        /// The text string
        text: String,
    },
    /// Refusal text
    Refusal {
        /// Refusal explanation
        refusal: String,
    },
    /// Unrecognised part
    #[serde(other)]
    Other,
}

/// Incomplete details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesIncompleteDetails {
    /// Reason ("`max_output_tokens`", "`content_filter`")
    pub reason: String,
}

/// Token usage
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResponsesUsage {
    /// Input tokens
    #[serde(default)]
    pub input_tokens: u32,
    /// Output tokens
    #[serde(default)]
    pub output_tokens: u32,
    /// Total tokens
    #[serde(default)]
    pub total_tokens: u32,
}

/// Error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesError {
    /// Error code
    #[serde(default)]
    pub code: Option<String>,
    /// Error message
    #[serde(default)]
    pub message: String,
}

// -- Streaming types --

/// Streaming event, tagged by its `type` field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResponsesStreamEvent {
    /// Response object created
    #[serde(rename = "response.created")]
    Created {
        /// Initial response snapshot
        response: ResponsesResponse,
    },
    /// Output item started
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        /// Position among output items
        output_index: usize,
        /// The new item
        item: ResponsesOutputItem,
    },
    /// Output item finished
    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        /// Position among output items
        output_index: usize,
        /// The completed item
        item: ResponsesOutputItem,
    },
    /// Text fragment
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        /// Position among output items
        output_index: usize,
        /// Fragment to append
        delta: String,
    },
    /// Tool-call argument fragment
    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta {
        /// Position among output items
        output_index: usize,
        /// Fragment to append
        delta: String,
    },
    /// Response finished
    #[serde(rename = "response.completed")]
    Completed {
        /// Final response snapshot
        response: ResponsesResponse,
    },
    /// Response finished early
    #[serde(rename = "response.incomplete")]
    Incomplete {
        /// Final response snapshot
        response: ResponsesResponse,
    },
    /// Response failed
    #[serde(rename = "response.failed")]
    Failed {
        /// Response snapshot carrying the error
        response: ResponsesResponse,
    },
    /// Stream-level error
    #[serde(rename = "error")]
    Error {
        /// Error code
        #[serde(default)]
        code: Option<String>,
        /// Error message
        #[serde(default)]
        message: String,
    },
    /// Progress notifications, `*.done` echoes, reasoning summaries, ...
    #[serde(other)]
    Other,
}
