use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::action::ActionDefinition;
use super::canonical::{IntoCanonical, expect_object};
use super::message::Message;
use crate::error::LlmError;
use crate::stream::Broadcaster;

/// Canonical input to an adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    /// Conversation messages, oldest first
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Tools available to the model this turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionDefinition>,
    /// System-level instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Generation options
    pub options: PromptOptions,
}

/// Options controlling a single generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptOptions {
    /// Model identifier
    pub model: String,
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Stop sequences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Structured-output contract
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<ResponseSchema>,
    /// How the model should select tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,
    /// Receiver of lifecycle events while streaming
    #[serde(skip)]
    pub broadcaster: Option<SharedBroadcaster>,
    /// Provider-specific top-level body fields (fallback models, transforms, ...)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extras: Map<String, Value>,
}

/// JSON schema the response must conform to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSchema {
    /// Schema name reported to the provider
    pub name: String,
    /// The JSON schema itself
    pub schema: Value,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Strict schema adherence
    #[serde(default = "default_strict")]
    pub strict: bool,
}

const fn default_strict() -> bool {
    true
}

impl ResponseSchema {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
            description: None,
            strict: true,
        }
    }
}

/// How the model should select tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolChoice {
    /// Simple mode: "none", "auto", or "required"
    Mode(ToolChoiceMode),
    /// Force one named tool
    Action {
        /// Tool that must be called
        name: String,
    },
}

/// Tool selection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoiceMode {
    /// Model will not call any tools
    None,
    /// Model decides whether to call tools
    Auto,
    /// Model must call at least one tool
    Required,
}

impl ToolChoice {
    pub const fn required() -> Self {
        Self::Mode(ToolChoiceMode::Required)
    }

    pub fn action(name: impl Into<String>) -> Self {
        Self::Action { name: name.into() }
    }

    /// Whether this choice forces the model to call a tool
    pub const fn is_forced(&self) -> bool {
        matches!(self, Self::Mode(ToolChoiceMode::Required) | Self::Action { .. })
    }
}

/// Cloneable handle to a caller-supplied broadcaster
#[derive(Clone)]
pub struct SharedBroadcaster(pub Arc<dyn Broadcaster>);

impl SharedBroadcaster {
    pub fn new(broadcaster: impl Broadcaster + 'static) -> Self {
        Self(Arc::new(broadcaster))
    }
}

impl fmt::Debug for SharedBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBroadcaster").finish_non_exhaustive()
    }
}

impl PartialEq for SharedBroadcaster {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Prompt {
    /// Create an empty prompt targeting `model`
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            actions: Vec::new(),
            instructions: None,
            options: PromptOptions {
                model: model.into(),
                ..PromptOptions::default()
            },
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: ActionDefinition) -> Self {
        self.actions.push(action);
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: ResponseSchema) -> Self {
        self.options.response_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.options.tool_choice = Some(choice);
        self
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f64) -> Self {
        self.options.temperature = Some(temperature);
        self
    }

    /// Enable streaming, optionally delivering lifecycle events to `broadcaster`
    #[must_use]
    pub fn streaming(mut self, broadcaster: Option<SharedBroadcaster>) -> Self {
        self.options.stream = true;
        self.options.broadcaster = broadcaster;
        self
    }

    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.extras.insert(key.into(), value);
        self
    }

    /// Model identifier
    pub fn model(&self) -> &str {
        &self.options.model
    }

    /// Whether any message carries multi-part, image, or file content
    pub fn has_rich_content(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.content.is_multi_part() || m.content.has_images() || m.content.has_files())
    }
}

impl IntoCanonical<Prompt> for Prompt {
    fn into_canonical(self) -> Result<Prompt, LlmError> {
        Ok(self)
    }
}

impl IntoCanonical<Prompt> for Value {
    fn into_canonical(self) -> Result<Prompt, LlmError> {
        let mut object = expect_object(&self, "prompt")?.clone();

        let messages = match object.remove("messages") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .into_iter()
                .map(IntoCanonical::<Message>::into_canonical)
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(LlmError::validation("messages", "expected a list")),
        };

        let options = object
            .get("options")
            .ok_or_else(|| LlmError::validation("options", "missing"))?;
        match expect_object(options, "options")?.get("model") {
            Some(Value::String(model)) if !model.is_empty() => {}
            _ => return Err(LlmError::validation("options.model", "expected a non-empty model id")),
        }

        let mut prompt: Prompt =
            serde_json::from_value(Value::Object(object)).map_err(|e| LlmError::validation("prompt", e.to_string()))?;
        prompt.messages = messages;
        Ok(prompt)
    }
}
