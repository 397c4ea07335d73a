use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::action::Action;
use super::canonical::{IntoCanonical, expect_object};
use crate::error::LlmError;

/// Role of a message participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction
    System,
    /// User message
    User,
    /// Assistant response
    Assistant,
    /// Tool/function result
    Tool,
}

impl Role {
    /// Wire name of the role
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "tool" => Ok(Self::Tool),
            other => Err(LlmError::validation(
                "role",
                format!("expected one of system, user, assistant, tool; got `{other}`"),
            )),
        }
    }
}

/// Message content, either plain text or structured parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// Plain text content
    Text(String),
    /// Ordered content parts (text, images, files)
    Parts(Vec<ContentPart>),
}

impl Default for Content {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<ContentPart>> for Content {
    fn from(parts: Vec<ContentPart>) -> Self {
        Self::Parts(parts)
    }
}

impl Content {
    /// Extract text content, joining text parts and skipping references
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Image { .. } | ContentPart::File(_) => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    /// Whether the content carries no text and no parts
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Parts(parts) => parts.is_empty(),
        }
    }

    /// Whether any part references an image
    pub fn has_images(&self) -> bool {
        matches!(self, Self::Parts(parts) if parts.iter().any(|p| matches!(p, ContentPart::Image { .. })))
    }

    /// Whether any part references a file
    pub fn has_files(&self) -> bool {
        matches!(self, Self::Parts(parts) if parts.iter().any(|p| matches!(p, ContentPart::File(_))))
    }

    /// Whether the content is split into more than one part
    pub const fn is_multi_part(&self) -> bool {
        matches!(self, Self::Parts(parts) if parts.len() > 1)
    }
}

/// Individual part within a multipart message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text content block
    Text {
        /// The text string
        text: String,
    },
    /// Image reference
    Image {
        /// URL or base64 data URI for the image
        url: String,
        /// Detail level hint (e.g. "auto", "low", "high")
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// File reference (document, PDF, ...)
    File(FileReference),
}

/// Where a referenced file lives
///
/// Exactly one of `file_id`, `url` or `data` is expected; adapters pick
/// whichever their protocol accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    /// Provider-side uploaded file id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    /// Publicly reachable URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Inline base64 payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Original file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// MIME type (e.g. "application/pdf")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

/// Message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message author
    pub role: Role,
    /// Message content
    #[serde(default)]
    pub content: Content,
    /// Id of the action this tool-result message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    /// Name of the action this tool-result message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_name: Option<String>,
    /// Actions the assistant requested, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requested_actions: Vec<Action>,
    /// Opaque caller metadata
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Message {
    /// Create a message with the given role and content
    pub fn new(role: Role, content: impl Into<Content>) -> Self {
        Self {
            role,
            content: content.into(),
            action_id: None,
            action_name: None,
            requested_actions: Vec::new(),
            metadata: Map::new(),
        }
    }

    pub fn system(content: impl Into<Content>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<Content>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<Content>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Tool result answering the action with `action_id`
    pub fn tool_result(action_id: impl Into<String>, action_name: impl Into<String>, content: impl Into<Content>) -> Self {
        Self {
            action_id: Some(action_id.into()),
            action_name: Some(action_name.into()),
            ..Self::new(Role::Tool, content)
        }
    }

    /// Attach requested actions to an assistant message
    #[must_use]
    pub fn with_actions(mut self, actions: Vec<Action>) -> Self {
        self.requested_actions = actions;
        self
    }

    /// Whether the assistant asked for tool use
    pub fn requests_actions(&self) -> bool {
        !self.requested_actions.is_empty()
    }
}

impl IntoCanonical<Message> for Message {
    fn into_canonical(self) -> Result<Message, LlmError> {
        Ok(self)
    }
}

impl IntoCanonical<Message> for Value {
    fn into_canonical(self) -> Result<Message, LlmError> {
        let object = expect_object(&self, "message")?;

        match object.get("role") {
            Some(Value::String(role)) => {
                role.parse::<Role>()?;
            }
            Some(other) => {
                return Err(LlmError::validation("role", format!("expected a string, got {other}")));
            }
            None => return Err(LlmError::validation("role", "missing")),
        }

        match object.get("content") {
            None | Some(Value::Null | Value::String(_) | Value::Array(_)) => {}
            Some(other) => {
                return Err(LlmError::validation(
                    "content",
                    format!("expected text or a list of parts, got {other}"),
                ));
            }
        }

        if let Some(actions) = object.get("requested_actions")
            && !actions.is_array()
        {
            return Err(LlmError::validation("requested_actions", "expected a list"));
        }

        let mut value = self;
        if let Some(object) = value.as_object_mut()
            && object.get("content").is_some_and(Value::is_null)
        {
            object.remove("content");
        }

        serde_json::from_value(value).map_err(|e| LlmError::validation("message", e.to_string()))
    }
}

impl IntoCanonical<Message> for &Value {
    fn into_canonical(self) -> Result<Message, LlmError> {
        self.clone().into_canonical()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn all_four_roles_construct() {
        for role in ["system", "user", "assistant", "tool"] {
            let message: Message = json!({"role": role, "content": "hi"}).into_canonical().unwrap();
            assert_eq!(message.role.as_str(), role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        for role in ["developer", "", "Assistant", "function"] {
            let err = IntoCanonical::<Message>::into_canonical(json!({"role": role, "content": "hi"})).unwrap_err();
            assert!(matches!(err, LlmError::Validation { ref field, .. } if field == "role"), "{err}");
        }
    }

    #[test]
    fn non_string_role_is_rejected() {
        let err = IntoCanonical::<Message>::into_canonical(json!({"role": 3})).unwrap_err();
        assert!(matches!(err, LlmError::Validation { ref field, .. } if field == "role"));
    }

    #[test]
    fn non_object_is_rejected() {
        let err = IntoCanonical::<Message>::into_canonical(json!(["user", "hi"])).unwrap_err();
        assert!(matches!(err, LlmError::Validation { ref field, .. } if field == "message"));
    }

    #[test]
    fn bad_content_shape_names_content() {
        let err = IntoCanonical::<Message>::into_canonical(json!({"role": "user", "content": 42})).unwrap_err();
        assert!(matches!(err, LlmError::Validation { ref field, .. } if field == "content"));
    }

    #[test]
    fn rewrapping_is_a_no_op() {
        let mut message = Message::user("hello");
        message.metadata.insert("trace".to_owned(), json!("abc"));

        let wrapped = message.clone().into_canonical().unwrap();
        assert_eq!(wrapped, message);

        let again: Message = serde_json::to_value(&wrapped).unwrap().into_canonical().unwrap();
        assert_eq!(again, message);
    }

    #[test]
    fn serialization_omits_absent_fields() {
        let value = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(value, json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn parts_content_deserializes() {
        let message: Message = json!({
            "role": "user",
            "content": [
                {"type": "text", "text": "look"},
                {"type": "image", "url": "https://example.com/cat.png"},
                {"type": "file", "file_id": "file-1", "filename": "a.pdf"}
            ]
        })
        .into_canonical()
        .unwrap();

        assert!(message.content.has_images());
        assert!(message.content.has_files());
        assert!(message.content.is_multi_part());
        assert_eq!(message.content.as_text(), "look");
    }

    #[test]
    fn null_content_defaults_to_empty_text() {
        let message: Message = json!({"role": "assistant", "content": null}).into_canonical().unwrap();
        assert!(message.content.is_empty());
    }
}
