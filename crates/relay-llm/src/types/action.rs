use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::canonical::{IntoCanonical, expect_object};
use crate::error::LlmError;

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Provider-assigned call identifier
    pub id: String,
    /// Name of the invoked tool
    pub name: String,
    /// Structured arguments
    ///
    /// Serialized as `null` when no argument fragment ever arrived, which is
    /// distinct from an empty mapping (tool called with no arguments).
    #[serde(default)]
    pub params: Option<Map<String, Value>>,
    /// Argument text not parsed into a mapping (malformed, or still streaming)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_params: Option<String>,
    /// Execution status, once the caller ran the action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ActionStatus>,
    /// Execution result, once the caller ran the action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Outcome of executing an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Succeeded,
    Failed,
}

/// Arguments of a tool call after parsing its accumulated text
#[derive(Debug, Clone, PartialEq)]
pub enum ToolArguments {
    /// Parsed into a mapping; empty when the provider sent an empty string
    Parsed(Map<String, Value>),
    /// No argument text was ever received
    Missing,
    /// Text arrived but is not a JSON object
    Malformed(String),
}

impl ToolArguments {
    /// Parse accumulated argument text
    pub fn parse(buffer: Option<&str>) -> Self {
        let Some(text) = buffer else {
            return Self::Missing;
        };

        if text.trim().is_empty() {
            return Self::Parsed(Map::new());
        }

        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Self::Parsed(map),
            _ => Self::Malformed(text.to_owned()),
        }
    }
}

impl Action {
    /// Create an action with parsed arguments
    pub fn new(id: impl Into<String>, name: impl Into<String>, params: Map<String, Value>) -> Self {
        Self::with_arguments(id, name, ToolArguments::Parsed(params))
    }

    /// Create an action from a parsed argument outcome
    pub fn with_arguments(id: impl Into<String>, name: impl Into<String>, arguments: ToolArguments) -> Self {
        let (params, raw_params) = match arguments {
            ToolArguments::Parsed(map) => (Some(map), None),
            ToolArguments::Missing => (None, None),
            ToolArguments::Malformed(text) => (None, Some(text)),
        };

        Self {
            id: id.into(),
            name: name.into(),
            params,
            raw_params,
            status: None,
            result: None,
        }
    }

    /// Recover the argument outcome this action was built from
    pub fn arguments(&self) -> ToolArguments {
        match (&self.params, &self.raw_params) {
            (Some(map), _) => ToolArguments::Parsed(map.clone()),
            (None, Some(raw)) => ToolArguments::Malformed(raw.clone()),
            (None, None) => ToolArguments::Missing,
        }
    }

    /// Arguments encoded as a JSON string for wire formats that expect text
    pub fn arguments_json(&self) -> String {
        match (&self.params, &self.raw_params) {
            (Some(map), _) => Value::Object(map.clone()).to_string(),
            (None, Some(raw)) => raw.clone(),
            (None, None) => "{}".to_owned(),
        }
    }

    /// Arguments as a JSON value for wire formats that expect an object
    pub fn arguments_value(&self) -> Value {
        Value::Object(self.params.clone().unwrap_or_default())
    }
}

impl IntoCanonical<Action> for Action {
    fn into_canonical(self) -> Result<Action, LlmError> {
        Ok(self)
    }
}

impl IntoCanonical<Action> for Value {
    fn into_canonical(self) -> Result<Action, LlmError> {
        let object = expect_object(&self, "action")?;

        for field in ["id", "name"] {
            match object.get(field) {
                Some(Value::String(_)) => {}
                Some(_) => return Err(LlmError::validation(field, "expected a string")),
                None => return Err(LlmError::validation(field, "missing")),
            }
        }

        if let Some(params) = object.get("params")
            && !(params.is_object() || params.is_null())
        {
            return Err(LlmError::validation("params", "expected a mapping or null"));
        }

        serde_json::from_value(self).map_err(|e| LlmError::validation("action", e.to_string()))
    }
}

/// Declaration of a tool the model may call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    /// Tool name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    /// Ask the provider to enforce the schema strictly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

impl ActionDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            parameters: Some(parameters),
            strict: None,
        }
    }

    /// Parameters schema, defaulting to an empty object schema
    pub fn parameters_or_empty(&self) -> Value {
        self.parameters
            .clone()
            .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}}))
    }
}
