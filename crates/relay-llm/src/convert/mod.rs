//! Conversion between the canonical model and wire formats
//!
//! Each submodule builds its protocol's request body from a [`Prompt`],
//! parses a complete wire response into a [`Response`], and decodes
//! streaming events into [`StreamChunk`]s.
//!
//! [`Prompt`]: crate::types::Prompt
//! [`Response`]: crate::types::Response
//! [`StreamChunk`]: crate::types::StreamChunk

pub mod anthropic;
pub mod chat;
pub mod responses;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::LlmError;
use crate::types::{FileReference, ToolArguments};

/// Error codes providers use to signal throttling or overload
const RATE_LIMIT_CODES: &[&str] = &["rate_limit_exceeded", "rate_limit_error", "overloaded_error", "rate_limited"];

/// Decode a wire payload, reporting shape mismatches as provider errors
pub(crate) fn decode<T: DeserializeOwned>(raw: &Value, what: &str) -> Result<T, LlmError> {
    serde_json::from_value(raw.clone()).map_err(|e| LlmError::provider(format!("malformed {what}: {e}")))
}

/// Recognise an error envelope embedded in a successful HTTP body
///
/// Handles `{"error": {...}}` as sent by chat-style servers and
/// `{"type": "error", "error": {...}}` as sent by Anthropic.
pub(crate) fn embedded_error(raw: &Value) -> Option<LlmError> {
    let error = raw.get("error")?;
    if error.is_null() {
        return None;
    }

    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map_or_else(|| error.to_string(), ToOwned::to_owned);
    let code = error
        .get("code")
        .and_then(Value::as_str)
        .or_else(|| error.get("type").and_then(Value::as_str));

    Some(error_from_code(code, message))
}

/// Map a provider error code to the matching error variant
pub(crate) fn error_from_code(code: Option<&str>, message: String) -> LlmError {
    match code {
        Some(code) if RATE_LIMIT_CODES.contains(&code) => LlmError::RateLimited { retry_after: None },
        _ => LlmError::provider(message),
    }
}

/// Tool arguments from a wire field that may be text, an object, or absent
pub(crate) fn arguments_from_wire(value: Option<&Value>) -> ToolArguments {
    match value {
        None | Some(Value::Null) => ToolArguments::Missing,
        Some(Value::String(text)) => ToolArguments::parse(Some(text)),
        Some(Value::Object(map)) => ToolArguments::Parsed(map.clone()),
        Some(other) => ToolArguments::Malformed(other.to_string()),
    }
}

/// Split a `data:` URI into media type and base64 payload
pub(crate) fn split_data_uri(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (meta, data) = rest.split_once(',')?;
    Some((meta.strip_suffix(";base64").unwrap_or(meta), data))
}

/// Inline file payload as a `data:` URI
pub(crate) fn file_data_uri(file: &FileReference) -> Option<String> {
    let data = file.data.as_deref()?;
    if data.starts_with("data:") {
        return Some(data.to_owned());
    }
    let media_type = file.media_type.as_deref().unwrap_or("application/octet-stream");
    Some(format!("data:{media_type};base64,{data}"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn embedded_error_classifies_rate_limits() {
        let err = embedded_error(&json!({"type": "error", "error": {"type": "overloaded_error", "message": "busy"}}));
        assert!(matches!(err, Some(LlmError::RateLimited { .. })));

        let err = embedded_error(&json!({"error": {"message": "bad model", "code": "model_not_found"}}));
        assert!(matches!(err, Some(LlmError::ProviderApi { ref message, .. }) if message == "bad model"));

        assert!(embedded_error(&json!({"choices": []})).is_none());
        assert!(embedded_error(&json!({"error": null})).is_none());
    }

    #[test]
    fn wire_arguments_keep_all_outcomes() {
        assert_eq!(arguments_from_wire(None), ToolArguments::Missing);
        assert_eq!(arguments_from_wire(Some(&json!(""))), ToolArguments::Parsed(serde_json::Map::new()));
        assert_eq!(
            arguments_from_wire(Some(&json!("{oops"))),
            ToolArguments::Malformed("{oops".to_owned())
        );
        let ToolArguments::Parsed(map) = arguments_from_wire(Some(&json!({"a": 1}))) else {
            panic!("expected parsed arguments");
        };
        assert_eq!(map["a"], 1);
    }

    #[test]
    fn data_uri_round_trip() {
        assert_eq!(split_data_uri("data:image/png;base64,AAAA"), Some(("image/png", "AAAA")));
        assert_eq!(split_data_uri("https://example.com/a.png"), None);

        let file = FileReference {
            data: Some("JVBER".to_owned()),
            media_type: Some("application/pdf".to_owned()),
            ..FileReference::default()
        };
        assert_eq!(file_data_uri(&file).as_deref(), Some("data:application/pdf;base64,JVBER"));
    }
}
