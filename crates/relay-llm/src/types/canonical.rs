use serde_json::{Map, Value};

use crate::error::LlmError;

/// Conversion into a canonical model value
///
/// Implemented both for structured mappings (`serde_json::Value`) and for the
/// canonical types themselves. Converting an already-canonical value hands it
/// back untouched, so wrapping twice never re-applies defaults.
pub trait IntoCanonical<T> {
    /// Validate and convert into `T`
    fn into_canonical(self) -> Result<T, LlmError>;
}

/// Borrow `value` as an object or fail naming `field`
pub(crate) fn expect_object<'a>(value: &'a Value, field: &str) -> Result<&'a Map<String, Value>, LlmError> {
    value
        .as_object()
        .ok_or_else(|| LlmError::validation(field, format!("expected a mapping, got {}", type_name(value))))
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
