use thiserror::Error;

/// Errors produced by the protocol layer
#[derive(Debug, Error)]
pub enum LlmError {
    /// Canonical model value is malformed (bad role, missing field, wrong shape)
    #[error("invalid {field}: {message}")]
    Validation {
        /// Offending field name
        field: String,
        /// What was wrong with it
        message: String,
    },

    /// Required credentials or provider identifiers are missing
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The target protocol cannot express the requested operation
    #[error("{provider} does not support {feature}")]
    UnsupportedFeature {
        /// Provider or protocol name
        provider: String,
        /// Operation or feature that was requested
        feature: String,
    },

    /// Provider returned a non-success or malformed response
    #[error("provider error{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    ProviderApi {
        /// HTTP status, when the failure came with one
        status: Option<u16>,
        /// Provider-supplied or locally derived message
        message: String,
    },

    /// Provider signalled throttling
    #[error("rate limit exceeded")]
    RateLimited {
        /// Seconds the provider asked us to wait, when it said
        retry_after: Option<u64>,
    },

    /// Transport failure while reading a streaming response
    #[error("streaming error: {0}")]
    Streaming(String),

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Coarse classification of an [`LlmError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Configuration,
    UnsupportedFeature,
    ProviderApi,
    RateLimited,
    Streaming,
    Internal,
}

impl LlmError {
    /// Build a validation error for `field`
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Build an unsupported-feature error
    pub fn unsupported(provider: impl Into<String>, feature: impl Into<String>) -> Self {
        Self::UnsupportedFeature {
            provider: provider.into(),
            feature: feature.into(),
        }
    }

    /// Build a provider error without an HTTP status
    pub fn provider(message: impl Into<String>) -> Self {
        Self::ProviderApi {
            status: None,
            message: message.into(),
        }
    }

    /// Classification tag for this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::UnsupportedFeature { .. } => ErrorKind::UnsupportedFeature,
            Self::ProviderApi { .. } => ErrorKind::ProviderApi,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Streaming(_) => ErrorKind::Streaming,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying the same request later may succeed
    ///
    /// Caller mistakes (validation, configuration, unsupported operations)
    /// never are.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderApi { .. } | Self::RateLimited { .. } | Self::Streaming(_) | Self::Internal(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_message_includes_status() {
        let err = LlmError::ProviderApi {
            status: Some(502),
            message: "bad gateway".to_owned(),
        };
        assert_eq!(err.to_string(), "provider error (502): bad gateway");
        assert_eq!(LlmError::provider("boom").to_string(), "provider error: boom");
    }

    #[test]
    fn caller_errors_are_not_retryable() {
        assert!(!LlmError::validation("role", "unknown").is_retryable());
        assert!(!LlmError::Configuration("missing key".to_owned()).is_retryable());
        assert!(!LlmError::unsupported("gateway", "batch").is_retryable());
        assert!(LlmError::RateLimited { retry_after: Some(3) }.is_retryable());
    }

    #[test]
    fn kind_matches_variant() {
        assert_eq!(LlmError::validation("role", "x").kind(), ErrorKind::Validation);
        assert_eq!(LlmError::provider("x").kind(), ErrorKind::ProviderApi);
        assert_eq!(LlmError::Streaming("x".to_owned()).kind(), ErrorKind::Streaming);
    }
}
