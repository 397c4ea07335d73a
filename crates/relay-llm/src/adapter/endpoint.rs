//! Directly reachable provider APIs (`OpenAI`, Ollama, `OpenRouter`, Anthropic)

use http::header::HeaderName;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use url::Url;

use super::{Operation, WireProtocol, WireRequest, join_url, to_body};
use crate::convert::{anthropic, chat, responses};
use crate::error::LlmError;
use crate::types::Prompt;

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Fields the token counting endpoint accepts
const COUNT_TOKENS_FIELDS: &[&str] = &["model", "messages", "system", "tools", "tool_choice"];

/// Provider API reachable without a hosting layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Backend {
    OpenAi,
    Ollama,
    OpenRouter,
    Anthropic,
}

impl Backend {
    /// Name used in configuration and error messages
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
            Self::OpenRouter => "openrouter",
            Self::Anthropic => "anthropic",
        }
    }

    /// Public API base URL
    pub const fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Ollama => "http://localhost:11434/v1",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
            Self::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    /// Whether the public API refuses unauthenticated requests
    pub const fn requires_key(self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

/// Whether the provider is the canonical `OpenAI` API (vs a compatible third-party)
fn is_canonical_openai(base_url: &Url) -> bool {
    base_url.host_str().is_some_and(|h| h == "api.openai.com")
}

/// Base URL and credential of a directly reachable API
#[derive(Debug, Clone)]
pub struct Endpoint {
    backend: Backend,
    base_url: Url,
    api_key: Option<SecretString>,
}

impl Endpoint {
    /// Endpoint for `backend`, at `base_url` or the public API
    ///
    /// A key is mandatory for the public `OpenAI`, `OpenRouter` and Anthropic
    /// APIs; self-hosted compatible servers reached through `base_url` may
    /// run without one.
    pub fn new(backend: Backend, base_url: Option<Url>, api_key: Option<SecretString>) -> Result<Self, LlmError> {
        let custom = base_url.is_some();
        let base_url = match base_url {
            Some(url) => url,
            None => Url::parse(backend.default_base_url())
                .map_err(|e| LlmError::Internal(anyhow::anyhow!("invalid default URL for {}: {e}", backend.as_str())))?,
        };

        if backend.requires_key() && !custom && api_key.is_none() {
            return Err(LlmError::Configuration(format!(
                "{} provider requires an api_key",
                backend.as_str()
            )));
        }

        Ok(Self {
            backend,
            base_url,
            api_key,
        })
    }

    pub const fn backend(&self) -> Backend {
        self.backend
    }

    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Request for an OpenAI-family backend
    pub(crate) fn openai_request(
        &self,
        operation: Operation,
        protocol: WireProtocol,
        prompt: &Prompt,
    ) -> Result<WireRequest, LlmError> {
        let request = match (operation, protocol) {
            (Operation::ListModels, _) => WireRequest::get(join_url(&self.base_url, "models")?),
            (_, WireProtocol::Responses) => WireRequest::post(
                join_url(&self.base_url, "responses")?,
                to_body(&responses::build_request(prompt)?)?,
            ),
            _ => {
                // Only send stream_options to canonical OpenAI; many compatible
                // servers reject the unknown parameter
                let include_usage = is_canonical_openai(&self.base_url);
                WireRequest::post(
                    join_url(&self.base_url, "chat/completions")?,
                    to_body(&chat::build_request(prompt, include_usage)?)?,
                )
            }
        };

        request.with_bearer(self.api_key.as_ref())
    }

    /// Request for the Anthropic messages API
    pub(crate) fn anthropic_request(&self, operation: Operation, prompt: &Prompt) -> Result<WireRequest, LlmError> {
        let request = match operation {
            Operation::Chat | Operation::StreamChat => WireRequest::post(
                join_url(&self.base_url, "messages")?,
                to_body(&anthropic::build_request(prompt)?)?,
            ),
            Operation::CountTokens => {
                let mut body = to_body(&anthropic::build_request(prompt)?)?;
                if let Value::Object(fields) = &mut body {
                    fields.retain(|key, _| COUNT_TOKENS_FIELDS.contains(&key.as_str()));
                }
                WireRequest::post(join_url(&self.base_url, "messages/count_tokens")?, body)
            }
            Operation::Batch => {
                let mut params = to_body(&anthropic::build_request(prompt)?)?;
                if let Value::Object(fields) = &mut params {
                    fields.remove("stream");
                }
                let body = json!({
                    "requests": [{
                        "custom_id": format!("relay-{}", uuid::Uuid::new_v4().simple()),
                        "params": params,
                    }]
                });
                WireRequest::post(join_url(&self.base_url, "messages/batches")?, body)
            }
            Operation::ListModels => WireRequest::get(join_url(&self.base_url, "models")?),
        };

        let request = request.with_header(HeaderName::from_static("anthropic-version"), ANTHROPIC_VERSION);
        match &self.api_key {
            Some(key) => request.with_secret(HeaderName::from_static("x-api-key"), key.expose_secret()),
            None => Ok(request),
        }
    }
}

#[cfg(test)]
mod tests {
    use http::header::AUTHORIZATION;

    use super::*;
    use crate::types::{ActionDefinition, Message};

    fn anthropic() -> Endpoint {
        Endpoint::new(Backend::Anthropic, None, Some(SecretString::from("sk-ant".to_owned()))).unwrap()
    }

    fn prompt() -> Prompt {
        Prompt::new("claude-sonnet-4")
            .with_message(Message::user("hi"))
            .with_action(ActionDefinition::new("lookup", "Find a record", json!({"type": "object"})))
    }

    #[test]
    fn public_apis_require_a_key() {
        let err = Endpoint::new(Backend::OpenAi, None, None).unwrap_err();
        assert!(matches!(err, LlmError::Configuration(ref m) if m.contains("openai")));

        assert!(Endpoint::new(Backend::Ollama, None, None).is_ok());

        let local = Url::parse("http://localhost:8000/v1").unwrap();
        assert!(Endpoint::new(Backend::OpenAi, Some(local), None).is_ok());
    }

    #[test]
    fn anthropic_messages_request_uses_api_key_header() {
        let request = anthropic().anthropic_request(Operation::Chat, &prompt()).unwrap();

        assert_eq!(request.url.as_str(), "https://api.anthropic.com/v1/messages");
        assert_eq!(request.headers["x-api-key"], "sk-ant");
        assert_eq!(request.headers["anthropic-version"], ANTHROPIC_VERSION);
        assert!(request.headers.get(AUTHORIZATION).is_none());

        let body = request.body.unwrap();
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
        assert_eq!(body["max_tokens"], 4096);
    }

    #[test]
    fn count_tokens_body_drops_generation_fields() {
        let request = anthropic().anthropic_request(Operation::CountTokens, &prompt()).unwrap();

        assert_eq!(request.url.path(), "/v1/messages/count_tokens");
        let body = request.body.unwrap();
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body["model"], "claude-sonnet-4");
        assert!(body.get("tools").is_some());
    }

    #[test]
    fn batch_wraps_params() {
        let request = anthropic()
            .anthropic_request(Operation::Batch, &prompt().streaming(None))
            .unwrap();

        let body = request.body.unwrap();
        let entry = &body["requests"][0];
        assert!(entry["custom_id"].as_str().unwrap().starts_with("relay-"));
        assert_eq!(entry["params"]["model"], "claude-sonnet-4");
        assert!(entry["params"].get("stream").is_none());
    }

    #[test]
    fn model_listing_is_a_get() {
        let request = anthropic().anthropic_request(Operation::ListModels, &prompt()).unwrap();
        assert_eq!(request.method, http::Method::GET);
        assert!(request.body.is_none());
    }

    #[test]
    fn compatible_servers_get_no_stream_options() {
        let base = Url::parse("https://router.example.com/api/v1/").unwrap();
        let endpoint = Endpoint::new(Backend::OpenRouter, Some(base), Some(SecretString::from("k".to_owned()))).unwrap();
        let prompt = Prompt::new("meta/llama").with_message(Message::user("hi")).streaming(None);

        let request = endpoint.openai_request(Operation::StreamChat, WireProtocol::Chat, &prompt).unwrap();
        assert_eq!(request.url.as_str(), "https://router.example.com/api/v1/chat/completions");
        assert_eq!(request.headers[AUTHORIZATION], "Bearer k");
        assert!(request.body.unwrap().get("stream_options").is_none());
    }

    #[test]
    fn responses_protocol_targets_responses_path() {
        let endpoint = Endpoint::new(Backend::OpenAi, None, Some(SecretString::from("k".to_owned()))).unwrap();
        let prompt = Prompt::new("gpt-4o").with_message(Message::user("hi"));

        let request = endpoint
            .openai_request(Operation::Chat, WireProtocol::Responses, &prompt)
            .unwrap();
        assert_eq!(request.url.as_str(), "https://api.openai.com/v1/responses");
        assert_eq!(request.body.unwrap()["input"][0]["role"], "user");
    }
}
