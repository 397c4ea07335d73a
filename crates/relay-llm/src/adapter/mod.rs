//! Provider adapters
//!
//! An [`Adapter`] turns a canonical [`Prompt`] into a [`WireRequest`] for
//! one provider and parses that provider's answer back. Body shapes come
//! from one of three [`WireProtocol`] codecs; the adapter decides hosting
//! details (URL, headers, body rewrites) on top.

pub mod auto;
pub mod azure;
pub mod endpoint;
pub mod gateway;

use std::borrow::Cow;

use http::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use http::Method;
use relay_config::{LlmProviderConfig, LlmProviderType};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use url::Url;

pub use auto::{AutoAdapter, detect_backend};
pub use azure::AzureAdapter;
pub use endpoint::{Backend, Endpoint};
pub use gateway::{GatewayAdapter, GatewayRules};

use crate::convert::anthropic::AnthropicStreamDecoder;
use crate::convert::chat::ChatStreamDecoder;
use crate::convert::responses::ResponsesStreamDecoder;
use crate::convert::{anthropic, chat, responses};
use crate::error::LlmError;
use crate::types::{Prompt, Response, SseEvent, StreamChunk};

/// Body codec family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireProtocol {
    /// `OpenAI` chat completions
    Chat,
    /// `OpenAI` responses
    Responses,
    /// Anthropic messages
    Anthropic,
}

impl WireProtocol {
    /// Protocol name used in error messages
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat completions",
            Self::Responses => "responses",
            Self::Anthropic => "anthropic messages",
        }
    }
}

/// Whether the prompt needs the responses protocol rather than chat completions
///
/// Structured-output schemas and multi-part, image or file content all do.
pub fn requires_responses_api(prompt: &Prompt) -> bool {
    prompt.options.response_schema.is_some() || prompt.has_rich_content()
}

/// Codec for an OpenAI-family provider that can speak the responses protocol
pub fn select_protocol(prompt: &Prompt) -> WireProtocol {
    if requires_responses_api(prompt) {
        WireProtocol::Responses
    } else {
        WireProtocol::Chat
    }
}

/// Provider operation beyond a plain generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Non-streaming generation
    Chat,
    /// Streaming generation
    StreamChat,
    /// Input token counting
    CountTokens,
    /// Batch submission
    Batch,
    /// Model listing
    ListModels,
}

impl Operation {
    /// Human-readable operation name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::StreamChat => "streaming chat",
            Self::CountTokens => "token counting",
            Self::Batch => "batch submission",
            Self::ListModels => "model listing",
        }
    }
}

/// Fully resolved HTTP request, ready for a transport
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    /// JSON body; absent for GET requests
    pub body: Option<Value>,
}

impl WireRequest {
    /// POST `body` as JSON to `url`
    pub fn post(url: Url, body: Value) -> Self {
        Self {
            method: Method::POST,
            url,
            headers: HeaderMap::new(),
            body: Some(body),
        }
    }

    /// GET `url`
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Add a header whose value is a credential
    pub(crate) fn with_secret(mut self, name: HeaderName, secret: &str) -> Result<Self, LlmError> {
        let mut value = HeaderValue::from_str(secret)
            .map_err(|_| LlmError::Configuration(format!("credential for `{name}` is not a valid header value")))?;
        value.set_sensitive(true);
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Add `Authorization: Bearer ...` when a token is configured
    pub(crate) fn with_bearer(self, token: Option<&SecretString>) -> Result<Self, LlmError> {
        match token {
            Some(token) => self.with_secret(AUTHORIZATION, &format!("Bearer {}", token.expose_secret())),
            None => Ok(self),
        }
    }

    /// Add a plain header
    pub(crate) fn with_header(mut self, name: HeaderName, value: &'static str) -> Self {
        self.headers.insert(name, HeaderValue::from_static(value));
        self
    }
}

/// Serialize a wire struct into a JSON body
pub(crate) fn to_body(body: &impl Serialize) -> Result<Value, LlmError> {
    serde_json::to_value(body).map_err(|e| LlmError::Internal(anyhow::anyhow!("failed to serialize request body: {e}")))
}

/// Append `path` to `base`, keeping any path `base` already has
pub(crate) fn join_url(base: &Url, path: &str) -> Result<Url, LlmError> {
    let base = base.as_str().trim_end_matches('/');
    Url::parse(&format!("{base}/{}", path.trim_start_matches('/')))
        .map_err(|e| LlmError::Configuration(format!("invalid provider URL `{base}/{path}`: {e}")))
}

/// Incremental decoder for one streaming generation
#[derive(Debug)]
pub enum StreamDecoder {
    Chat(ChatStreamDecoder),
    Responses(ResponsesStreamDecoder),
    Anthropic(AnthropicStreamDecoder),
}

impl StreamDecoder {
    /// Fresh decoder for `protocol`
    pub fn new(protocol: WireProtocol) -> Self {
        match protocol {
            WireProtocol::Chat => Self::Chat(ChatStreamDecoder::new()),
            WireProtocol::Responses => Self::Responses(ResponsesStreamDecoder::new()),
            WireProtocol::Anthropic => Self::Anthropic(AnthropicStreamDecoder::new()),
        }
    }

    /// Decode one SSE event into canonical chunks
    pub fn decode(&mut self, event: &SseEvent) -> Result<Vec<StreamChunk>, LlmError> {
        match self {
            Self::Chat(decoder) => decoder.decode(event),
            Self::Responses(decoder) => decoder.decode(event),
            Self::Anthropic(decoder) => decoder.decode(event),
        }
    }
}

/// A configured provider
#[derive(Debug, Clone)]
pub enum Adapter {
    /// `OpenAI`, chat completions or responses depending on the prompt
    OpenAi(Endpoint),
    /// Ollama's OpenAI-compatible endpoint
    Ollama(Endpoint),
    /// `OpenRouter`
    OpenRouter(Endpoint),
    /// Anthropic messages API
    Anthropic(Endpoint),
    /// Anthropic models behind a cloud gateway
    Gateway(GatewayAdapter),
    /// Azure-hosted `OpenAI` deployment
    Azure(AzureAdapter),
    /// Backend chosen per prompt from the model identifier
    Auto(AutoAdapter),
}

impl Adapter {
    /// Build an adapter from provider configuration
    ///
    /// Missing identifiers or credentials are reported here, before any
    /// request is attempted.
    pub fn from_config(config: &LlmProviderConfig) -> Result<Self, LlmError> {
        let base_url = config.base_url.clone();
        let api_key = config.api_key.clone();

        let adapter = match config.provider_type {
            LlmProviderType::Openai => Self::OpenAi(Endpoint::new(Backend::OpenAi, base_url, api_key)?),
            LlmProviderType::Ollama => Self::Ollama(Endpoint::new(Backend::Ollama, base_url, api_key)?),
            LlmProviderType::Openrouter => Self::OpenRouter(Endpoint::new(Backend::OpenRouter, base_url, api_key)?),
            LlmProviderType::Anthropic => Self::Anthropic(Endpoint::new(Backend::Anthropic, base_url, api_key)?),
            LlmProviderType::Gateway => Self::Gateway(GatewayAdapter::from_config(config)?),
            LlmProviderType::Azure => Self::Azure(AzureAdapter::from_config(config)?),
            LlmProviderType::Auto => Self::Auto(AutoAdapter::from_config(config)?),
        };

        tracing::debug!(provider = adapter.name(), "adapter configured");
        Ok(adapter)
    }

    /// Provider family name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OpenAi(_) => "openai",
            Self::Ollama(_) => "ollama",
            Self::OpenRouter(_) => "openrouter",
            Self::Anthropic(_) => "anthropic",
            Self::Gateway(_) => "gateway",
            Self::Azure(_) => "azure",
            Self::Auto(_) => "auto",
        }
    }

    /// Concrete adapter serving `prompt`; only differs from `self` for [`Adapter::Auto`]
    pub fn resolve(&self, prompt: &Prompt) -> Result<Cow<'_, Self>, LlmError> {
        match self {
            Self::Auto(auto) => auto.resolve(prompt.model()).map(Cow::Owned),
            other => Ok(Cow::Borrowed(other)),
        }
    }

    /// Codec used for `prompt`
    pub fn protocol(&self, prompt: &Prompt) -> Result<WireProtocol, LlmError> {
        Ok(match &*self.resolve(prompt)? {
            Self::OpenAi(_) | Self::Azure(_) => select_protocol(prompt),
            Self::Ollama(_) | Self::OpenRouter(_) => WireProtocol::Chat,
            Self::Anthropic(_) | Self::Gateway(_) => WireProtocol::Anthropic,
            Self::Auto(_) => return Err(LlmError::Internal(anyhow::anyhow!("auto adapter resolved to itself"))),
        })
    }

    /// Whether this provider can perform `operation` at all
    ///
    /// [`Adapter::Auto`] answers for its resolved backend once a prompt is known.
    pub const fn supports(&self, operation: Operation) -> bool {
        match self {
            Self::Anthropic(_) | Self::Auto(_) => true,
            Self::Gateway(_) => matches!(operation, Operation::Chat | Operation::StreamChat),
            Self::OpenAi(_) | Self::Ollama(_) | Self::OpenRouter(_) | Self::Azure(_) => {
                !matches!(operation, Operation::CountTokens | Operation::Batch)
            }
        }
    }

    pub const fn supports_streaming(&self) -> bool {
        self.supports(Operation::StreamChat)
    }

    /// Generation request for `prompt`, streaming or not per its options
    pub fn build_request(&self, prompt: &Prompt) -> Result<WireRequest, LlmError> {
        let operation = if prompt.options.stream {
            Operation::StreamChat
        } else {
            Operation::Chat
        };
        self.build_operation_request(operation, prompt)
    }

    /// Request performing `operation` for `prompt`
    pub fn build_operation_request(&self, operation: Operation, prompt: &Prompt) -> Result<WireRequest, LlmError> {
        let resolved = self.resolve(prompt)?;
        if !resolved.supports(operation) {
            return Err(LlmError::unsupported(resolved.name(), operation.as_str()));
        }

        let streaming = operation == Operation::StreamChat;
        let prompt = if matches!(operation, Operation::Chat | Operation::StreamChat) && prompt.options.stream != streaming {
            let mut adjusted = prompt.clone();
            adjusted.options.stream = streaming;
            Cow::Owned(adjusted)
        } else {
            Cow::Borrowed(prompt)
        };
        let protocol = resolved.protocol(&prompt)?;

        let request = match &*resolved {
            Self::OpenAi(endpoint) | Self::Ollama(endpoint) | Self::OpenRouter(endpoint) => {
                endpoint.openai_request(operation, protocol, &prompt)
            }
            Self::Anthropic(endpoint) => endpoint.anthropic_request(operation, &prompt),
            Self::Gateway(gateway) => gateway.build_request(operation, &prompt),
            Self::Azure(azure) => azure.build_request(operation, protocol, &prompt),
            Self::Auto(_) => Err(LlmError::Internal(anyhow::anyhow!("auto adapter resolved to itself"))),
        }?;

        tracing::debug!(
            provider = resolved.name(),
            operation = operation.as_str(),
            protocol = protocol.as_str(),
            url = %request.url,
            "built wire request"
        );
        Ok(request)
    }

    /// Parse a non-streaming generation response
    pub fn parse_response(&self, prompt: &Prompt, raw: Value) -> Result<Response, LlmError> {
        match self.protocol(prompt)? {
            WireProtocol::Chat => chat::parse_response(prompt, raw),
            WireProtocol::Responses => responses::parse_response(prompt, raw),
            WireProtocol::Anthropic => anthropic::parse_response(prompt, raw),
        }
    }

    /// Parse a token-counting response
    pub fn parse_token_count(&self, prompt: &Prompt, raw: &Value) -> Result<u32, LlmError> {
        match &*self.resolve(prompt)? {
            Self::Anthropic(_) => anthropic::parse_token_count(raw),
            other => Err(LlmError::unsupported(other.name(), Operation::CountTokens.as_str())),
        }
    }

    /// Parse a model-listing response into model ids
    pub fn parse_models(&self, prompt: &Prompt, raw: &Value) -> Result<Vec<String>, LlmError> {
        match self.protocol(prompt)? {
            WireProtocol::Chat | WireProtocol::Responses => chat::parse_models(raw),
            WireProtocol::Anthropic => anthropic::parse_models(raw),
        }
    }

    /// Decoder for a streaming generation of `prompt`
    pub fn stream_decoder(&self, prompt: &Prompt) -> Result<StreamDecoder, LlmError> {
        Ok(StreamDecoder::new(self.protocol(prompt)?))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{ContentPart, Message, ResponseSchema};

    fn config(toml_text: &str) -> LlmProviderConfig {
        toml::from_str(toml_text).unwrap()
    }

    #[test]
    fn plain_prompts_use_chat_completions() {
        let prompt = Prompt::new("gpt-4o").with_message(Message::user("hi"));
        assert!(!requires_responses_api(&prompt));
        assert_eq!(select_protocol(&prompt), WireProtocol::Chat);
    }

    #[test]
    fn schemas_and_rich_content_select_responses() {
        let schema = Prompt::new("gpt-4o")
            .with_message(Message::user("hi"))
            .with_schema(ResponseSchema::new("answer", json!({"type": "object"})));
        assert_eq!(select_protocol(&schema), WireProtocol::Responses);

        let image = Prompt::new("gpt-4o").with_message(Message::user(vec![ContentPart::Image {
            url: "https://example.com/cat.png".to_owned(),
            detail: None,
        }]));
        assert_eq!(select_protocol(&image), WireProtocol::Responses);
    }

    #[test]
    fn compatible_backends_stay_on_chat() {
        let adapter = Adapter::from_config(&config("type = \"ollama\"")).unwrap();
        let prompt = Prompt::new("llama3")
            .with_message(Message::user("hi"))
            .with_schema(ResponseSchema::new("answer", json!({"type": "object"})));
        assert_eq!(adapter.protocol(&prompt).unwrap(), WireProtocol::Chat);
    }

    #[test]
    fn openai_chat_request_has_no_tools_key_with_schema() {
        let adapter = Adapter::from_config(&config("type = \"ollama\"")).unwrap();
        let prompt = Prompt::new("llama3")
            .with_message(Message::user("hi"))
            .with_schema(ResponseSchema::new("answer", json!({"type": "object"})));

        let request = adapter.build_request(&prompt).unwrap();
        let body = request.body.unwrap();
        assert!(body.get("tools").is_none());
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(request.url.as_str(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn stream_operation_sets_stream_flag() {
        let adapter = Adapter::from_config(&config("type = \"openai\"\napi_key = \"sk\"")).unwrap();
        let prompt = Prompt::new("gpt-4o").with_message(Message::user("hi"));

        let request = adapter.build_operation_request(Operation::StreamChat, &prompt).unwrap();
        let body = request.body.unwrap();
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(request.headers[AUTHORIZATION], "Bearer sk");
        assert!(request.headers[AUTHORIZATION].is_sensitive());
    }

    #[test]
    fn unsupported_operations_are_rejected() {
        let adapter = Adapter::from_config(&config("type = \"openai\"\napi_key = \"sk\"")).unwrap();
        let prompt = Prompt::new("gpt-4o").with_message(Message::user("hi"));

        let err = adapter.build_operation_request(Operation::CountTokens, &prompt).unwrap_err();
        assert!(matches!(err, LlmError::UnsupportedFeature { ref provider, .. } if provider == "openai"));
        assert!(adapter.supports(Operation::ListModels));
        assert!(adapter.supports_streaming());
    }

    #[test]
    fn parse_dispatches_on_protocol() {
        let adapter = Adapter::from_config(&config("type = \"anthropic\"\napi_key = \"k\"")).unwrap();
        let prompt = Prompt::new("claude-sonnet-4").with_message(Message::user("hi"));

        let response = adapter
            .parse_response(
                &prompt,
                json!({
                    "id": "msg_1",
                    "role": "assistant",
                    "content": [{"type": "text", "text": "hello"}],
                    "model": "claude-sonnet-4",
                    "stop_reason": "end_turn",
                    "usage": {"input_tokens": 3, "output_tokens": 1}
                }),
            )
            .unwrap();
        assert_eq!(response.text(), "hello");
        assert!(matches!(adapter.stream_decoder(&prompt).unwrap(), StreamDecoder::Anthropic(_)));
    }
}
