use std::collections::BTreeMap;

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Top-level LLM configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// LLM provider configurations keyed by name
    #[serde(default)]
    pub providers: IndexMap<String, LlmProviderConfig>,
}

/// Configuration for a single LLM provider
///
/// Fields not meaningful for `provider_type` are ignored by the adapter;
/// the ones it does need are checked when the adapter is built.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmProviderConfig {
    /// Provider protocol type
    #[serde(rename = "type")]
    pub provider_type: LlmProviderType,
    /// API key for authentication
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Cloud project hosting the model (gateway)
    #[serde(default)]
    pub project_id: Option<String>,
    /// Cloud region, or "global" (gateway)
    #[serde(default)]
    pub region: Option<String>,
    /// OAuth bearer token (gateway)
    #[serde(default)]
    pub access_token: Option<SecretString>,
    /// Path and version rule overrides (gateway)
    #[serde(default)]
    pub rules: Option<GatewayRulesConfig>,
    /// Resource name in `https://{resource}.openai.azure.com` (azure)
    #[serde(default)]
    pub resource_name: Option<String>,
    /// Deployment id serving the model (azure)
    #[serde(default)]
    pub deployment_id: Option<String>,
    /// `api-version` query parameter (azure)
    #[serde(default)]
    pub api_version: Option<String>,
    /// Per-backend credentials keyed by backend name (auto)
    #[serde(default)]
    pub credentials: BTreeMap<String, SecretString>,
}

/// Supported LLM provider protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProviderType {
    /// `OpenAI` chat completions / responses
    Openai,
    /// Local Ollama server (OpenAI-compatible)
    Ollama,
    /// `OpenRouter` (OpenAI-compatible)
    Openrouter,
    /// Anthropic Messages API
    Anthropic,
    /// Anthropic models behind a cloud gateway
    Gateway,
    /// Azure-hosted `OpenAI` deployments
    Azure,
    /// Backend chosen from the model identifier
    Auto,
}

/// Overrides of the gateway's default request rules
///
/// Path templates must contain `{model}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayRulesConfig {
    /// Protocol version injected into the body
    #[serde(default)]
    pub version: Option<String>,
    /// Path template for non-streaming chat
    #[serde(default)]
    pub chat_path: Option<String>,
    /// Path template for streaming chat
    #[serde(default)]
    pub stream_path: Option<String>,
}

impl GatewayRulesConfig {
    /// Configured path templates
    pub fn templates(&self) -> impl Iterator<Item = &str> {
        self.chat_path.iter().chain(&self.stream_path).map(String::as_str)
    }
}
