//! Backend selection from the model identifier

use std::collections::BTreeMap;

use relay_config::LlmProviderConfig;
use secrecy::SecretString;
use url::Url;

use super::Adapter;
use super::endpoint::{Backend, Endpoint};
use crate::error::LlmError;

const OPENAI_PREFIXES: &[&str] = &["gpt-", "chatgpt-", "o1", "o3", "o4", "ft:", "davinci", "babbage", "text-"];

/// Backend that serves `model`
///
/// `vendor/model` ids are routed through `OpenRouter`, `claude*` to
/// Anthropic, known `OpenAI` families to `OpenAI`; anything else is assumed
/// to be a local Ollama model.
pub fn detect_backend(model: &str) -> Backend {
    let model = model.trim().to_ascii_lowercase();

    if model.contains('/') {
        Backend::OpenRouter
    } else if model.starts_with("claude") {
        Backend::Anthropic
    } else if OPENAI_PREFIXES.iter().any(|prefix| model.starts_with(prefix)) {
        Backend::OpenAi
    } else {
        Backend::Ollama
    }
}

/// Adapter that picks its backend per prompt
#[derive(Debug, Clone)]
pub struct AutoAdapter {
    credentials: BTreeMap<Backend, SecretString>,
    ollama_url: Option<Url>,
}

impl AutoAdapter {
    pub fn from_config(config: &LlmProviderConfig) -> Result<Self, LlmError> {
        let mut credentials = BTreeMap::new();

        for (name, secret) in &config.credentials {
            let backend = [Backend::OpenAi, Backend::Ollama, Backend::OpenRouter, Backend::Anthropic]
                .into_iter()
                .find(|b| b.as_str() == name)
                .ok_or_else(|| LlmError::Configuration(format!("unknown backend `{name}` in auto credentials")))?;
            credentials.insert(backend, secret.clone());
        }

        Ok(Self {
            credentials,
            ollama_url: config.base_url.clone(),
        })
    }

    /// Concrete adapter for `model`
    pub fn resolve(&self, model: &str) -> Result<Adapter, LlmError> {
        let backend = detect_backend(model);
        let key = self.credentials.get(&backend).cloned();
        tracing::debug!(model, backend = backend.as_str(), "resolved auto backend");

        if backend.requires_key() && key.is_none() {
            return Err(LlmError::Configuration(format!(
                "model `{model}` resolves to {} but no credential is configured for it",
                backend.as_str()
            )));
        }

        Ok(match backend {
            Backend::OpenAi => Adapter::OpenAi(Endpoint::new(backend, None, key)?),
            Backend::Ollama => Adapter::Ollama(Endpoint::new(backend, self.ollama_url.clone(), key)?),
            Backend::OpenRouter => Adapter::OpenRouter(Endpoint::new(backend, None, key)?),
            Backend::Anthropic => Adapter::Anthropic(Endpoint::new(backend, None, key)?),
        })
    }
}
