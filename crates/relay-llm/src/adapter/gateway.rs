//! Anthropic models served through a cloud gateway
//!
//! Bodies are Anthropic messages requests with two rewrites: the model moves
//! from the body into the request path, and a protocol version field is
//! injected. Both are driven by [`GatewayRules`], whose defaults describe
//! Vertex AI.

use relay_config::{GatewayRulesConfig, LlmProviderConfig};
use secrecy::SecretString;
use serde_json::Value;
use url::Url;

use super::{Operation, WireRequest, to_body};
use crate::convert::anthropic;
use crate::error::LlmError;
use crate::types::Prompt;

/// Request rewriting rules for a gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRules {
    /// Injected as `anthropic_version` in every body
    pub version: String,
    /// Path template for non-streaming chat, relative to the publisher root
    pub chat_path: String,
    /// Path template for streaming chat, relative to the publisher root
    pub stream_path: String,
}

impl Default for GatewayRules {
    fn default() -> Self {
        Self {
            version: "vertex-2023-10-16".to_owned(),
            chat_path: "models/{model}:rawPredict".to_owned(),
            stream_path: "models/{model}:streamRawPredict".to_owned(),
        }
    }
}

impl GatewayRules {
    /// Defaults with configured overrides applied
    pub fn with_overrides(overrides: Option<&GatewayRulesConfig>) -> Self {
        let mut rules = Self::default();
        if let Some(overrides) = overrides {
            if let Some(version) = &overrides.version {
                rules.version.clone_from(version);
            }
            if let Some(path) = &overrides.chat_path {
                rules.chat_path.clone_from(path);
            }
            if let Some(path) = &overrides.stream_path {
                rules.stream_path.clone_from(path);
            }
        }
        rules
    }

    /// Path for `operation` with the model substituted
    pub fn path(&self, operation: Operation, model: &str) -> Result<String, LlmError> {
        let template = match operation {
            Operation::Chat => &self.chat_path,
            Operation::StreamChat => &self.stream_path,
            other => return Err(LlmError::unsupported("gateway", other.as_str())),
        };
        Ok(template.replace("{model}", model))
    }
}

/// Cloud-hosted Anthropic endpoint
#[derive(Debug, Clone)]
pub struct GatewayAdapter {
    project_id: String,
    region: String,
    base_url: Option<Url>,
    access_token: Option<SecretString>,
    rules: GatewayRules,
}

impl GatewayAdapter {
    /// Region used when none is configured
    pub const DEFAULT_REGION: &'static str = "global";

    pub fn from_config(config: &LlmProviderConfig) -> Result<Self, LlmError> {
        let project_id = config
            .project_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| LlmError::Configuration("gateway provider requires project_id".to_owned()))?;

        Ok(Self {
            project_id,
            region: config.region.clone().unwrap_or_else(|| Self::DEFAULT_REGION.to_owned()),
            base_url: config.base_url.clone(),
            access_token: config.access_token.clone(),
            rules: GatewayRules::with_overrides(config.rules.as_ref()),
        })
    }

    pub const fn rules(&self) -> &GatewayRules {
        &self.rules
    }

    /// API host: regional, global, or the configured override
    fn host(&self) -> String {
        match &self.base_url {
            Some(url) => url.as_str().trim_end_matches('/').to_owned(),
            None if self.region == Self::DEFAULT_REGION => "https://aiplatform.googleapis.com".to_owned(),
            None => format!("https://{}-aiplatform.googleapis.com", self.region),
        }
    }

    pub(crate) fn build_request(&self, operation: Operation, prompt: &Prompt) -> Result<WireRequest, LlmError> {
        let path = self.rules.path(operation, prompt.model())?;
        let url = format!(
            "{}/v1/projects/{}/locations/{}/publishers/anthropic/{path}",
            self.host(),
            self.project_id,
            self.region,
        );
        let url = Url::parse(&url).map_err(|e| LlmError::Configuration(format!("invalid gateway URL `{url}`: {e}")))?;

        let mut body = to_body(&anthropic::build_request(prompt)?)?;
        if let Value::Object(fields) = &mut body {
            fields.remove("model");
            fields.insert("anthropic_version".to_owned(), Value::String(self.rules.version.clone()));
        }

        WireRequest::post(url, body).with_bearer(self.access_token.as_ref())
    }
}
