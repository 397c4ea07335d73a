//! Azure-hosted `OpenAI` deployments

use http::header::HeaderName;
use relay_config::LlmProviderConfig;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use url::Url;

use super::{Operation, WireProtocol, WireRequest, join_url, to_body};
use crate::convert::{chat, responses};
use crate::error::LlmError;
use crate::types::Prompt;

/// `api-version` used when the configuration does not name one
pub const DEFAULT_API_VERSION: &str = "2024-10-21";

/// A deployment inside an Azure `OpenAI` resource
#[derive(Debug, Clone)]
pub struct AzureAdapter {
    resource_name: String,
    deployment_id: String,
    api_version: String,
    api_key: SecretString,
    base_url: Option<Url>,
}

fn required(value: Option<&String>, field: &str) -> Result<String, LlmError> {
    value
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| LlmError::Configuration(format!("azure provider requires {field}")))
}

impl AzureAdapter {
    pub fn from_config(config: &LlmProviderConfig) -> Result<Self, LlmError> {
        Ok(Self {
            resource_name: required(config.resource_name.as_ref(), "resource_name")?,
            deployment_id: required(config.deployment_id.as_ref(), "deployment_id")?,
            api_version: config
                .api_version
                .clone()
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_owned()),
            api_key: config
                .api_key
                .clone()
                .ok_or_else(|| LlmError::Configuration("azure provider requires api_key".to_owned()))?,
            base_url: config.base_url.clone(),
        })
    }

    /// `https://{resource}.openai.azure.com/openai`, or the configured override
    fn root(&self) -> Result<Url, LlmError> {
        match &self.base_url {
            Some(url) => Ok(url.clone()),
            None => {
                let root = format!("https://{}.openai.azure.com/openai", self.resource_name);
                Url::parse(&root).map_err(|e| LlmError::Configuration(format!("invalid azure resource name: {e}")))
            }
        }
    }

    fn url(&self, path: &str) -> Result<Url, LlmError> {
        let mut url = join_url(&self.root()?, path)?;
        url.query_pairs_mut().append_pair("api-version", &self.api_version);
        Ok(url)
    }

    pub(crate) fn build_request(
        &self,
        operation: Operation,
        protocol: WireProtocol,
        prompt: &Prompt,
    ) -> Result<WireRequest, LlmError> {
        let request = match (operation, protocol) {
            (Operation::ListModels, _) => WireRequest::get(self.url("models")?),
            (_, WireProtocol::Responses) => {
                let mut body = to_body(&responses::build_request(prompt)?)?;
                if let Value::Object(fields) = &mut body {
                    fields.insert("model".to_owned(), Value::String(self.deployment_id.clone()));
                }
                WireRequest::post(self.url("responses")?, body)
            }
            _ => WireRequest::post(
                self.url(&format!("deployments/{}/chat/completions", self.deployment_id))?,
                to_body(&chat::build_request(prompt, true)?)?,
            ),
        };

        request.with_secret(HeaderName::from_static("api-key"), self.api_key.expose_secret())
    }
}

#[cfg(test)]
mod tests {
    use http::header::AUTHORIZATION;
    use serde_json::json;

    use super::*;
    use crate::adapter::Adapter;
    use crate::types::{Message, ResponseSchema};

    fn azure() -> Adapter {
        let config: LlmProviderConfig = toml::from_str(
            r#"
            type = "azure"
            resource_name = "contoso"
            deployment_id = "gpt-4o-prod"
            api_version = "2025-01-01-preview"
            api_key = "az-key"
            "#,
        )
        .unwrap();
        Adapter::from_config(&config).unwrap()
    }

    #[test]
    fn chat_goes_to_deployment_with_api_version() {
        let prompt = Prompt::new("gpt-4o").with_message(Message::user("hi")).streaming(None);
        let request = azure().build_request(&prompt).unwrap();

        assert_eq!(
            request.url.as_str(),
            "https://contoso.openai.azure.com/openai/deployments/gpt-4o-prod/chat/completions?api-version=2025-01-01-preview"
        );
        assert_eq!(request.headers["api-key"], "az-key");
        assert!(request.headers.get(AUTHORIZATION).is_none());
        assert_eq!(request.body.unwrap()["stream_options"]["include_usage"], true);
    }

    #[test]
    fn schema_prompts_use_responses_with_deployment_model() {
        let prompt = Prompt::new("gpt-4o")
            .with_message(Message::user("hi"))
            .with_schema(ResponseSchema::new("answer", json!({"type": "object"})));
        let request = azure().build_request(&prompt).unwrap();

        assert_eq!(request.url.path(), "/openai/responses");
        assert_eq!(request.url.query(), Some("api-version=2025-01-01-preview"));
        let body = request.body.unwrap();
        assert_eq!(body["model"], "gpt-4o-prod");
        assert_eq!(body["text"]["format"]["type"], "json_schema");
    }

    #[test]
    fn missing_identifiers_are_configuration_errors() {
        for (toml_text, field) in [
            ("type = \"azure\"\ndeployment_id = \"d\"\napi_key = \"k\"", "resource_name"),
            ("type = \"azure\"\nresource_name = \"r\"\napi_key = \"k\"", "deployment_id"),
            ("type = \"azure\"\nresource_name = \"r\"\ndeployment_id = \"d\"", "api_key"),
        ] {
            let config: LlmProviderConfig = toml::from_str(toml_text).unwrap();
            let err = Adapter::from_config(&config).unwrap_err();
            assert!(matches!(err, LlmError::Configuration(ref m) if m.contains(field)), "{field}");
        }
    }

    #[test]
    fn api_version_defaults() {
        let config: LlmProviderConfig =
            toml::from_str("type = \"azure\"\nresource_name = \"r\"\ndeployment_id = \"d\"\napi_key = \"k\"").unwrap();
        let adapter = Adapter::from_config(&config).unwrap();
        let prompt = Prompt::new("gpt-4o").with_message(Message::user("hi"));

        let request = adapter.build_operation_request(Operation::ListModels, &prompt).unwrap();
        assert_eq!(request.url.query(), Some("api-version=2024-10-21"));
    }
}
