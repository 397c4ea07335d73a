//! Programmatic provider configuration for tests

use relay_config::Config;
use relay_llm::Adapter;

/// Builds a relay configuration document provider by provider
#[derive(Default)]
pub struct ConfigBuilder {
    providers: Vec<String>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an OpenAI-compatible provider pointing at `base_url`
    pub fn with_openai_provider(mut self, name: &str, base_url: &str) -> Self {
        self.providers.push(format!(
            r#"
            [llm.providers.{name}]
            type = "openai"
            api_key = "sk-test"
            base_url = "{base_url}"
            "#
        ));
        self
    }

    /// Add an Anthropic provider pointing at `base_url`
    pub fn with_anthropic_provider(mut self, name: &str, base_url: &str) -> Self {
        self.providers.push(format!(
            r#"
            [llm.providers.{name}]
            type = "anthropic"
            api_key = "sk-ant-test"
            base_url = "{base_url}"
            "#
        ));
        self
    }

    /// Add a gateway provider whose host is `base_url`
    pub fn with_gateway_provider(mut self, name: &str, base_url: &str) -> Self {
        self.providers.push(format!(
            r#"
            [llm.providers.{name}]
            type = "gateway"
            project_id = "test-project"
            region = "us-east5"
            access_token = "ya29.test"
            base_url = "{base_url}"
            "#
        ));
        self
    }

    /// Add an Azure provider whose `/openai` root lives at `base_url`
    pub fn with_azure_provider(mut self, name: &str, base_url: &str) -> Self {
        self.providers.push(format!(
            r#"
            [llm.providers.{name}]
            type = "azure"
            resource_name = "test-resource"
            deployment_id = "gpt4o-prod"
            api_key = "azure-test"
            base_url = "{base_url}/openai"
            "#
        ));
        self
    }

    pub fn build(self) -> Config {
        Config::parse(&self.providers.concat()).expect("test config must parse")
    }
}

/// Build the adapter for the provider called `name`
pub fn adapter(config: &Config, name: &str) -> Adapter {
    Adapter::from_config(&config.llm.providers[name]).expect("adapter must build")
}
