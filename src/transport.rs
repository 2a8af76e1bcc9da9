use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

use crate::config::AzureConfig;
use crate::error::{AssistantError, Result};
use crate::models::{ChatCompletionRequest, ChatCompletionResponse};

/// One request/response exchange with the completion provider
#[async_trait]
pub trait Transport: Send + Sync {
    async fn chat(&self, req: &ChatCompletionRequest) -> Result<ChatCompletionResponse>;
}

/// Builds the provider connection handle cached by a session
pub trait Connector: Send + Sync {
    fn connect(&self, cfg: &AzureConfig) -> Result<Arc<dyn Transport>>;
}

pub struct AzureTransport {
    client: Client,
    url: String,
    api_key: String,
}

impl AzureTransport {
    pub fn new(cfg: &AzureConfig) -> Result<Self> {
        if cfg.endpoint.is_empty() {
            return Err(AssistantError::Config("ENDPOINT_URL is not set".to_string()));
        }
        if cfg.deployment.is_empty() {
            return Err(AssistantError::Config("DEPLOYMENT_NAME is not set".to_string()));
        }
        if cfg.api_key.is_empty() {
            return Err(AssistantError::Config(
                "AZURE_OPENAI_API_KEY is not set".to_string(),
            ));
        }

        let client = Client::builder().build()?;

        Ok(Self {
            client,
            url: completions_url(cfg),
            api_key: cfg.api_key.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version={version}`
pub fn completions_url(cfg: &AzureConfig) -> String {
    format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        cfg.endpoint.trim_end_matches('/'),
        cfg.deployment,
        cfg.api_version
    )
}

#[async_trait]
impl Transport for AzureTransport {
    async fn chat(&self, req: &ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let response = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(req)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!(status = status.as_u16(), "Azure OpenAI request failed");
            return Err(AssistantError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Connects to Azure OpenAI with key-based authentication
#[derive(Debug, Default, Clone, Copy)]
pub struct AzureConnector;

impl Connector for AzureConnector {
    fn connect(&self, cfg: &AzureConfig) -> Result<Arc<dyn Transport>> {
        let transport = AzureTransport::new(cfg)?;
        tracing::info!(url = %transport.url(), "Azure OpenAI client initialized");
        Ok(Arc::new(transport))
    }
}
