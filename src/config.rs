use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

pub const DEFAULT_API_VERSION: &str = "2024-05-01-preview";

/// Main configuration structure for the nursing assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub azure: AzureConfig,
    pub search: SearchConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    pub endpoint: String,
    pub deployment: String,
    pub api_key: String,
    pub api_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub endpoint: String,
    pub key: String,
}

/// Embedding endpoint used by vector-hybrid retrieval. Empty endpoint means none.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub transport: String,
    pub http_bind: String,
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Config {
    /// Load configuration from file with environment variable overrides
    /// ALWAYS returns a config - problems are logged, not raised
    pub fn load() -> Self {
        let env_paths = [".env", "../.env"];

        let mut env_loaded = false;
        for path in &env_paths {
            if dotenvy::from_path(path).is_ok() {
                tracing::info!("Loaded .env from: {}", path);
                env_loaded = true;
                break;
            }
        }

        if !env_loaded {
            tracing::warn!("No .env file found - continuing with env vars only");
        }

        let config_path =
            env::var("NURSE_CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => Self::from_yaml(&contents).unwrap_or_else(|e| {
                    tracing::error!(
                        "Failed to parse config file {}: {} - using defaults",
                        config_path,
                        e
                    );
                    Self::default()
                }),
                Err(e) => {
                    tracing::error!(
                        "Failed to read config file {}: {} - using defaults",
                        config_path,
                        e
                    );
                    Self::default()
                }
            }
        } else {
            tracing::debug!("Config file not found at {} - using defaults", config_path);
            Self::default()
        };

        config.apply_overrides(|key| env::var(key).ok());

        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup("ENDPOINT_URL") {
            self.azure.endpoint = endpoint;
        }
        if let Some(deployment) = lookup("DEPLOYMENT_NAME") {
            self.azure.deployment = deployment;
        }
        if let Some(api_key) = lookup("AZURE_OPENAI_API_KEY") {
            self.azure.api_key = api_key;
        }
        if let Some(version) = lookup("AZURE_OPENAI_API_VERSION") {
            self.azure.api_version = version;
        }

        if let Some(endpoint) = lookup("SEARCH_ENDPOINT") {
            self.search.endpoint = endpoint;
        }
        if let Some(key) = lookup("SEARCH_KEY") {
            self.search.key = key;
        }

        if let Some(endpoint) = lookup("EMBEDDING_ENDPOINT") {
            self.embedding.endpoint = endpoint;
        }
        if let Some(key) = lookup("EMBEDDING_KEY") {
            self.embedding.key = Some(key);
        }

        if let Some(transport) = lookup("NURSE_TRANSPORT") {
            self.server.transport = transport;
        }
        if let Some(bind) = lookup("NURSE_HTTP_BIND") {
            self.server.http_bind = bind;
        }
        if let Some(token) = lookup("NURSE_BEARER_TOKEN") {
            self.server.bearer_token = Some(token).filter(|t| !t.is_empty());
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        let mut missing = Vec::new();
        if self.azure.endpoint.is_empty() {
            missing.push("ENDPOINT_URL");
        }
        if self.azure.deployment.is_empty() {
            missing.push("DEPLOYMENT_NAME");
        }
        if self.azure.api_key.is_empty() {
            missing.push("AZURE_OPENAI_API_KEY");
        }
        if self.search.endpoint.is_empty() {
            missing.push("SEARCH_ENDPOINT");
        }
        if self.search.key.is_empty() {
            missing.push("SEARCH_KEY");
        }
        if !missing.is_empty() {
            return Err(format!("missing settings: {}", missing.join(", ")));
        }

        match self.server.transport.as_str() {
            "stdio" | "http" => {}
            other => return Err(format!("unknown transport '{other}'")),
        }

        Ok(())
    }

    /// Embedding endpoint and the key to authenticate against it, if one is configured
    pub fn embedding_endpoint(&self) -> Option<(&str, &str)> {
        if self.embedding.endpoint.is_empty() {
            return None;
        }
        let key = self
            .embedding
            .key
            .as_deref()
            .unwrap_or(self.azure.api_key.as_str());
        Some((self.embedding.endpoint.as_str(), key))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            azure: AzureConfig {
                endpoint: String::new(),
                deployment: String::new(),
                api_key: String::new(),
                api_version: DEFAULT_API_VERSION.to_string(),
            },
            search: SearchConfig {
                endpoint: String::new(),
                key: String::new(),
            },
            embedding: EmbeddingConfig::default(),
            server: ServerConfig {
                transport: "stdio".to_string(),
                http_bind: "127.0.0.1:8788".to_string(),
                bearer_token: None,
            },
        }
    }
}
