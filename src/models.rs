use serde::{Deserialize, Serialize};

// Chat message format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Azure OpenAI chat completion request with the "On Your Data" extension
#[derive(Debug, Serialize, Clone)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub stop: Option<Vec<String>>,
    pub stream: bool,
    pub data_sources: Vec<DataSource>,
}

#[derive(Debug, Serialize, Clone)]
pub struct DataSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub parameters: AzureSearchParameters,
}

#[derive(Debug, Serialize, Clone)]
pub struct AzureSearchParameters {
    pub filter: Option<String>,
    pub endpoint: String,
    pub index_name: String,
    pub semantic_configuration: String,
    pub authentication: ApiKeyAuthentication,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_dependency: Option<EmbeddingDependency>,
    pub query_type: String,
    pub in_scope: bool,
    pub role_information: String,
    pub strictness: u8,
    pub top_n_documents: u32,
}

#[derive(Debug, Serialize, Clone)]
pub struct ApiKeyAuthentication {
    #[serde(rename = "type")]
    pub kind: String,
    pub key: String,
}

impl ApiKeyAuthentication {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            kind: "api_key".to_string(),
            key: key.into(),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct EmbeddingDependency {
    #[serde(rename = "type")]
    pub kind: String,
    pub endpoint: String,
    pub authentication: ApiKeyAuthentication,
}

// Chat completion response format; only the fields that are read
#[derive(Debug, Deserialize, Clone)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Content of the top completion, if the provider returned any
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
    }
}
