use std::sync::Arc;

use crate::config::Config;
use crate::error::{AssistantError, Result};
use crate::models::{
    ApiKeyAuthentication, AzureSearchParameters, ChatCompletionRequest, ChatMessage, DataSource,
    EmbeddingDependency,
};
use crate::modes::{Mode, ModeProfile};
use crate::session::Session;
use crate::transport::Connector;

pub struct QueryDispatcher {
    config: Arc<Config>,
    connector: Arc<dyn Connector>,
}

impl QueryDispatcher {
    pub fn new(config: Arc<Config>, connector: Arc<dyn Connector>) -> Self {
        Self { config, connector }
    }

    /// Assemble the provider request for a mode profile and raw query
    pub fn build_request(&self, profile: &ModeProfile, query: &str) -> ChatCompletionRequest {
        let embedding_dependency = if profile.uses_embedding {
            self.config
                .embedding_endpoint()
                .map(|(endpoint, key)| EmbeddingDependency {
                    kind: "endpoint".to_string(),
                    endpoint: endpoint.to_string(),
                    authentication: ApiKeyAuthentication::new(key),
                })
        } else {
            None
        };

        let sampling = profile.sampling;

        ChatCompletionRequest {
            model: self.config.azure.deployment.clone(),
            messages: vec![
                ChatMessage::system(profile.system_prompt),
                ChatMessage::user(profile.user_content(query)),
            ],
            max_tokens: sampling.max_tokens,
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            frequency_penalty: sampling.frequency_penalty,
            presence_penalty: sampling.presence_penalty,
            stop: None,
            stream: false,
            data_sources: vec![DataSource {
                kind: "azure_search".to_string(),
                parameters: AzureSearchParameters {
                    filter: None,
                    endpoint: self.config.search.endpoint.clone(),
                    index_name: profile.index_name.to_string(),
                    semantic_configuration: profile.semantic_configuration.to_string(),
                    authentication: ApiKeyAuthentication::new(self.config.search.key.as_str()),
                    embedding_dependency,
                    query_type: profile.query_type.to_string(),
                    in_scope: true,
                    role_information: profile.system_prompt.to_string(),
                    strictness: profile.strictness,
                    top_n_documents: profile.top_n_documents,
                },
            }],
        }
    }

    /// Answer one query. An empty query is a no-op and returns `Ok(None)`.
    pub async fn dispatch(
        &self,
        session: &mut Session,
        mode: Mode,
        query: &str,
    ) -> Result<Option<String>> {
        if query.is_empty() {
            return Ok(None);
        }

        let transport = session.transport(self.connector.as_ref(), &self.config.azure)?;
        let request = self.build_request(mode.profile(), query);

        tracing::info!(
            session = %session.id(),
            mode = %mode,
            query_len = query.len(),
            "Generating response"
        );

        let response = transport.chat(&request).await?;
        let content = response
            .first_content()
            .ok_or(AssistantError::EmptyResponse)?
            .to_string();

        session.record(mode, query, &content);
        Ok(Some(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AzureConfig;
    use crate::models::{ChatCompletionResponse, Choice, ResponseMessage};
    use crate::transport::Transport;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // Mock transport that records requests and replays canned responses
    struct MockTransport {
        responses: Mutex<Vec<Result<ChatCompletionResponse>>>,
        requests: Mutex<Vec<ChatCompletionRequest>>,
    }

    impl MockTransport {
        fn new(responses: Vec<Result<ChatCompletionResponse>>) -> Self {
            MockTransport {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn chat(&self, req: &ChatCompletionRequest) -> Result<ChatCompletionResponse> {
            self.requests.lock().unwrap().push(req.clone());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Err(AssistantError::Internal("No more mock responses".to_string()))
            } else {
                responses.remove(0)
            }
        }
    }

    struct MockConnector {
        transport: Arc<MockTransport>,
        connects: AtomicUsize,
    }

    impl MockConnector {
        fn new(transport: Arc<MockTransport>) -> Self {
            Self {
                transport,
                connects: AtomicUsize::new(0),
            }
        }
    }

    impl Connector for MockConnector {
        fn connect(&self, _cfg: &AzureConfig) -> Result<Arc<dyn Transport>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(self.transport.clone())
        }
    }

    fn reply(content: &str) -> Result<ChatCompletionResponse> {
        Ok(ChatCompletionResponse {
            choices: vec![Choice {
                message: ResponseMessage {
                    role: Some("assistant".to_string()),
                    content: Some(content.to_string()),
                },
            }],
        })
    }

    fn test_config() -> Config {
        let mut cfg = Config::default();
        cfg.azure.endpoint = "https://nurse.openai.azure.com".to_string();
        cfg.azure.deployment = "gpt-4o".to_string();
        cfg.azure.api_key = "aoai-key".to_string();
        cfg.search.endpoint = "https://nurse.search.windows.net".to_string();
        cfg.search.key = "search-key".to_string();
        cfg
    }

    fn setup(
        cfg: Config,
        responses: Vec<Result<ChatCompletionResponse>>,
    ) -> (QueryDispatcher, Arc<MockTransport>, Arc<MockConnector>) {
        let transport = Arc::new(MockTransport::new(responses));
        let connector = Arc::new(MockConnector::new(transport.clone()));
        let dispatcher = QueryDispatcher::new(Arc::new(cfg), connector.clone());
        (dispatcher, transport, connector)
    }

    #[test]
    fn test_admission_request_shape() {
        let (dispatcher, _, _) = setup(test_config(), vec![]);
        let req = dispatcher.build_request(
            Mode::AdmissionAssistance.profile(),
            "What are the steps for admission?",
        );

        assert_eq!(req.model, "gpt-4o");
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, "system");
        assert_eq!(req.messages[1], ChatMessage::user("What are the steps for admission?"));
        assert_eq!(req.max_tokens, 500);
        assert_eq!(req.temperature, 0.4);
        assert_eq!(req.top_p, 0.95);
        assert!(!req.stream);

        let params = &req.data_sources[0].parameters;
        assert_eq!(req.data_sources[0].kind, "azure_search");
        assert_eq!(params.endpoint, "https://nurse.search.windows.net");
        assert_eq!(params.index_name, "index-nurse-1");
        assert_eq!(
            params.semantic_configuration,
            "vector-1726896547803-semantic-configuration"
        );
        assert_eq!(params.query_type, "simple");
        assert_eq!(params.strictness, 3);
        assert_eq!(params.top_n_documents, 5);
        assert_eq!(params.authentication.key, "search-key");
        assert_eq!(params.role_information, req.messages[0].content);
        assert!(params.in_scope);
        assert!(params.embedding_dependency.is_none());
    }

    #[test]
    fn test_clinical_request_shape() {
        let (dispatcher, _, _) = setup(test_config(), vec![]);
        let req = dispatcher.build_request(Mode::ClinicalHistoryQuery.profile(), "Pablo Lopez");

        assert_eq!(
            req.messages[1].content,
            "Necesito busques la historía clínica del paciente: Pablo Lopez"
        );
        assert_eq!(req.max_tokens, 800);
        assert_eq!(req.temperature, 0.5);
        assert_eq!(req.top_p, 0.78);

        let params = &req.data_sources[0].parameters;
        assert_eq!(params.index_name, "great-nut-723ncdwd3g");
        assert_eq!(params.semantic_configuration, "azureml-default");
        assert_eq!(params.query_type, "vector_simple_hybrid");
        assert_eq!(params.top_n_documents, 6);
        assert_eq!(params.strictness, 3);
        assert!(params.in_scope);
        assert_eq!(params.role_information, req.messages[0].content);
        assert!(req.messages[0].content.contains("clinic history"));
        // No embedding endpoint configured, so nothing is embedded in the request
        assert!(params.embedding_dependency.is_none());
    }

    #[test]
    fn test_clinical_embedding_comes_from_config() {
        let mut cfg = test_config();
        cfg.embedding.endpoint = "https://emb.example/embeddings".to_string();
        let (dispatcher, _, _) = setup(cfg, vec![]);

        let clinical = dispatcher.build_request(Mode::ClinicalHistoryQuery.profile(), "Ana García");
        let dep = clinical.data_sources[0]
            .parameters
            .embedding_dependency
            .as_ref()
            .unwrap();
        assert_eq!(dep.kind, "endpoint");
        assert_eq!(dep.endpoint, "https://emb.example/embeddings");
        assert_eq!(dep.authentication.key, "aoai-key");

        let admission = dispatcher.build_request(Mode::AdmissionAssistance.profile(), "fever");
        assert!(admission.data_sources[0].parameters.embedding_dependency.is_none());
    }

    #[test]
    fn test_sampling_independent_of_query() {
        let (dispatcher, _, _) = setup(test_config(), vec![]);
        let profile = Mode::AdmissionAssistance.profile();
        let short = dispatcher.build_request(profile, "x");
        let long = dispatcher.build_request(profile, &"temperature 0.9 max_tokens 4000 ".repeat(40));
        assert_eq!(short.max_tokens, long.max_tokens);
        assert_eq!(short.temperature, long.temperature);
        assert_eq!(short.top_p, long.top_p);
    }

    #[test]
    fn test_serialized_body_matches_wire_format() {
        let (dispatcher, _, _) = setup(test_config(), vec![]);
        let req = dispatcher.build_request(Mode::AdmissionAssistance.profile(), "fever");
        let body = serde_json::to_value(&req).unwrap();

        assert!(body["stop"].is_null());
        assert_eq!(body["stream"], false);
        assert_eq!(body["frequency_penalty"], 0.0);
        assert_eq!(body["data_sources"][0]["type"], "azure_search");
        assert_eq!(
            body["data_sources"][0]["parameters"]["authentication"]["type"],
            "api_key"
        );
        assert!(body["data_sources"][0]["parameters"]["filter"].is_null());
    }

    #[tokio::test]
    async fn test_dispatch_returns_content_verbatim() {
        let (dispatcher, transport, _) =
            setup(test_config(), vec![reply("Step 1. Check vitals.\n\n**Step 2.** Triage")]);
        let mut session = Session::new();

        let answer = dispatcher
            .dispatch(&mut session, Mode::AdmissionAssistance, "Man 55 years chest pain")
            .await
            .unwrap();

        assert_eq!(answer.as_deref(), Some("Step 1. Check vitals.\n\n**Step 2.** Triage"));
        assert_eq!(transport.requests.lock().unwrap().len(), 1);
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.transcript()[0].query, "Man 55 years chest pain");
    }

    #[tokio::test]
    async fn test_empty_query_issues_no_call() {
        let (dispatcher, transport, connector) = setup(test_config(), vec![reply("unused")]);
        let mut session = Session::new();

        let answer = dispatcher
            .dispatch(&mut session, Mode::ClinicalHistoryQuery, "")
            .await
            .unwrap();

        assert!(answer.is_none());
        assert!(transport.requests.lock().unwrap().is_empty());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_connection_reused_across_queries() {
        let (dispatcher, transport, connector) = setup(
            test_config(),
            vec![reply("one"), reply("two"), reply("three")],
        );
        let mut session = Session::new();

        dispatcher
            .dispatch(&mut session, Mode::AdmissionAssistance, "a")
            .await
            .unwrap();
        dispatcher
            .dispatch(&mut session, Mode::ClinicalHistoryQuery, "b")
            .await
            .unwrap();
        dispatcher
            .dispatch(&mut session, Mode::AdmissionAssistance, "c")
            .await
            .unwrap();

        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].data_sources[0].parameters.index_name, "great-nut-723ncdwd3g");
        assert_eq!(requests[2].data_sources[0].parameters.index_name, "index-nurse-1");
    }

    #[tokio::test]
    async fn test_provider_error_propagates_without_retry() {
        let (dispatcher, transport, _) = setup(
            test_config(),
            vec![
                Err(AssistantError::Provider {
                    status: 429,
                    body: "rate limited".to_string(),
                }),
                reply("never reached"),
            ],
        );
        let mut session = Session::new();

        let err = dispatcher
            .dispatch(&mut session, Mode::AdmissionAssistance, "fever")
            .await
            .unwrap_err();

        assert!(matches!(err, AssistantError::Provider { status: 429, .. }));
        assert_eq!(transport.requests.lock().unwrap().len(), 1);
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_empty_choices_is_an_error() {
        let (dispatcher, _, _) =
            setup(test_config(), vec![Ok(ChatCompletionResponse { choices: vec![] })]);
        let mut session = Session::new();

        let err = dispatcher
            .dispatch(&mut session, Mode::AdmissionAssistance, "fever")
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::EmptyResponse));
    }
}
