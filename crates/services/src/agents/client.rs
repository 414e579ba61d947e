use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use config::AgentBackendConfig;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;

use super::ports::{
    AgentBackend, AgentError, AgentMessage, AgentState, CreateAgentRequest, MemoryBlock,
    MessageRole,
};

/// HTTP client for the Letta REST API
pub struct LettaClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    project_id: Option<String>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<AgentMessage>,
}

impl LettaClient {
    /// Create a new Letta client
    ///
    /// # Arguments
    /// * `base_url` - Server URL (e.g. "http://localhost:8283")
    /// * `api_key` - Optional bearer token
    /// * `timeout_seconds` - Request timeout in seconds
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout_seconds: u64,
    ) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| AgentError::RequestFailed(format!("Failed to build HTTP client: {e}")))?;

        let base_url = base_url.trim_end_matches('/').to_string();
        tracing::info!(
            base_url = %base_url,
            auth_configured = api_key.is_some(),
            "Letta client initialized"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
            project_id: None,
        })
    }

    pub fn from_config(config: &AgentBackendConfig) -> Result<Self, AgentError> {
        Self::new(&config.base_url, config.api_key.clone(), config.timeout_secs)
    }

    /// Build a request with auth and project headers if configured
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.client.request(method, &url);
        if let Some(ref token) = self.api_key {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref project_id) = self.project_id {
            builder = builder.header(PROJECT_HEADER, project_id);
        }
        builder
    }

    /// Check response status and extract error body if needed
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, AgentError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let status_code = status.as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            Err(AgentError::ApiError {
                status: status_code,
                body,
            })
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, AgentError> {
        let response = builder
            .send()
            .await
            .map_err(|e| AgentError::RequestFailed(e.to_string()))?;

        let response = Self::check_response(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| AgentError::ParseError(e.to_string()))
    }
}

const PROJECT_HEADER: &str = "X-Project";

fn agent_path(agent_id: &str) -> String {
    format!("/v1/agents/{}", urlencoding::encode(agent_id))
}

fn not_found_as(agent_id: &str, err: AgentError) -> AgentError {
    match err {
        AgentError::ApiError { status: 404, .. } => AgentError::NotFound(agent_id.to_string()),
        other => other,
    }
}

#[async_trait]
impl AgentBackend for LettaClient {
    fn with_project(&self, project_id: &str) -> Arc<dyn AgentBackend> {
        Arc::new(Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            project_id: Some(project_id.to_string()),
        })
    }

    async fn list_agents(&self, project_id: Option<String>) -> Result<Vec<AgentState>, AgentError> {
        let mut builder = self.request(reqwest::Method::GET, "/v1/agents/");
        if let Some(project_id) = project_id.or_else(|| self.project_id.clone()) {
            builder = builder.query(&[("project_id", project_id)]);
        }
        self.send(builder).await
    }

    async fn create_agent(&self, request: CreateAgentRequest) -> Result<AgentState, AgentError> {
        let agent: AgentState = self
            .send(self.request(reqwest::Method::POST, "/v1/agents/").json(&request))
            .await?;
        tracing::info!(agent_id = %agent.id, name = %agent.name, "Created agent");
        Ok(agent)
    }

    async fn get_agent(&self, agent_id: &str) -> Result<AgentState, AgentError> {
        self.send(self.request(reqwest::Method::GET, &agent_path(agent_id)))
            .await
            .map_err(|e| not_found_as(agent_id, e))
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<(), AgentError> {
        let response = self
            .request(reqwest::Method::DELETE, &agent_path(agent_id))
            .send()
            .await
            .map_err(|e| AgentError::RequestFailed(e.to_string()))?;
        Self::check_response(response)
            .await
            .map_err(|e| not_found_as(agent_id, e))?;
        tracing::info!(agent_id, "Deleted agent");
        Ok(())
    }

    async fn send_message(
        &self,
        agent_id: &str,
        role: MessageRole,
        text: &str,
    ) -> Result<Vec<AgentMessage>, AgentError> {
        let body = json!({
            "messages": [{"role": role.as_str(), "content": text}]
        });
        let response: MessagesResponse = self
            .send(
                self.request(
                    reqwest::Method::POST,
                    &format!("{}/messages", agent_path(agent_id)),
                )
                .json(&body),
            )
            .await
            .map_err(|e| not_found_as(agent_id, e))?;
        tracing::debug!(agent_id, count = response.messages.len(), "Agent replied");
        Ok(response.messages)
    }

    async fn list_blocks(&self, agent_id: &str) -> Result<Vec<MemoryBlock>, AgentError> {
        self.send(self.request(
            reqwest::Method::GET,
            &format!("{}/core-memory/blocks", agent_path(agent_id)),
        ))
        .await
        .map_err(|e| not_found_as(agent_id, e))
    }

    async fn update_block(
        &self,
        agent_id: &str,
        label: &str,
        value: &str,
    ) -> Result<MemoryBlock, AgentError> {
        let path = format!(
            "{}/core-memory/blocks/{}",
            agent_path(agent_id),
            urlencoding::encode(label)
        );
        self.send(
            self.request(reqwest::Method::PATCH, &path)
                .json(&json!({ "value": value })),
        )
        .await
        .map_err(|e| not_found_as(agent_id, e))
    }

    async fn list_messages(
        &self,
        agent_id: &str,
        limit: u32,
    ) -> Result<Vec<AgentMessage>, AgentError> {
        self.send(
            self.request(
                reqwest::Method::GET,
                &format!("{}/messages", agent_path(agent_id)),
            )
            .query(&[("limit", limit)]),
        )
        .await
        .map_err(|e| not_found_as(agent_id, e))
    }
}
