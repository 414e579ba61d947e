pub mod client;
pub mod ports;

pub use client::LettaClient;
pub use ports::*;

use config::AgentBackendConfig;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Optional overrides when creating an agent; config defaults fill the rest.
#[derive(Debug, Clone, Default)]
pub struct NewAgent {
    pub name: Option<String>,
    pub system: Option<String>,
    pub model: Option<String>,
    pub persona: Option<String>,
    pub human: Option<String>,
    pub tools: Vec<String>,
}

/// Agent facade: backend calls plus the configured defaults.
#[derive(Clone)]
pub struct AgentService {
    backend: Arc<dyn AgentBackend>,
    config: AgentBackendConfig,
}

impl AgentService {
    pub fn new(backend: Arc<dyn AgentBackend>, config: AgentBackendConfig) -> Self {
        Self { backend, config }
    }

    /// Service backed by the Letta REST API.
    pub fn letta(config: AgentBackendConfig) -> Result<Self, AgentError> {
        let backend = Arc::new(LettaClient::from_config(&config)?);
        Ok(Self::new(backend, config))
    }

    /// Service whose backend calls carry `project_id`; a clone of this one when unset.
    pub fn for_project(&self, project_id: Option<&str>) -> Self {
        match project_id.map(str::trim).filter(|p| !p.is_empty()) {
            Some(project_id) => {
                Self::new(self.backend.with_project(project_id), self.config.clone())
            }
            None => self.clone(),
        }
    }

    pub fn backend(&self) -> &Arc<dyn AgentBackend> {
        &self.backend
    }

    pub fn config(&self) -> &AgentBackendConfig {
        &self.config
    }

    pub fn build_request(&self, options: NewAgent) -> CreateAgentRequest {
        let limit = Some(self.config.memory_capacity);
        let memory_blocks = [("persona", options.persona), ("human", options.human)]
            .into_iter()
            .filter_map(|(label, value)| {
                value.map(|value| MemoryBlock {
                    limit,
                    ..MemoryBlock::new(label, value)
                })
            })
            .collect();

        let tools = if options.tools.is_empty() {
            self.config.tools.clone()
        } else {
            options.tools
        };

        CreateAgentRequest {
            name: options.name.unwrap_or_else(|| self.config.agent_name.clone()),
            system: options.system,
            model: options.model.unwrap_or_else(|| self.config.llm_model.clone()),
            embedding: self.config.embedding_model.clone(),
            memory_blocks,
            tools,
        }
    }

    /// Create an agent and return its id.
    pub async fn create_agent(&self, options: NewAgent) -> Result<String, AgentError> {
        let request = self.build_request(options);
        Ok(self.backend.create_agent(request).await?.id)
    }

    pub async fn list_agents(&self, project_id: Option<String>) -> Result<Vec<AgentState>, AgentError> {
        self.backend.list_agents(project_id).await
    }

    pub async fn get_agent(&self, agent_id: &str) -> Result<AgentState, AgentError> {
        self.backend.get_agent(agent_id).await
    }

    pub async fn delete_agent(&self, agent_id: &str) -> Result<(), AgentError> {
        self.backend.delete_agent(agent_id).await
    }

    pub async fn send_message(
        &self,
        agent_id: &str,
        role: MessageRole,
        text: &str,
    ) -> Result<Vec<AgentMessage>, AgentError> {
        self.backend.send_message(agent_id, role, text).await
    }

    pub async fn get_memory(&self, agent_id: &str) -> Result<AgentMemory, AgentError> {
        self.backend.get_memory(agent_id).await
    }

    pub async fn list_blocks(&self, agent_id: &str) -> Result<Vec<MemoryBlock>, AgentError> {
        self.backend.list_blocks(agent_id).await
    }

    pub async fn update_memory(
        &self,
        agent_id: &str,
        label: &str,
        value: &str,
    ) -> Result<MemoryBlock, AgentError> {
        self.backend.update_block(agent_id, label, value).await
    }

    pub async fn recent_messages(
        &self,
        agent_id: &str,
        limit: u32,
    ) -> Result<Vec<AgentMessage>, AgentError> {
        self.backend.list_messages(agent_id, limit).await
    }
}

/// A single agent, created with config defaults on first use when no id is given.
pub struct AgentHandle {
    service: AgentService,
    agent_id: OnceCell<String>,
}

impl AgentHandle {
    pub fn new(service: AgentService, agent_id: Option<String>) -> Self {
        let cell = match agent_id {
            Some(id) => OnceCell::new_with(Some(id)),
            None => OnceCell::new(),
        };
        Self {
            service,
            agent_id: cell,
        }
    }

    pub async fn agent_id(&self) -> Result<&str, AgentError> {
        let id = self
            .agent_id
            .get_or_try_init(|| self.service.create_agent(NewAgent::default()))
            .await?;
        Ok(id.as_str())
    }

    pub async fn send_message(&self, text: &str) -> Result<Vec<AgentMessage>, AgentError> {
        let id = self.agent_id().await?;
        self.service.send_message(id, MessageRole::User, text).await
    }

    pub async fn blocks(&self) -> Result<Vec<MemoryBlock>, AgentError> {
        let id = self.agent_id().await?;
        self.service.list_blocks(id).await
    }

    pub async fn info(&self) -> Result<AgentState, AgentError> {
        let id = self.agent_id().await?;
        self.service.get_agent(id).await
    }

    /// Delete the agent if one was ever created or attached.
    pub async fn delete(self) -> Result<(), AgentError> {
        match self.agent_id.get() {
            Some(id) => self.service.delete_agent(id).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::InMemoryAgentBackend;

    fn service(backend: Arc<InMemoryAgentBackend>) -> AgentService {
        let config = AgentBackendConfig {
            tools: vec!["web_search".to_string()],
            ..AgentBackendConfig::default()
        };
        AgentService::new(backend, config)
    }

    #[test]
    fn test_request_uses_defaults() {
        let service = service(Arc::new(InMemoryAgentBackend::default()));
        let request = service.build_request(NewAgent {
            persona: Some("Curious.".to_string()),
            ..NewAgent::default()
        });

        assert_eq!(request.name, "modaletta-agent");
        assert_eq!(request.model, "openai/gpt-4.1");
        assert_eq!(request.embedding, "openai/text-embedding-3-small");
        assert_eq!(request.tools, vec!["web_search"]);
        assert_eq!(request.memory_blocks.len(), 1);
        assert_eq!(request.memory_blocks[0].label, "persona");
        assert_eq!(request.memory_blocks[0].limit, Some(2000));
    }

    #[tokio::test]
    async fn test_project_scoped_calls() {
        let backend = Arc::new(InMemoryAgentBackend::with_agent("agent-1", "Nameless"));
        let agents = service(backend.clone());

        agents
            .for_project(Some("proj-1"))
            .send_message("agent-1", MessageRole::User, "hi")
            .await
            .unwrap();
        agents.for_project(Some("  ")).get_memory("agent-1").await.unwrap();
        agents.for_project(None).get_memory("agent-1").await.unwrap();

        assert_eq!(
            backend.projects_seen("agent-1"),
            vec![Some("proj-1".to_string()), None, None]
        );
        assert_eq!(backend.sent_messages("agent-1").len(), 1);
    }

    #[test]
    fn test_request_overrides() {
        let service = service(Arc::new(InMemoryAgentBackend::default()));
        let request = service.build_request(NewAgent {
            name: Some("nameless".to_string()),
            model: Some("anthropic/claude".to_string()),
            system: Some("Be brief.".to_string()),
            tools: vec!["run_code".to_string()],
            ..NewAgent::default()
        });
        assert_eq!(request.name, "nameless");
        assert_eq!(request.model, "anthropic/claude");
        assert_eq!(request.system.as_deref(), Some("Be brief."));
        assert_eq!(request.tools, vec!["run_code"]);
        assert!(request.memory_blocks.is_empty());
    }

    #[tokio::test]
    async fn test_handle_creates_agent_once() {
        let backend = Arc::new(InMemoryAgentBackend::default());
        let handle = AgentHandle::new(service(backend.clone()), None);

        let first = handle.agent_id().await.unwrap().to_string();
        let second = handle.agent_id().await.unwrap().to_string();
        assert_eq!(first, second);
        assert_eq!(backend.agent_count(), 1);

        handle.send_message("hello").await.unwrap();
        assert_eq!(backend.sent_messages(&first).len(), 1);

        handle.delete().await.unwrap();
        assert_eq!(backend.agent_count(), 0);
    }

    #[tokio::test]
    async fn test_handle_with_existing_id_never_creates() {
        let backend = Arc::new(InMemoryAgentBackend::with_agent("agent-1", "Nameless"));
        let handle = AgentHandle::new(service(backend.clone()), Some("agent-1".to_string()));

        assert_eq!(handle.info().await.unwrap().name, "Nameless");
        assert_eq!(backend.agent_count(), 1);
    }
}
