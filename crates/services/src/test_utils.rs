// Test utilities for services crate
#![cfg(any(test, feature = "test-mocks"))]

use crate::agents::{
    AgentBackend, AgentError, AgentMessage, AgentState, CreateAgentRequest, MemoryBlock,
    MessageRole,
};
use async_trait::async_trait;
use serde_json::{json, Map};
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

#[derive(Default)]
struct BackendState {
    agents: Vec<AgentState>,
    blocks: HashMap<String, Vec<MemoryBlock>>,
    sent: HashMap<String, Vec<(MessageRole, String)>>,
    projects: HashMap<String, Vec<Option<String>>>,
    failing: HashSet<String>,
    next_id: usize,
}

/// Agent backend kept in memory. Replies echo the incoming text.
///
/// Project-scoped copies share state with the backend they came from.
#[derive(Default)]
pub struct InMemoryAgentBackend {
    state: Arc<Mutex<BackendState>>,
    project_id: Option<String>,
}

fn agent(id: &str, name: &str) -> AgentState {
    AgentState {
        id: id.to_string(),
        name: name.to_string(),
        created_at: Some("2025-01-01T00:00:00Z".to_string()),
        system: None,
        extra: Map::new(),
    }
}

impl InMemoryAgentBackend {
    pub fn with_agent(id: &str, name: &str) -> Self {
        let backend = Self::default();
        backend.add_agent(id, name);
        backend
    }

    pub fn add_agent(&self, id: &str, name: &str) {
        self.lock().agents.push(agent(id, name));
    }

    pub fn set_blocks(&self, agent_id: &str, blocks: Vec<MemoryBlock>) {
        self.lock().blocks.insert(agent_id.to_string(), blocks);
    }

    /// Make every call for `agent_id` fail with a 500.
    pub fn fail_for(&self, agent_id: &str) {
        self.lock().failing.insert(agent_id.to_string());
    }

    pub fn agent_count(&self) -> usize {
        self.lock().agents.len()
    }

    pub fn sent_messages(&self, agent_id: &str) -> Vec<(MessageRole, String)> {
        self.lock().sent.get(agent_id).cloned().unwrap_or_default()
    }

    /// Project scope of each chat or memory call made for `agent_id`.
    pub fn projects_seen(&self, agent_id: &str) -> Vec<Option<String>> {
        self.lock().projects.get(agent_id).cloned().unwrap_or_default()
    }

    fn record_project(&self, agent_id: &str) {
        self.lock()
            .projects
            .entry(agent_id.to_string())
            .or_default()
            .push(self.project_id.clone());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BackendState> {
        self.state.lock().unwrap()
    }

    fn check(&self, agent_id: &str) -> Result<(), AgentError> {
        let state = self.lock();
        if state.failing.contains(agent_id) {
            return Err(AgentError::ApiError {
                status: 500,
                body: "backend unavailable".to_string(),
            });
        }
        if !state.agents.iter().any(|a| a.id == agent_id) {
            return Err(AgentError::NotFound(agent_id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AgentBackend for InMemoryAgentBackend {
    fn with_project(&self, project_id: &str) -> Arc<dyn AgentBackend> {
        Arc::new(Self {
            state: self.state.clone(),
            project_id: Some(project_id.to_string()),
        })
    }

    async fn list_agents(&self, _project_id: Option<String>) -> Result<Vec<AgentState>, AgentError> {
        Ok(self.lock().agents.clone())
    }

    async fn create_agent(&self, request: CreateAgentRequest) -> Result<AgentState, AgentError> {
        let mut state = self.lock();
        state.next_id += 1;
        let created = agent(&format!("agent-{}", state.next_id), &request.name);
        state
            .blocks
            .insert(created.id.clone(), request.memory_blocks.clone());
        state.agents.push(created.clone());
        Ok(created)
    }

    async fn get_agent(&self, agent_id: &str) -> Result<AgentState, AgentError> {
        self.check(agent_id)?;
        self.lock()
            .agents
            .iter()
            .find(|a| a.id == agent_id)
            .cloned()
            .ok_or_else(|| AgentError::NotFound(agent_id.to_string()))
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<(), AgentError> {
        self.check(agent_id)?;
        self.lock().agents.retain(|a| a.id != agent_id);
        Ok(())
    }

    async fn send_message(
        &self,
        agent_id: &str,
        role: MessageRole,
        text: &str,
    ) -> Result<Vec<AgentMessage>, AgentError> {
        self.check(agent_id)?;
        self.record_project(agent_id);
        self.lock()
            .sent
            .entry(agent_id.to_string())
            .or_default()
            .push((role, text.to_string()));

        let messages = json!([
            {"message_type": "reasoning_message", "reasoning": format!("Thinking about: {text}")},
            {"message_type": "assistant_message", "content": format!("Echo: {text}")}
        ]);
        serde_json::from_value(messages).map_err(|e| AgentError::ParseError(e.to_string()))
    }

    async fn list_blocks(&self, agent_id: &str) -> Result<Vec<MemoryBlock>, AgentError> {
        self.check(agent_id)?;
        self.record_project(agent_id);
        Ok(self.lock().blocks.get(agent_id).cloned().unwrap_or_default())
    }

    async fn update_block(
        &self,
        agent_id: &str,
        label: &str,
        value: &str,
    ) -> Result<MemoryBlock, AgentError> {
        self.check(agent_id)?;
        let mut state = self.lock();
        let blocks = state.blocks.entry(agent_id.to_string()).or_default();
        match blocks.iter_mut().find(|b| b.label == label) {
            Some(block) => {
                block.value = value.to_string();
                Ok(block.clone())
            }
            None => {
                let block = MemoryBlock::new(label, value);
                blocks.push(block.clone());
                Ok(block)
            }
        }
    }

    async fn list_messages(
        &self,
        agent_id: &str,
        limit: u32,
    ) -> Result<Vec<AgentMessage>, AgentError> {
        self.check(agent_id)?;
        let sent = self.sent_messages(agent_id);
        let skip = sent.len().saturating_sub(limit as usize);
        sent.into_iter()
            .skip(skip)
            .map(|(role, text)| {
                serde_json::from_value(json!({
                    "message_type": format!("{role}_message"),
                    "content": text
                }))
                .map_err(|e| AgentError::ParseError(e.to_string()))
            })
            .collect()
    }
}
