use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};
use utoipa::ToSchema;

/// Error type for agent backend operations
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent backend request failed: {0}")]
    RequestFailed(String),
    #[error("Agent backend returned an error: {status} {body}")]
    ApiError { status: u16, body: String },
    #[error("Agent backend response parsing failed: {0}")]
    ParseError(String),
    #[error("Agent not found: {0}")]
    NotFound(String),
    #[error("Invalid message role: {0}")]
    InvalidRole(String),
}

/// Agent record as returned by the backend. Unknown fields are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    #[default]
    User,
    System,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::System => "system",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "system" => Ok(Self::System),
            "assistant" => Ok(Self::Assistant),
            other => Err(AgentError::InvalidRole(other.to_string())),
        }
    }
}

/// One message produced by an agent turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// `assistant_message`, `reasoning_message`, `tool_call_message`, `tool_return_message`, ...
    #[serde(default)]
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_return: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AgentMessage {
    /// Plain text of `content`, joining text parts when content is a list.
    pub fn text(&self) -> Option<String> {
        match self.content.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Array(parts) => {
                let text: Vec<&str> = parts
                    .iter()
                    .filter_map(|part| part.get("text").and_then(Value::as_str))
                    .collect();
                (!text.is_empty()).then(|| text.join("\n"))
            }
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.tool_call.as_ref()?.get("name")?.as_str()
    }
}

/// Labelled core-memory block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub label: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MemoryBlock {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: None,
            label: label.into(),
            value: value.into(),
            limit: None,
            description: None,
        }
    }
}

/// Memory snapshot keyed by block label.
pub type AgentMemory = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAgentRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub model: String,
    pub embedding: String,
    #[serde(default)]
    pub memory_blocks: Vec<MemoryBlock>,
    #[serde(default)]
    pub tools: Vec<String>,
}

/// Operations against the hosted agent backend.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Same backend with every request scoped to `project_id`.
    fn with_project(&self, project_id: &str) -> Arc<dyn AgentBackend>;

    async fn list_agents(&self, project_id: Option<String>) -> Result<Vec<AgentState>, AgentError>;

    async fn create_agent(&self, request: CreateAgentRequest) -> Result<AgentState, AgentError>;

    async fn get_agent(&self, agent_id: &str) -> Result<AgentState, AgentError>;

    async fn delete_agent(&self, agent_id: &str) -> Result<(), AgentError>;

    async fn send_message(
        &self,
        agent_id: &str,
        role: MessageRole,
        text: &str,
    ) -> Result<Vec<AgentMessage>, AgentError>;

    async fn list_blocks(&self, agent_id: &str) -> Result<Vec<MemoryBlock>, AgentError>;

    async fn update_block(
        &self,
        agent_id: &str,
        label: &str,
        value: &str,
    ) -> Result<MemoryBlock, AgentError>;

    async fn list_messages(
        &self,
        agent_id: &str,
        limit: u32,
    ) -> Result<Vec<AgentMessage>, AgentError>;

    /// Core memory as `label -> value`.
    async fn get_memory(&self, agent_id: &str) -> Result<AgentMemory, AgentError> {
        Ok(self
            .list_blocks(agent_id)
            .await?
            .into_iter()
            .map(|block| (block.label, block.value))
            .collect())
    }
}
