use serde::{Deserialize, Serialize};
use services::{
    agents::{AgentMessage, AgentState, MessageRole},
    auth::SessionClaims,
    debug_logs::DebugLogEntry,
};
use utoipa::{IntoParams, ToSchema};

/// Error body for every JSON failure response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

// ============================================
// Agents and chat
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebappConfigResponse {
    pub default_agent_id: Option<String>,
    pub default_project_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ProjectQuery {
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AgentSummary {
    pub id: String,
    pub name: String,
    pub created_at: Option<String>,
}

impl From<AgentState> for AgentSummary {
    fn from(agent: AgentState) -> Self {
        Self {
            id: agent.id,
            name: agent.name,
            created_at: agent.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatRequest {
    pub agent_id: String,
    pub message: String,
    #[serde(default)]
    pub role: MessageRole,
    /// Sent to the backend as the `X-Project` scope.
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    #[schema(value_type = Vec<Object>)]
    pub messages: Vec<AgentMessage>,
}

// ============================================
// Debug logs
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitLogsRequest {
    pub logs: Vec<DebugLogEntry>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitLogsResponse {
    pub status: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LogFileResponse {
    pub logs: Vec<String>,
    pub count: usize,
}

// ============================================
// Auth
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SessionUser {
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl From<&SessionClaims> for SessionUser {
    fn from(claims: &SessionClaims) -> Self {
        Self {
            email: claims.email.clone(),
            name: claims.name.clone(),
            picture: claims.picture.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthStatusResponse {
    pub authenticated: bool,
    pub user: Option<SessionUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUserResponse {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl From<SessionClaims> for CurrentUserResponse {
    fn from(claims: SessionClaims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            name: claims.name,
            picture: claims.picture,
        }
    }
}
