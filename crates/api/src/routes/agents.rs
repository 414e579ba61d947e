use crate::{
    middleware::AuthenticatedUser,
    models::{
        AgentSummary, ChatRequest, ChatResponse, ErrorResponse, ProjectQuery,
        WebappConfigResponse,
    },
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use services::agents::{AgentError, AgentMemory};
use tracing::{debug, error};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

/// Unknown agents are a 404; every other backend failure is a 502.
fn map_agent_error(e: AgentError) -> (StatusCode, Json<ErrorResponse>) {
    match e {
        AgentError::NotFound(id) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("Agent not found: {id}"))),
        ),
        other => {
            error!(error = %other, "Agent backend call failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse::new(other.to_string())),
            )
        }
    }
}

/// Frontend defaults
#[utoipa::path(
    get,
    path = "/api/config",
    responses((status = 200, description = "Default agent and project", body = WebappConfigResponse)),
    tag = "Agents"
)]
pub async fn get_config(State(state): State<AppState>) -> Json<WebappConfigResponse> {
    Json(WebappConfigResponse {
        default_agent_id: state.webapp.default_agent_id.clone(),
        default_project_id: state.webapp.default_project_id.clone(),
    })
}

/// List agents
#[utoipa::path(
    get,
    path = "/api/agents",
    params(ProjectQuery),
    responses(
        (status = 200, description = "Agents visible to the backend key", body = Vec<AgentSummary>),
        (status = 502, description = "Agent backend error", body = ErrorResponse),
    ),
    tag = "Agents"
)]
pub async fn list_agents(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<Vec<AgentSummary>> {
    let agents = state
        .agents
        .list_agents(query.project_id)
        .await
        .map_err(map_agent_error)?;
    Ok(Json(agents.into_iter().map(AgentSummary::from).collect()))
}

/// Send a chat message
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Messages produced by the agent", body = ChatResponse),
        (status = 404, description = "Unknown agent", body = ErrorResponse),
        (status = 502, description = "Agent backend error", body = ErrorResponse),
    ),
    tag = "Agents"
)]
pub async fn send_message(
    State(state): State<AppState>,
    user: Option<Extension<AuthenticatedUser>>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    debug!(
        agent_id = %request.agent_id,
        project_id = request.project_id.as_deref(),
        role = %request.role,
        user = user.as_ref().map(|Extension(u)| u.0.email.as_str()),
        "Relaying chat message"
    );

    let messages = state
        .agents
        .for_project(request.project_id.as_deref())
        .send_message(&request.agent_id, request.role, &request.message)
        .await
        .map_err(map_agent_error)?;
    Ok(Json(ChatResponse { messages }))
}

/// Core memory blocks of an agent
#[utoipa::path(
    get,
    path = "/api/agents/{agent_id}/memory",
    params(
        ("agent_id" = String, Path, description = "Agent id"),
        ProjectQuery,
    ),
    responses(
        (status = 200, description = "Memory keyed by block label", body = std::collections::BTreeMap<String, String>),
        (status = 404, description = "Unknown agent", body = ErrorResponse),
        (status = 502, description = "Agent backend error", body = ErrorResponse),
    ),
    tag = "Agents"
)]
pub async fn get_agent_memory(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<AgentMemory> {
    let memory = state
        .agents
        .for_project(query.project_id.as_deref())
        .get_memory(&agent_id)
        .await
        .map_err(map_agent_error)?;
    Ok(Json(memory))
}
