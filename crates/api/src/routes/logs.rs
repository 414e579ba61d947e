use crate::{
    models::{ErrorResponse, LogFileResponse, SubmitLogsRequest, SubmitLogsResponse},
    AppState,
};
use axum::{extract::State, http::StatusCode, Json};
use services::debug_logs::DebugLogEntry;
use tracing::error;

/// Store frontend debug logs
#[utoipa::path(
    post,
    path = "/api/logs",
    request_body = SubmitLogsRequest,
    responses(
        (status = 200, description = "Logs stored", body = SubmitLogsResponse),
        (status = 500, description = "Log file could not be written", body = ErrorResponse),
    ),
    tag = "Debug logs"
)]
pub async fn submit_logs(
    State(state): State<AppState>,
    Json(request): Json<SubmitLogsRequest>,
) -> Result<Json<SubmitLogsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let count = state
        .debug_logs
        .append(request.logs, request.session_id.as_deref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to store debug logs");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to store logs")),
            )
        })?;

    Ok(Json(SubmitLogsResponse {
        status: "ok".to_string(),
        count,
    }))
}

/// Logs received since the server started
#[utoipa::path(
    get,
    path = "/api/logs",
    responses((status = 200, description = "Buffered log entries", body = Vec<DebugLogEntry>)),
    tag = "Debug logs"
)]
pub async fn get_logs(State(state): State<AppState>) -> Json<Vec<DebugLogEntry>> {
    Json(state.debug_logs.entries().await)
}

/// Raw lines of the debug log file
#[utoipa::path(
    get,
    path = "/api/logs/file",
    responses((status = 200, description = "Log file lines", body = LogFileResponse)),
    tag = "Debug logs"
)]
pub async fn get_log_file(State(state): State<AppState>) -> Json<LogFileResponse> {
    let logs = state.debug_logs.file_lines().await.unwrap_or_else(|e| {
        error!(error = %e, "Failed to read debug log file");
        Vec::new()
    });
    Json(LogFileResponse {
        count: logs.len(),
        logs,
    })
}
