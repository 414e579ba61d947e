use crate::models::*;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// OpenAPI documentation configuration
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Modaletta API",
        description = "Chat and memory endpoints for Letta agents.\n\n## Authentication\n\nWhen Google sign-in is enabled every endpoint except `/api/health` and `/auth/*` requires a session, sent either as the `modaletta_auth` cookie or as `Authorization: Bearer <token>`.",
        version = "0.1.0",
    ),
    paths(
        crate::routes::health::health_check,
        crate::routes::agents::get_config,
        crate::routes::agents::list_agents,
        crate::routes::agents::send_message,
        crate::routes::agents::get_agent_memory,
        crate::routes::logs::submit_logs,
        crate::routes::logs::get_logs,
        crate::routes::logs::get_log_file,
        crate::routes::auth::login,
        crate::routes::auth::oauth_callback,
        crate::routes::auth::logout,
        crate::routes::auth::auth_status,
        crate::routes::auth::current_user,
    ),
    components(
        schemas(
            ErrorResponse,
            crate::routes::health::HealthResponse,
            WebappConfigResponse, AgentSummary, ChatRequest, ChatResponse,
            SubmitLogsRequest, SubmitLogsResponse, LogFileResponse,
            services::debug_logs::DebugLogEntry,
            services::agents::MessageRole,
            SessionUser, AuthStatusResponse, CurrentUserResponse,
        ),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security configuration for OpenAPI
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(
                    services::auth::SESSION_COOKIE,
                ))),
            );
        }

        openapi.security = Some(vec![
            utoipa::openapi::security::SecurityRequirement::new("bearer", Vec::<String>::new()),
            utoipa::openapi::security::SecurityRequirement::new(
                "session_cookie",
                Vec::<String>::new(),
            ),
        ]);
    }
}
