pub mod middleware;
pub mod models;
pub mod openapi;
pub mod routes;

use crate::{
    middleware::auth_middleware,
    openapi::ApiDoc,
    routes::{
        agents::{get_agent_memory, get_config, list_agents, send_message},
        auth::{auth_status, current_user, login, logout, oauth_callback},
        health::health_check,
        logs::{get_log_file, get_logs, submit_logs},
    },
};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use config::{ApiConfig, WebappConfig};
use services::{
    agents::{AgentError, AgentService},
    auth::{provider_for, AuthError, AuthService, AuthorizationProvider},
    debug_logs::DebugLogStore,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use utoipa::OpenApi;

/// Shared state for the JSON endpoints.
#[derive(Clone)]
pub struct AppState {
    pub agents: AgentService,
    pub debug_logs: Arc<DebugLogStore>,
    pub webapp: Arc<WebappConfig>,
}

impl AppState {
    pub fn new(agents: AgentService, webapp: WebappConfig) -> Self {
        Self {
            agents,
            debug_logs: Arc::new(DebugLogStore::new(webapp.debug_log_file.clone())),
            webapp: Arc::new(webapp),
        }
    }
}

/// Sign-in flow plus the allow-list, present only when auth is enabled.
#[derive(Clone)]
pub struct AuthState {
    pub service: Arc<AuthService>,
    pub authorization: Arc<dyn AuthorizationProvider>,
}

/// Agent facade against the configured Letta server.
pub fn init_app_state(config: &ApiConfig) -> Result<AppState, AgentError> {
    let agents = AgentService::letta(config.agents.clone())?;
    Ok(AppState::new(agents, config.webapp.clone()))
}

/// `None` when Google credentials are not configured.
pub fn init_auth_state(config: &ApiConfig) -> Result<Option<AuthState>, AuthError> {
    let Some(oauth) = config.auth.oauth() else {
        tracing::warn!("Google OAuth not configured, the app is open to anyone who can reach it");
        return Ok(None);
    };

    let service = Arc::new(AuthService::google(oauth)?);
    let authorization = provider_for(&config.authorization);
    tracing::info!(
        provider = authorization.name(),
        authorized = authorization.list_authorized().len(),
        "Google OAuth enabled"
    );
    Ok(Some(AuthState {
        service,
        authorization,
    }))
}

/// Build the complete application router.
///
/// With `auth` present the gate wraps every route, the static fallback included.
pub fn build_app(app_state: AppState, auth: Option<AuthState>) -> Router {
    let static_files =
        ServeDir::new(&app_state.webapp.static_dir).append_index_html_on_directories(true);

    let mut app = Router::new()
        .nest("/api", build_api_routes(app_state))
        .fallback_service(static_files);

    if let Some(auth) = auth {
        app = app
            .nest("/auth", build_auth_routes(auth.clone()))
            .layer(from_fn_with_state(auth, auth_middleware));
    }

    app.layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
}

pub fn build_api_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/config", get(get_config))
        .route("/agents", get(list_agents))
        .route("/agents/{agent_id}/memory", get(get_agent_memory))
        .route("/chat", post(send_message))
        .route("/logs", get(get_logs).post(submit_logs))
        .route("/logs/file", get(get_log_file))
        .route(
            "/openapi.json",
            get(|| async { axum::Json(ApiDoc::openapi()) }),
        )
        .with_state(app_state)
}

pub fn build_auth_routes(auth: AuthState) -> Router {
    Router::new()
        .route("/login", get(login))
        .route("/callback", get(oauth_callback))
        .route("/logout", get(logout))
        .route("/status", get(auth_status))
        .route("/me", get(current_user))
        .with_state(auth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn api_config(pairs: &[(&str, &str)]) -> ApiConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_vars(move |key| map.get(key).cloned(), |_| false).unwrap()
    }

    #[test]
    fn test_no_auth_state_without_credentials() {
        let config = api_config(&[]);
        assert!(init_auth_state(&config).unwrap().is_none());
    }

    #[test]
    fn test_auth_state_from_credentials() {
        let config = api_config(&[
            ("GOOGLE_CLIENT_ID", "client-id"),
            ("GOOGLE_CLIENT_SECRET", "client-secret"),
            ("JWT_SECRET", "signing-secret"),
            ("AUTHORIZED_USERS", "alice@example.com"),
        ]);

        let auth = init_auth_state(&config).unwrap().unwrap();
        assert_eq!(
            auth.service.callback_url("http", "localhost:8000"),
            "http://localhost:8000/auth/callback"
        );
        assert!(auth.authorization.is_authorized("alice@example.com"));
        assert!(!auth.authorization.is_authorized("mallory@example.com"));
    }
}
