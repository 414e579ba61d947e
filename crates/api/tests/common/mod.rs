#![allow(dead_code)]

use api::{build_app, AppState, AuthState};
use axum_test::TestServer;
use config::{AgentBackendConfig, OAuthConfig, WebappConfig};
use services::{
    agents::AgentService,
    auth::{
        AuthService, AuthorizationProvider, EnvironmentProvider, MockIdentityProvider,
        SessionTokens, UserInfo,
    },
    test_utils::InMemoryAgentBackend,
};
use std::{path::PathBuf, sync::Arc};
use tempfile::TempDir;

pub const JWT_SECRET: &str = "test-signing-secret";
pub const DEFAULT_AGENT_ID: &str = "agent-1";

pub struct TestApp {
    pub server: TestServer,
    pub backend: Arc<InMemoryAgentBackend>,
    pub debug_log_file: PathBuf,
    _dir: TempDir,
}

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::level_filters::LevelFilter::DEBUG)
        .try_init();
}

pub fn oauth_config() -> OAuthConfig {
    OAuthConfig {
        client_id: "test-client".to_string(),
        client_secret: "test-secret".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_algorithm: "HS256".to_string(),
        jwt_expiration_hours: 24,
        redirect_uri: None,
        http_timeout_secs: 5,
    }
}

pub fn alice() -> UserInfo {
    UserInfo {
        id: "google-alice".to_string(),
        email: "alice@example.com".to_string(),
        name: Some("Alice".to_string()),
        picture: Some("https://example.com/alice.png".to_string()),
        email_verified: true,
    }
}

pub fn mallory() -> UserInfo {
    UserInfo {
        id: "google-mallory".to_string(),
        email: "mallory@example.com".to_string(),
        name: Some("Mallory".to_string()),
        picture: None,
        email_verified: true,
    }
}

/// Session token signed the same way the server signs them.
pub fn session_token(user: &UserInfo) -> String {
    SessionTokens::new(JWT_SECRET, "HS256", 24)
        .unwrap()
        .issue(user)
        .unwrap()
}

/// Identity provider that signs in `user`; the consent URL echoes redirect_uri and state.
pub fn identity_for(user: UserInfo) -> MockIdentityProvider {
    let mut identity = MockIdentityProvider::new();
    identity
        .expect_authorization_url()
        .returning(|redirect_uri, state| {
            Ok(format!(
                "https://idp.test/auth?redirect_uri={}&state={state}",
                urlencoding::encode(redirect_uri)
            ))
        });
    identity
        .expect_exchange_code()
        .returning(|_, _| Ok("provider-access-token".to_string()));
    identity
        .expect_fetch_user_info()
        .returning(move |_| Ok(user.clone()));
    identity
}

fn build(auth: Option<AuthState>) -> TestApp {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(InMemoryAgentBackend::with_agent(DEFAULT_AGENT_ID, "Nameless"));
    let agents = AgentService::new(backend.clone(), AgentBackendConfig::default());

    let debug_log_file = dir.path().join("debug.jsonl");
    let webapp = WebappConfig {
        default_agent_id: Some(DEFAULT_AGENT_ID.to_string()),
        default_project_id: Some("project-1".to_string()),
        debug_log_file: debug_log_file.clone(),
        static_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets"),
    };

    let app = build_app(AppState::new(agents, webapp), auth);
    TestServer::new(app)
        .map(|server| TestApp {
            server,
            backend,
            debug_log_file,
            _dir: dir,
        })
        .unwrap()
}

/// Server with sign-in disabled.
pub fn setup_open_server() -> TestApp {
    build(None)
}

/// Server gated by Google sign-in with `authorized_users` as the allow-list.
pub fn setup_gated_server(authorized_users: &str, identity: MockIdentityProvider) -> TestApp {
    let service = AuthService::new(&oauth_config(), Arc::new(identity)).unwrap();
    let authorization: Arc<dyn AuthorizationProvider> =
        Arc::new(EnvironmentProvider::from_list(authorized_users));
    build(Some(AuthState {
        service: Arc::new(service),
        authorization,
    }))
}

/// Query parameter `name` of a redirect target.
pub fn query_param(location: &str, name: &str) -> Option<String> {
    let url = url::Url::parse(location)
        .or_else(|_| url::Url::parse("http://localhost").and_then(|base| base.join(location)))
        .unwrap();
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
