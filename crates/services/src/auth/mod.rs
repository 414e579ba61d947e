pub mod authorization;
pub mod oauth;
pub mod ports;
pub mod session;
pub mod state;

pub use authorization::{provider_for, AllowAllProvider, EnvironmentProvider, YamlFileProvider};
pub use oauth::{GoogleEndpoints, GoogleIdentityProvider};
pub use ports::*;
pub use session::SessionTokens;
pub use state::OAuthStateStore;

use config::OAuthConfig;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "modaletta_auth";

/// Path the provider redirects back to.
pub const CALLBACK_PATH: &str = "/auth/callback";

/// Query parameters the provider appends to the callback URL.
#[derive(Debug, Clone, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// A completed login, ready to be written into the session cookie.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub token: String,
    pub user: UserInfo,
    pub max_age_secs: i64,
}

/// Google sign-in flow: CSRF state, code exchange and session tokens.
pub struct AuthService {
    identity: Arc<dyn IdentityProvider>,
    states: OAuthStateStore,
    tokens: SessionTokens,
    redirect_uri: Option<String>,
}

impl AuthService {
    pub fn new(config: &OAuthConfig, identity: Arc<dyn IdentityProvider>) -> Result<Self, AuthError> {
        Ok(Self {
            identity,
            states: OAuthStateStore::default(),
            tokens: SessionTokens::from_config(config)?,
            redirect_uri: config.redirect_uri.clone(),
        })
    }

    /// Service talking to Google's production endpoints.
    pub fn google(config: &OAuthConfig) -> Result<Self, AuthError> {
        let identity = Arc::new(GoogleIdentityProvider::new(config)?);
        Self::new(config, identity)
    }

    /// Configured callback URL, or one built from the request's scheme and host.
    pub fn callback_url(&self, scheme: &str, host: &str) -> String {
        match &self.redirect_uri {
            Some(uri) => uri.clone(),
            None => format!("{scheme}://{host}{CALLBACK_PATH}"),
        }
    }

    /// Register a fresh state and return the provider consent URL.
    pub async fn begin_login(&self, callback_url: &str) -> Result<String, AuthError> {
        let state = self.states.generate().await;
        debug!(callback_url, "Starting OAuth login");
        self.identity.authorization_url(callback_url, &state)
    }

    /// Run the callback steps in order, stopping at the first failure.
    pub async fn complete_login(
        &self,
        params: CallbackParams,
        callback_url: &str,
    ) -> Result<LoginSession, AuthError> {
        if let Some(error) = params.error.filter(|e| !e.is_empty()) {
            info!(error = %error, "OAuth provider returned an error");
            return Err(AuthError::ProviderError(error));
        }

        let (code, state) = match (params.code, params.state) {
            (Some(code), Some(state)) if !code.is_empty() && !state.is_empty() => (code, state),
            _ => return Err(AuthError::MissingParameters),
        };

        if !self.states.validate(&state).await {
            return Err(AuthError::InvalidState);
        }

        let result = self.finish_login(&code, callback_url).await;
        if let Err(e) = &result {
            error!(error = %e, "OAuth callback failed");
        }
        result
    }

    async fn finish_login(&self, code: &str, callback_url: &str) -> Result<LoginSession, AuthError> {
        let access_token = self.identity.exchange_code(code, callback_url).await?;
        let user = self.identity.fetch_user_info(&access_token).await?;
        let token = self.tokens.issue(&user)?;

        info!(email = %user.email, "User signed in");

        Ok(LoginSession {
            token,
            user,
            max_age_secs: self.tokens.lifetime_secs(),
        })
    }

    /// Claims for a valid, unexpired token.
    pub fn authenticate(&self, token: &str) -> Option<SessionClaims> {
        self.tokens.verify(token)
    }
}
