use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[cfg(any(test, feature = "test-mocks"))]
use mockall::automock;

/// Profile returned by the identity provider after a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

/// Claims carried by a session token. Stateless: nothing is stored server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

// Error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The provider redirected back with an `error` parameter.
    #[error("Provider returned error: {0}")]
    ProviderError(String),

    #[error("Missing code or state parameter")]
    MissingParameters,

    #[error("Invalid state parameter")]
    InvalidState,

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("User info request failed: {0}")]
    UserInfo(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to issue session token: {0}")]
    TokenIssue(String),

    #[error("Failed to load authorized users: {0}")]
    AllowListLoad(String),
}

impl AuthError {
    /// Marker placed in `/?auth_error=` when a login callback fails.
    ///
    /// Protocol violations get their own marker; every upstream or internal
    /// failure collapses into `callback_failed`.
    pub fn redirect_marker(&self) -> &str {
        match self {
            Self::ProviderError(code) => code,
            Self::MissingParameters => "missing_params",
            Self::InvalidState => "invalid_state",
            _ => "callback_failed",
        }
    }
}

/// External OAuth2 identity provider (Google).
#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is sent to for consent.
    fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, AuthError>;

    /// Trade an authorization code for an access token.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, AuthError>;

    async fn fetch_user_info(&self, access_token: &str) -> Result<UserInfo, AuthError>;
}

/// Answers "is this email allowed in?".
pub trait AuthorizationProvider: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// Case-insensitive membership check.
    fn is_authorized(&self, email: &str) -> bool;

    /// Sorted allow-list; allow-all reports `["*"]`.
    fn list_authorized(&self) -> BTreeSet<String>;

    /// Re-read the backing source. No-op for static providers.
    fn reload(&self) -> Result<usize, AuthError> {
        Ok(self.list_authorized().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_markers() {
        assert_eq!(
            AuthError::ProviderError("access_denied".into()).redirect_marker(),
            "access_denied"
        );
        assert_eq!(AuthError::MissingParameters.redirect_marker(), "missing_params");
        assert_eq!(AuthError::InvalidState.redirect_marker(), "invalid_state");
        assert_eq!(
            AuthError::TokenExchange("400 Bad Request".into()).redirect_marker(),
            "callback_failed"
        );
        assert_eq!(
            AuthError::NetworkError("timeout".into()).redirect_marker(),
            "callback_failed"
        );
    }

    #[test]
    fn test_user_info_defaults_unverified() {
        let user: UserInfo =
            serde_json::from_str(r#"{"id":"1","email":"a@example.com","name":null,"picture":null}"#)
                .unwrap();
        assert!(!user.email_verified);
    }
}
