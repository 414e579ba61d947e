use super::ports::{AuthError, IdentityProvider, UserInfo};
use async_trait::async_trait;
use config::OAuthConfig;
use oauth2::{
    basic::BasicClient, AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    RedirectUrl, RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use reqwest::Client;
use serde::Deserialize;
use std::{borrow::Cow, time::Duration};
use tracing::{debug, info};

// Type alias for a fully configured OAuth client
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    oauth2::EndpointSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointSet,
>;

/// Google OAuth2 endpoints. Overridable so tests can point at a local server.
#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
        }
    }
}

/// Google sign-in via the authorization code flow.
pub struct GoogleIdentityProvider {
    client: ConfiguredClient,
    http_client: Client,
    userinfo_url: String,
}

impl GoogleIdentityProvider {
    pub fn new(config: &OAuthConfig) -> Result<Self, AuthError> {
        Self::with_endpoints(config, GoogleEndpoints::default())
    }

    pub fn with_endpoints(
        config: &OAuthConfig,
        endpoints: GoogleEndpoints,
    ) -> Result<Self, AuthError> {
        let auth_url = AuthUrl::new(endpoints.auth_url)
            .map_err(|e| AuthError::ConfigError(format!("Invalid Google auth URL: {e}")))?;

        let token_url = TokenUrl::new(endpoints.token_url)
            .map_err(|e| AuthError::ConfigError(format!("Invalid Google token URL: {e}")))?;

        // Google expects client credentials in the form body
        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_auth_type(AuthType::RequestBody);

        // Following redirects from the token endpoint would be an SSRF vector
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AuthError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            http_client,
            userinfo_url: endpoints.userinfo_url,
        })
    }
}

fn redirect_url(redirect_uri: &str) -> Result<RedirectUrl, AuthError> {
    RedirectUrl::new(redirect_uri.to_string())
        .map_err(|e| AuthError::ConfigError(format!("Invalid redirect URL: {e}")))
}

fn network_error(e: &reqwest::Error) -> AuthError {
    if e.is_timeout() {
        AuthError::NetworkError("request timed out".to_string())
    } else {
        AuthError::NetworkError(e.to_string())
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, AuthError> {
        let redirect = redirect_url(redirect_uri)?;
        let state = state.to_string();

        let (auth_url, _) = self
            .client
            .authorize_url(move || CsrfToken::new(state))
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .add_extra_param("access_type", "online")
            .add_extra_param("prompt", "select_account")
            .set_redirect_uri(Cow::Owned(redirect))
            .url();

        Ok(auth_url.to_string())
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, AuthError> {
        let redirect = redirect_url(redirect_uri)?;

        debug!("Exchanging Google code for token");

        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_redirect_uri(Cow::Owned(redirect))
            .request_async(&self.http_client)
            .await
            .map_err(|e| match e {
                RequestTokenError::ServerResponse(response) => {
                    AuthError::TokenExchange(format!("provider rejected code: {response}"))
                }
                RequestTokenError::Request(e) => AuthError::NetworkError(e.to_string()),
                RequestTokenError::Parse(e, body) => AuthError::TokenExchange(format!(
                    "unparseable token response ({e}): {}",
                    String::from_utf8_lossy(&body)
                )),
                RequestTokenError::Other(message) => AuthError::TokenExchange(message),
            })?;

        Ok(token.access_token().secret().to_string())
    }

    async fn fetch_user_info(&self, access_token: &str) -> Result<UserInfo, AuthError> {
        let response = self
            .http_client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| network_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::UserInfo(format!(
                "Google API returned status: {status}, body: {body}"
            )));
        }

        let user: GoogleUser = response
            .json()
            .await
            .map_err(|e| AuthError::UserInfo(format!("Failed to parse Google user: {e}")))?;

        let email = user
            .email
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AuthError::UserInfo("Google profile has no email".to_string()))?;

        info!(email = %email, "Google user authenticated");

        Ok(UserInfo {
            id: user.id,
            email,
            name: user.name,
            picture: user.picture,
            email_verified: user.verified_email,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GoogleUser {
    #[serde(alias = "sub")]
    id: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
    #[serde(default, alias = "email_verified")]
    verified_email: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::collections::HashMap;

    fn test_config(timeout_secs: u64) -> OAuthConfig {
        OAuthConfig {
            client_id: "test-client".to_string(),
            client_secret: "test-secret".to_string(),
            jwt_secret: "jwt-secret".to_string(),
            jwt_algorithm: "HS256".to_string(),
            jwt_expiration_hours: 24,
            redirect_uri: None,
            http_timeout_secs: timeout_secs,
        }
    }

    fn provider_for(server: &MockServer, timeout_secs: u64) -> GoogleIdentityProvider {
        GoogleIdentityProvider::with_endpoints(
            &test_config(timeout_secs),
            GoogleEndpoints {
                auth_url: server.url("/o/oauth2/v2/auth"),
                token_url: server.url("/token"),
                userinfo_url: server.url("/oauth2/v2/userinfo"),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_authorization_url_parameters() {
        let provider = GoogleIdentityProvider::new(&test_config(10)).unwrap();
        let url = provider
            .authorization_url("https://app.example.com/auth/callback", "state-123")
            .unwrap();

        let parsed = url::Url::parse(&url).unwrap();
        assert_eq!(parsed.host_str(), Some("accounts.google.com"));
        let params: HashMap<String, String> = parsed.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "test-client");
        assert_eq!(params["redirect_uri"], "https://app.example.com/auth/callback");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "openid email profile");
        assert_eq!(params["state"], "state-123");
        assert_eq!(params["access_type"], "online");
        assert_eq!(params["prompt"], "select_account");
    }

    #[tokio::test]
    async fn test_exchange_code_posts_credentials_in_body() {
        let server = MockServer::start_async().await;
        let token_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/token")
                    .x_www_form_urlencoded_tuple("grant_type", "authorization_code")
                    .x_www_form_urlencoded_tuple("code", "auth-code")
                    .x_www_form_urlencoded_tuple("client_id", "test-client")
                    .x_www_form_urlencoded_tuple("client_secret", "test-secret")
                    .x_www_form_urlencoded_tuple(
                        "redirect_uri",
                        "http://localhost/auth/callback",
                    );
                then.status(200).json_body(serde_json::json!({
                    "access_token": "ya29.access",
                    "token_type": "Bearer",
                    "expires_in": 3599
                }));
            })
            .await;

        let provider = provider_for(&server, 5);
        let token = provider
            .exchange_code("auth-code", "http://localhost/auth/callback")
            .await
            .unwrap();

        token_mock.assert_async().await;
        assert_eq!(token, "ya29.access");
    }

    #[tokio::test]
    async fn test_exchange_code_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(400).json_body(serde_json::json!({
                    "error": "invalid_grant",
                    "error_description": "Bad Request"
                }));
            })
            .await;

        let provider = provider_for(&server, 5);
        let err = provider
            .exchange_code("stale-code", "http://localhost/auth/callback")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::TokenExchange(_)));
        assert_eq!(err.redirect_marker(), "callback_failed");
    }

    #[tokio::test]
    async fn test_fetch_user_info() {
        let server = MockServer::start_async().await;
        let userinfo_mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/oauth2/v2/userinfo")
                    .header("authorization", "Bearer ya29.access");
                then.status(200).json_body(serde_json::json!({
                    "id": "1234567890",
                    "email": "Alice@Example.com",
                    "verified_email": true,
                    "name": "Alice",
                    "picture": "https://example.com/alice.png"
                }));
            })
            .await;

        let provider = provider_for(&server, 5);
        let user = provider.fetch_user_info("ya29.access").await.unwrap();

        userinfo_mock.assert_async().await;
        assert_eq!(user.id, "1234567890");
        assert_eq!(user.email, "Alice@Example.com");
        assert_eq!(user.name.as_deref(), Some("Alice"));
        assert!(user.email_verified);
    }

    #[tokio::test]
    async fn test_fetch_user_info_non_200() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/oauth2/v2/userinfo");
                then.status(401).body("invalid token");
            })
            .await;

        let provider = provider_for(&server, 5);
        let err = provider.fetch_user_info("expired").await.unwrap_err();
        match err {
            AuthError::UserInfo(message) => assert!(message.contains("invalid token")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_user_info_timeout() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/oauth2/v2/userinfo");
                then.status(200)
                    .delay(Duration::from_secs(3))
                    .json_body(serde_json::json!({"id": "1", "email": "a@example.com"}));
            })
            .await;

        let provider = provider_for(&server, 1);
        let err = provider.fetch_user_info("token").await.unwrap_err();
        assert!(matches!(err, AuthError::NetworkError(_)));
    }
}
