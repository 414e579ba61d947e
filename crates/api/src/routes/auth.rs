use crate::{
    middleware::extract_token,
    models::{AuthStatusResponse, CurrentUserResponse, ErrorResponse, SessionUser},
    AuthState,
};
use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;
use services::auth::{CallbackParams, SESSION_COOKIE};
use tracing::{debug, error};
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl From<CallbackQuery> for CallbackParams {
    fn from(query: CallbackQuery) -> Self {
        Self {
            code: query.code,
            state: query.state,
            error: query.error,
        }
    }
}

/// Scheme and host the browser used, honouring reverse-proxy headers.
fn request_origin(headers: &HeaderMap) -> (String, String) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let scheme = header("x-forwarded-proto").unwrap_or_else(|| "http".to_string());
    let host = header("x-forwarded-host")
        .or_else(|| header("host"))
        .unwrap_or_else(|| "localhost".to_string());
    (scheme, host)
}

pub fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!("{SESSION_COOKIE}={token}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={max_age_secs}")
}

pub fn cleared_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0")
}

/// Start Google sign-in
#[utoipa::path(
    get,
    path = "/auth/login",
    responses(
        (status = 307, description = "Redirect to the Google consent screen"),
        (status = 500, description = "Login could not be started", body = ErrorResponse),
    ),
    tag = "Auth"
)]
pub async fn login(State(state): State<AuthState>, headers: HeaderMap) -> Response {
    let (scheme, host) = request_origin(&headers);
    let callback_url = state.service.callback_url(&scheme, &host);

    match state.service.begin_login(&callback_url).await {
        Ok(url) => Redirect::temporary(&url).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to build authorization URL");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to start login")),
            )
                .into_response()
        }
    }
}

/// Google redirect target
///
/// Always answers with a redirect: `/` with the session cookie on success,
/// `/?auth_error=<reason>` otherwise.
#[utoipa::path(
    get,
    path = "/auth/callback",
    params(CallbackQuery),
    responses(
        (status = 307, description = "Redirect to the app, with a session cookie or an auth_error marker"),
    ),
    tag = "Auth"
)]
pub async fn oauth_callback(
    State(state): State<AuthState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let (scheme, host) = request_origin(&headers);
    let callback_url = state.service.callback_url(&scheme, &host);

    match state.service.complete_login(query.into(), &callback_url).await {
        Ok(session) => {
            debug!(email = %session.user.email, "Setting session cookie");
            (
                [(SET_COOKIE, session_cookie(&session.token, session.max_age_secs))],
                Redirect::temporary("/"),
            )
                .into_response()
        }
        Err(e) => Redirect::temporary(&format!(
            "/?auth_error={}",
            urlencoding::encode(e.redirect_marker())
        ))
        .into_response(),
    }
}

/// Clear the session cookie
#[utoipa::path(
    get,
    path = "/auth/logout",
    responses((status = 307, description = "Redirect to the app with the session cookie cleared")),
    tag = "Auth"
)]
pub async fn logout() -> Response {
    ([(SET_COOKIE, cleared_session_cookie())], Redirect::temporary("/")).into_response()
}

/// Whether the caller holds a valid session
#[utoipa::path(
    get,
    path = "/auth/status",
    responses((status = 200, description = "Session status", body = AuthStatusResponse)),
    tag = "Auth"
)]
pub async fn auth_status(State(state): State<AuthState>, headers: HeaderMap) -> Json<AuthStatusResponse> {
    let claims = extract_token(&headers).and_then(|token| state.service.authenticate(&token));
    Json(AuthStatusResponse {
        authenticated: claims.is_some(),
        user: claims.as_ref().map(SessionUser::from),
    })
}

/// Profile of the signed-in user
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user", body = CurrentUserResponse),
        (status = 401, description = "No valid session", body = ErrorResponse),
    ),
    tag = "Auth"
)]
pub async fn current_user(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<Json<CurrentUserResponse>, (StatusCode, Json<ErrorResponse>)> {
    extract_token(&headers)
        .and_then(|token| state.service.authenticate(&token))
        .map(|claims| Json(claims.into()))
        .ok_or((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("Not authenticated")),
        ))
}
