use crate::{models::ErrorResponse, AuthState};
use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        HeaderMap, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use services::auth::{SessionClaims, SESSION_COOKIE};
use tracing::{debug, warn};

/// Claims of the signed-in user, attached to gated requests.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser(pub SessionClaims);

const PUBLIC_PATHS: [&str; 4] = ["/api/health", "/login.html", "/unauthorized.html", "/favicon.ico"];
const PUBLIC_PREFIXES: [&str; 1] = ["/auth/"];

pub fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path) || PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

fn is_api_path(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/")
}

/// Session cookie first, then `Authorization: Bearer`.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Gate every non-public path behind a valid session and the allow-list.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if is_public_path(&path) {
        return next.run(request).await;
    }

    let claims = extract_token(request.headers()).and_then(|token| state.service.authenticate(&token));
    let Some(claims) = claims else {
        debug!(path = %path, "No valid session");
        return unauthenticated(&path);
    };

    if !state.authorization.is_authorized(&claims.email) {
        warn!(
            email = %claims.email,
            path = %path,
            provider = state.authorization.name(),
            "Authenticated user is not authorized"
        );
        return forbidden(&path, &claims.email);
    }

    request.extensions_mut().insert(AuthenticatedUser(claims));
    next.run(request).await
}

fn unauthenticated(path: &str) -> Response {
    if is_api_path(path) {
        (
            StatusCode::UNAUTHORIZED,
            [(WWW_AUTHENTICATE, "Bearer")],
            Json(ErrorResponse::new("Authentication required")),
        )
            .into_response()
    } else {
        Redirect::temporary("/login.html").into_response()
    }
}

fn forbidden(path: &str, email: &str) -> Response {
    if is_api_path(path) {
        (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new(
                "User is not authorized to access this application",
            )),
        )
            .into_response()
    } else {
        Redirect::temporary(&format!(
            "/unauthorized.html?email={}",
            urlencoding::encode(email)
        ))
        .into_response()
    }
}
