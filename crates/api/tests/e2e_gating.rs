// E2E tests for session gating and the allow-list

mod common;

use axum::http::StatusCode;
use common::*;
use services::auth::SessionTokens;

fn gated() -> TestApp {
    setup_gated_server("alice@example.com", identity_for(alice()))
}

#[tokio::test]
async fn test_health_is_public() {
    let app = gated();
    let response = app.server.get("/api/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_public_pages_served_without_session() {
    let app = gated();

    let login = app.server.get("/login.html").await;
    assert_eq!(login.status_code(), StatusCode::OK);
    assert!(login.text().contains("/auth/login"));

    let unauthorized = app.server.get("/unauthorized.html").await;
    assert_eq!(unauthorized.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_api_without_session_is_401() {
    let app = gated();
    let response = app.server.get("/api/agents").await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.header("www-authenticate"), "Bearer");
    let body: serde_json::Value = response.json();
    assert_eq!(body["detail"], "Authentication required");
}

#[tokio::test]
async fn test_page_without_session_redirects_to_login() {
    let app = gated();

    for path in ["/", "/index.html"] {
        let response = app.server.get(path).await;
        assert_eq!(response.status_code(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.header("location"), "/login.html");
    }
}

#[tokio::test]
async fn test_forged_and_expired_tokens_count_as_no_session() {
    let app = gated();

    let forged = SessionTokens::new("some-other-secret", "HS256", 24)
        .unwrap()
        .issue(&alice())
        .unwrap();
    let expired = SessionTokens::new(JWT_SECRET, "HS256", -1)
        .unwrap()
        .issue(&alice())
        .unwrap();

    for token in [forged.as_str(), expired.as_str(), "not-a-jwt"] {
        let response = app
            .server
            .get("/api/agents")
            .add_header("Authorization", format!("Bearer {token}"))
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_authorized_user_passes_with_bearer_or_cookie() {
    let app = gated();
    let token = session_token(&alice());

    let bearer = app
        .server
        .get("/api/agents")
        .add_header("Authorization", format!("Bearer {token}"))
        .await;
    assert_eq!(bearer.status_code(), StatusCode::OK);

    let cookie = app
        .server
        .get("/")
        .add_header("Cookie", format!("modaletta_auth={token}"))
        .await;
    assert_eq!(cookie.status_code(), StatusCode::OK);
    assert!(cookie.text().contains("Modaletta"));
}

#[tokio::test]
async fn test_cookie_takes_precedence_over_header() {
    let app = gated();
    let alice_token = session_token(&alice());

    let response = app
        .server
        .get("/api/agents")
        .add_header("Cookie", format!("modaletta_auth={alice_token}"))
        .add_header("Authorization", "Bearer garbage")
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = app
        .server
        .get("/api/agents")
        .add_header("Cookie", "modaletta_auth=garbage")
        .add_header("Authorization", format!("Bearer {alice_token}"))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unlisted_user_is_forbidden() {
    let app = gated();
    let token = session_token(&mallory());

    let api = app
        .server
        .get("/api/agents")
        .add_header("Authorization", format!("Bearer {token}"))
        .await;
    assert_eq!(api.status_code(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = api.json();
    assert_eq!(
        body["detail"],
        "User is not authorized to access this application"
    );

    let page = app
        .server
        .get("/")
        .add_header("Cookie", format!("modaletta_auth={token}"))
        .await;
    assert_eq!(page.status_code(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        page.header("location"),
        "/unauthorized.html?email=mallory%40example.com"
    );
}

#[tokio::test]
async fn test_allow_list_match_ignores_case() {
    let app = setup_gated_server(" Alice@Example.com , bob@example.com", identity_for(alice()));
    let token = session_token(&alice());

    let response = app
        .server
        .get("/api/config")
        .add_header("Authorization", format!("Bearer {token}"))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_open_server_has_no_gate_and_no_auth_routes() {
    let app = setup_open_server();

    let agents = app.server.get("/api/agents").await;
    assert_eq!(agents.status_code(), StatusCode::OK);

    let index = app.server.get("/").await;
    assert_eq!(index.status_code(), StatusCode::OK);

    let login = app.server.get("/auth/login").await;
    assert_eq!(login.status_code(), StatusCode::NOT_FOUND);
}
