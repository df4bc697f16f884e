// ABOUTME: HTTP-level tests for the assembled router
// ABOUTME: Drives browser redirects, consent, token, userinfo, discovery, login, and health routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine};
use common::{
    TestServer, ALICE_PASSWORD, ISSUER, WEB_CLIENT_ID, WEB_CLIENT_SECRET, WEB_REDIRECT_URI,
};
use helpers::axum_test::AxumTestRequest;
use serde_json::{json, Value};
use sso_server::routes;
use url::{form_urlencoded, Url};

fn authorize_uri(client_id: &str, scope: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("response_type", "code")
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", WEB_REDIRECT_URI)
        .append_pair("scope", scope)
        .append_pair("state", "abc")
        .finish();
    format!("/authorize?{query}")
}

fn basic_auth(client_id: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{client_id}:{secret}")))
}

fn query_param(location: &str, name: &str) -> Option<String> {
    Url::parse(location)
        .ok()?
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Browser login through the form route; returns the session id from the cookie
async fn browser_login(server: &TestServer) -> String {
    let response = AxumTestRequest::post("/auth/login")
        .form(&[
            ("username", "alice"),
            ("password", ALICE_PASSWORD),
            ("next", "/authorize?client_id=web-app"),
        ])
        .send(routes::router(server.resources.clone()))
        .await;
    assert_eq!(response.status(), 302);
    assert_eq!(response.location(), "/authorize?client_id=web-app");

    let cookie = response.header("set-cookie").unwrap();
    assert!(cookie.contains("HttpOnly") && cookie.contains("Secure"));
    cookie
        .strip_prefix("session_id=")
        .and_then(|rest| rest.split(';').next())
        .unwrap()
        .to_owned()
}

async fn code_via_http(server: &TestServer, session: &str, scope: &str) -> String {
    let response = AxumTestRequest::post("/consent")
        .session(session)
        .form(&[
            ("client_id", WEB_CLIENT_ID),
            ("scope", scope),
            ("redirect_uri", WEB_REDIRECT_URI),
            ("state", "abc"),
            ("consent", "allow"),
        ])
        .send(routes::router(server.resources.clone()))
        .await;
    assert_eq!(response.status(), 302);
    let location = response.location();
    assert_eq!(query_param(&location, "state").as_deref(), Some("abc"));
    query_param(&location, "code").unwrap()
}

// ============================================================================
// /authorize and /consent
// ============================================================================

#[tokio::test]
async fn test_anonymous_authorize_redirects_to_login() -> Result<()> {
    let server = common::build_server().await?;
    let response = AxumTestRequest::get(&authorize_uri(WEB_CLIENT_ID, "openid"))
        .send(routes::router(server.resources.clone()))
        .await;

    assert_eq!(response.status(), 302);
    let location = response.location();
    assert!(location.starts_with("/auth/login?next=%2Fauthorize%3F"));
    assert!(location.contains("client_id%3Dweb-app"));
    Ok(())
}

#[tokio::test]
async fn test_direct_errors_are_json() -> Result<()> {
    let server = common::build_server().await?;
    let response = AxumTestRequest::get(&authorize_uri("ghost", "openid"))
        .send(routes::router(server.resources.clone()))
        .await;

    assert_eq!(response.status(), 401);
    let body: Value = response.json();
    assert_eq!(body["error"], "invalid_client");

    let response = AxumTestRequest::get("/authorize?client_id=web-app")
        .send(routes::router(server.resources.clone()))
        .await;
    assert_eq!(response.status(), 400);
    Ok(())
}

#[tokio::test]
async fn test_authorize_with_session_shows_consent() -> Result<()> {
    let server = common::build_server().await?;
    let session = browser_login(&server).await;

    let response = AxumTestRequest::get(&authorize_uri(WEB_CLIENT_ID, "openid email"))
        .session(&session)
        .send(routes::router(server.resources.clone()))
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.header("cache-control").as_deref(), Some("no-store"));
    let prompt: Value = response.json();
    assert_eq!(prompt["client_id"], WEB_CLIENT_ID);
    assert_eq!(prompt["requested_scopes"], json!(["openid", "email"]));
    assert_eq!(prompt["request"]["state"], "abc");
    Ok(())
}

#[tokio::test]
async fn test_trusted_client_gets_code_redirect() -> Result<()> {
    let server = common::build_server().await?;
    let session = browser_login(&server).await;

    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("response_type", "code")
        .append_pair("client_id", common::SPA_CLIENT_ID)
        .append_pair("redirect_uri", common::SPA_REDIRECT_URI)
        .append_pair("scope", "openid")
        .append_pair("code_challenge", common::PKCE_CHALLENGE)
        .append_pair("code_challenge_method", "S256")
        .finish();
    let response = AxumTestRequest::get(&format!("/authorize?{query}"))
        .session(&session)
        .send(routes::router(server.resources.clone()))
        .await;

    assert_eq!(response.status(), 302);
    let location = response.location();
    assert!(location.starts_with(common::SPA_REDIRECT_URI));
    assert!(query_param(&location, "code").is_some());
    assert!(query_param(&location, "state").is_none());
    Ok(())
}

#[tokio::test]
async fn test_consent_denied_redirects_with_error() -> Result<()> {
    let server = common::build_server().await?;
    let session = browser_login(&server).await;

    let response = AxumTestRequest::post("/consent")
        .session(&session)
        .form(&[
            ("client_id", WEB_CLIENT_ID),
            ("scope", "openid"),
            ("redirect_uri", WEB_REDIRECT_URI),
            ("state", "abc"),
            ("consent", "deny"),
        ])
        .send(routes::router(server.resources.clone()))
        .await;

    assert_eq!(response.status(), 302);
    let location = response.location();
    assert_eq!(query_param(&location, "error").as_deref(), Some("access_denied"));
    assert!(query_param(&location, "code").is_none());
    Ok(())
}

#[tokio::test]
async fn test_consent_requires_login() -> Result<()> {
    let server = common::build_server().await?;
    let response = AxumTestRequest::post("/consent")
        .form(&[
            ("client_id", WEB_CLIENT_ID),
            ("scope", "openid"),
            ("redirect_uri", WEB_REDIRECT_URI),
            ("consent", "allow"),
        ])
        .send(routes::router(server.resources.clone()))
        .await;

    assert_eq!(response.status(), 401);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "AUTH_REQUIRED");
    Ok(())
}

// ============================================================================
// /token and /userinfo
// ============================================================================

#[tokio::test]
async fn test_full_code_flow_over_http() -> Result<()> {
    let server = common::build_server().await?;
    let session = browser_login(&server).await;
    let code = code_via_http(&server, &session, "openid profile email").await;

    let response = AxumTestRequest::post("/token")
        .header("authorization", &basic_auth(WEB_CLIENT_ID, WEB_CLIENT_SECRET))
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", WEB_REDIRECT_URI),
        ])
        .send(routes::router(server.resources.clone()))
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.header("cache-control").as_deref(), Some("no-store"));
    let tokens: Value = response.json();
    assert_eq!(tokens["token_type"], "Bearer");
    assert!(tokens["id_token"].is_string());
    assert!(tokens.get("refresh_token").is_none());
    let access_token = tokens["access_token"].as_str().unwrap();

    let response = AxumTestRequest::get("/userinfo")
        .bearer(access_token)
        .send(routes::router(server.resources.clone()))
        .await;
    assert_eq!(response.status(), 200);
    let info: Value = response.json();
    assert_eq!(info["sub"], server.alice_id().to_string());
    assert_eq!(info["email"], "alice@example.com");
    assert!(info.get("phone_number").is_none());
    Ok(())
}

#[tokio::test]
async fn test_token_endpoint_errors() -> Result<()> {
    let server = common::build_server().await?;

    let response = AxumTestRequest::post("/token")
        .header("authorization", &basic_auth(WEB_CLIENT_ID, "wrong"))
        .form(&[("grant_type", "authorization_code"), ("code", "x")])
        .send(routes::router(server.resources.clone()))
        .await;
    assert_eq!(response.status(), 401);
    assert!(response
        .header("www-authenticate")
        .unwrap()
        .starts_with("Basic"));
    let body: Value = response.json();
    assert_eq!(body["error"], "invalid_client");

    let response = AxumTestRequest::post("/token")
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", "never-issued"),
            ("client_id", WEB_CLIENT_ID),
            ("client_secret", WEB_CLIENT_SECRET),
        ])
        .send(routes::router(server.resources.clone()))
        .await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json();
    assert_eq!(body["error"], "invalid_grant");

    // Basic auth and form secret together are ambiguous
    let response = AxumTestRequest::post("/token")
        .header("authorization", &basic_auth(WEB_CLIENT_ID, WEB_CLIENT_SECRET))
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", "x"),
            ("client_secret", WEB_CLIENT_SECRET),
        ])
        .send(routes::router(server.resources.clone()))
        .await;
    assert_eq!(response.status(), 400);
    Ok(())
}

#[tokio::test]
async fn test_userinfo_requires_bearer() -> Result<()> {
    let server = common::build_server().await?;
    let response = AxumTestRequest::get("/userinfo")
        .send(routes::router(server.resources.clone()))
        .await;

    assert_eq!(response.status(), 401);
    assert!(response
        .header("www-authenticate")
        .unwrap()
        .starts_with("Bearer error=\"invalid_token\""));
    Ok(())
}

// ============================================================================
// Discovery
// ============================================================================

#[tokio::test]
async fn test_discovery_and_jwks() -> Result<()> {
    let server = common::build_server().await?;

    let response = AxumTestRequest::get("/.well-known/openid-configuration")
        .send(routes::router(server.resources.clone()))
        .await;
    assert_eq!(response.status(), 200);
    assert!(response.header("x-request-id").unwrap().starts_with("req_"));
    assert_eq!(response.header("x-content-type-options").as_deref(), Some("nosniff"));
    let document: Value = response.json();
    assert_eq!(document["issuer"], ISSUER);
    assert_eq!(document["token_endpoint"], format!("{ISSUER}/token"));
    assert_eq!(document["jwks_uri"], format!("{ISSUER}/.well-known/jwks.json"));

    let response = AxumTestRequest::get("/.well-known/jwks.json")
        .send(routes::router(server.resources.clone()))
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.header("cache-control").as_deref(),
        Some("public, max-age=3600")
    );
    let jwks: Value = response.json();
    assert_eq!(jwks["keys"][0]["kid"], "test-key");
    assert_eq!(jwks["keys"][0]["alg"], "RS256");
    Ok(())
}

#[tokio::test]
async fn test_incoming_request_id_is_echoed() -> Result<()> {
    let server = common::build_server().await?;
    let response = AxumTestRequest::get("/ready")
        .header("x-request-id", "req_from_gateway")
        .send(routes::router(server.resources.clone()))
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.header("x-request-id").as_deref(), Some("req_from_gateway"));
    Ok(())
}

// ============================================================================
// First-party login API
// ============================================================================

#[tokio::test]
async fn test_json_login_refresh_logout() -> Result<()> {
    let server = common::build_server().await?;

    let response = AxumTestRequest::post("/auth/login")
        .header("accept", "application/json")
        .form(&[("username", "alice"), ("password", ALICE_PASSWORD)])
        .send(routes::router(server.resources.clone()))
        .await;
    assert_eq!(response.status(), 200);
    assert!(response.header("set-cookie").is_none());
    let login: Value = response.json();
    assert_eq!(login["user_id"], server.alice_id().to_string());
    let access_token = login["access_token"].as_str().unwrap().to_owned();
    let refresh_token = login["refresh_token"].as_str().unwrap().to_owned();

    let response = AxumTestRequest::post("/auth/refresh")
        .json(&json!({ "refresh_token": refresh_token }))
        .send(routes::router(server.resources.clone()))
        .await;
    assert_eq!(response.status(), 200);
    let refreshed: Value = response.json();
    assert!(refreshed["access_token"].is_string());

    let response = AxumTestRequest::post("/auth/logout")
        .bearer(&access_token)
        .send(routes::router(server.resources.clone()))
        .await;
    assert_eq!(response.status(), 200);
    assert!(response.header("set-cookie").unwrap().contains("Max-Age=0"));
    let body: Value = response.json();
    assert_eq!(body["revoked_refresh_tokens"], 1);

    let response = AxumTestRequest::post("/auth/refresh")
        .json(&json!({ "refresh_token": refresh_token }))
        .send(routes::router(server.resources.clone()))
        .await;
    assert_eq!(response.status(), 401);
    Ok(())
}

#[tokio::test]
async fn test_failed_login_is_generic() -> Result<()> {
    let server = common::build_server().await?;
    let response = AxumTestRequest::post("/auth/login")
        .header("accept", "application/json")
        .form(&[("username", "alice"), ("password", "wrong")])
        .send(routes::router(server.resources.clone()))
        .await;

    assert_eq!(response.status(), 401);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "AUTH_INVALID");
    assert_eq!(body["error"]["message"], "Invalid username or password");
    Ok(())
}

#[tokio::test]
async fn test_login_page_ignores_off_site_next() -> Result<()> {
    let server = common::build_server().await?;
    let response = AxumTestRequest::get("/auth/login?next=https://evil.example")
        .send(routes::router(server.resources.clone()))
        .await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json();
    assert_eq!(body["next"], "/");
    Ok(())
}

#[tokio::test]
async fn test_login_redirect_refuses_control_characters_in_next() -> Result<()> {
    let server = common::build_server().await?;
    let response = AxumTestRequest::post("/auth/login")
        .form(&[
            ("username", "alice"),
            ("password", ALICE_PASSWORD),
            ("next", "/\t/evil.example/x"),
        ])
        .send(routes::router(server.resources.clone()))
        .await;

    assert_eq!(response.status(), 302);
    assert_eq!(response.location(), "/");
    Ok(())
}

// ============================================================================
// Rate limiting and health
// ============================================================================

#[tokio::test]
async fn test_authorize_is_rate_limited() -> Result<()> {
    let server = common::build_server().await?;
    let uri = authorize_uri(WEB_CLIENT_ID, "openid");

    for _ in 0..20 {
        let response = AxumTestRequest::get(&uri)
            .send(routes::router(server.resources.clone()))
            .await;
        assert_eq!(response.status(), 302);
    }

    let response = AxumTestRequest::get(&uri)
        .send(routes::router(server.resources.clone()))
        .await;
    assert_eq!(response.status(), 429);
    assert_eq!(response.header("retry-after").as_deref(), Some("300"));
    let body: Value = response.json();
    assert_eq!(body["error"], "rate_limited");
    Ok(())
}

#[tokio::test]
async fn test_rate_limits_can_be_disabled() -> Result<()> {
    let mut config = common::test_config();
    config.rate_limit_enabled = false;
    let server = common::build_server_with(config).await?;
    let uri = authorize_uri(WEB_CLIENT_ID, "openid");

    for _ in 0..25 {
        let response = AxumTestRequest::get(&uri)
            .send(routes::router(server.resources.clone()))
            .await;
        assert_eq!(response.status(), 302);
    }
    Ok(())
}

#[tokio::test]
async fn test_health_reports_store_state() -> Result<()> {
    let healthy = common::build_server().await?;
    let response = AxumTestRequest::get("/health")
        .send(routes::router(healthy.resources.clone()))
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");

    let degraded =
        common::build_server_with_store(common::test_config(), common::unreachable_store())?;
    let response = AxumTestRequest::get("/health")
        .send(routes::router(degraded.resources.clone()))
        .await;
    assert_eq!(response.status(), 503);
    let body: Value = response.json();
    assert_eq!(body["store"], "unavailable");
    Ok(())
}

#[tokio::test]
async fn test_store_outage_refuses_oauth_requests() -> Result<()> {
    let server =
        common::build_server_with_store(common::test_config(), common::unreachable_store())?;
    let response = AxumTestRequest::get(&authorize_uri(WEB_CLIENT_ID, "openid"))
        .send(routes::router(server.resources.clone()))
        .await;

    assert_eq!(response.status(), 503);
    let body: Value = response.json();
    assert_eq!(body["error"], "temporarily_unavailable");
    Ok(())
}
