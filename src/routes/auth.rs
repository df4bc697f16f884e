// ABOUTME: First-party authentication route handlers for login, token refresh, and logout
// ABOUTME: Issues the session cookie used by /authorize and JSON tokens for API clients
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{
    bearer_token, clear_session_cookie, client_ip, enforce_rate_limit, session_cookie, session_id,
};
use crate::context::ServerResources;
use crate::errors::AppError;
use crate::oauth2_server::{OAuth2Error, RateLimitedEndpoint};
use crate::sessions::LoginTokens;
use axum::{
    extract::{rejection::FormRejection, ConnectInfo, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

/// Login form
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    /// Username or email
    pub username: String,
    /// Password
    pub password: String,
    /// Relative URL to continue to after a browser login
    #[serde(default)]
    pub next: Option<String>,
}

/// JSON login response for API clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Authenticated user
    pub user_id: Uuid,
    /// Token pair
    #[serde(flatten)]
    pub tokens: LoginTokens,
}

/// Refresh request body
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTokenRequest {
    /// First-party refresh token
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct LoginPageQuery {
    #[serde(default)]
    next: Option<String>,
}

/// Only same-origin relative paths are followed after login
///
/// Browsers drop tab, CR and LF from URLs, so `/\t/host` would turn into
/// `//host`; any control character sends the user home instead.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(char::is_control) =>
        {
            path
        }
        _ => "/",
    }
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"))
}

fn rate_limited(error: &OAuth2Error, endpoint: RateLimitedEndpoint) -> Response {
    match error.retry_after_secs {
        Some(retry_after) => {
            let mut response =
                AppError::rate_limit_exceeded(endpoint.max_requests(), retry_after).into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, retry_after.into());
            response
        }
        None => AppError::storage_unavailable("Rate limit counter unavailable").into_response(),
    }
}

/// Authentication routes implementation
pub struct AuthRoutes;

impl AuthRoutes {
    /// Create all first-party authentication routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/auth/login",
                get(Self::handle_login_page).post(Self::handle_login),
            )
            .route("/auth/refresh", post(Self::handle_refresh))
            .route("/auth/logout", post(Self::handle_logout))
            .with_state(resources)
    }

    /// Describes the login form; rendering a page is left to the frontend
    async fn handle_login_page(Query(query): Query<LoginPageQuery>) -> Json<serde_json::Value> {
        Json(json!({
            "login_required": true,
            "method": "POST",
            "action": "/auth/login",
            "fields": ["username", "password", "next"],
            "next": safe_next(query.next.as_deref()),
        }))
    }

    async fn handle_login(
        State(resources): State<Arc<ServerResources>>,
        connect_info: Option<ConnectInfo<SocketAddr>>,
        headers: HeaderMap,
        form: Result<Form<LoginRequest>, FormRejection>,
    ) -> Response {
        let ip = client_ip(connect_info.as_ref());
        if let Err(error) = enforce_rate_limit(&resources, RateLimitedEndpoint::Login, &ip).await {
            return rate_limited(&error, RateLimitedEndpoint::Login);
        }

        let Ok(Form(request)) = form else {
            return AppError::invalid_input("username and password are required").into_response();
        };

        let login = match resources
            .sessions
            .login(&request.username, &request.password)
            .await
        {
            Ok(login) => login,
            Err(e) => return e.into_response(),
        };

        if wants_json(&headers) {
            return Json(LoginResponse {
                user_id: login.user.id,
                tokens: login.tokens,
            })
            .into_response();
        }

        let max_age = resources.config.lifetimes.session_hours * 3600;
        let secure = resources.config.base_url.starts_with("https://");
        (
            StatusCode::FOUND,
            [
                (header::LOCATION, safe_next(request.next.as_deref()).to_owned()),
                (
                    header::SET_COOKIE,
                    session_cookie(&login.session_id, max_age, secure),
                ),
            ],
        )
            .into_response()
    }

    async fn handle_refresh(
        State(resources): State<Arc<ServerResources>>,
        connect_info: Option<ConnectInfo<SocketAddr>>,
        Json(request): Json<RefreshTokenRequest>,
    ) -> Response {
        let ip = client_ip(connect_info.as_ref());
        if let Err(error) = enforce_rate_limit(&resources, RateLimitedEndpoint::Refresh, &ip).await
        {
            return rate_limited(&error, RateLimitedEndpoint::Refresh);
        }

        match resources.sessions.refresh(&request.refresh_token).await {
            Ok(tokens) => Json(tokens).into_response(),
            Err(e) => e.into_response(),
        }
    }

    async fn handle_logout(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Response {
        let session = session_id(&headers);
        match resources
            .sessions
            .logout(session.as_deref(), bearer_token(&headers))
            .await
        {
            Ok(summary) => (
                [(header::SET_COOKIE, clear_session_cookie())],
                Json(json!({
                    "logged_out": true,
                    "revoked_refresh_tokens": summary.revoked_refresh_tokens,
                })),
            )
                .into_response(),
            Err(e) => e.into_response(),
        }
    }
}
