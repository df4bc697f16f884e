// ABOUTME: Route module organization for the SSO server HTTP endpoints
// ABOUTME: Assembles the OAuth, login, and health routers and shared request helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Route module for the SSO server
//!
//! Handlers stay thin: they extract request data, call an engine, and map
//! the typed outcome to a wire response.

/// First-party login, refresh and logout routes
pub mod auth;
/// Health check routes
pub mod health;
/// OAuth 2.0 and OpenID Connect protocol routes
pub mod oauth2;

pub use auth::AuthRoutes;
pub use health::HealthRoutes;
pub use oauth2::OAuth2Routes;

use crate::constants::oauth::SESSION_COOKIE_NAME;
use crate::context::ServerResources;
use crate::oauth2_server::{OAuth2Error, RateLimitStatus, RateLimitedEndpoint};
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// `req_<uuid>` ids for requests that arrive without one
#[derive(Clone, Copy, Default)]
struct RequestIdGenerator;

impl MakeRequestId for RequestIdGenerator {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&format!("req_{}", Uuid::new_v4().simple()))
            .ok()
            .map(RequestId::new)
    }
}

/// Build the complete application router
pub fn router(resources: Arc<ServerResources>) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    Router::new()
        .merge(OAuth2Routes::routes(resources.clone()))
        .merge(AuthRoutes::routes(resources.clone()))
        .merge(HealthRoutes::routes(resources))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), RequestIdGenerator))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                )),
        )
}

/// Rate limiting key for the caller
///
/// Forwarding headers are not trusted; deployments behind a proxy see the
/// proxy address.
pub(crate) fn client_ip(connect_info: Option<&ConnectInfo<SocketAddr>>) -> String {
    connect_info.map_or_else(|| "unknown".to_owned(), |ConnectInfo(addr)| addr.ip().to_string())
}

/// Value of a cookie from the `Cookie` header
pub(crate) fn get_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_owned())
        .filter(|value| !value.is_empty())
}

/// Session id from the session cookie
pub(crate) fn session_id(headers: &HeaderMap) -> Option<String> {
    get_cookie_value(headers, SESSION_COOKIE_NAME)
}

/// Token from an `Authorization: Bearer` header
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then_some(token.trim())
        .filter(|token| !token.is_empty())
}

/// `Set-Cookie` value for a new session
pub(crate) fn session_cookie(session_id: &str, max_age_secs: i64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{SESSION_COOKIE_NAME}={session_id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}{secure}"
    )
}

/// `Set-Cookie` value that removes the session cookie
pub(crate) fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Count the request against `endpoint` and refuse it when over the limit
///
/// A counter that cannot be updated refuses the request as well.
pub(crate) async fn enforce_rate_limit(
    resources: &ServerResources,
    endpoint: RateLimitedEndpoint,
    identifier: &str,
) -> Result<RateLimitStatus, OAuth2Error> {
    match resources
        .rate_limiter
        .check_rate_limit(endpoint, identifier)
        .await
    {
        Ok(status) if status.is_limited => Err(OAuth2Error::rate_limited(
            status.retry_after_seconds.unwrap_or(endpoint.window().as_secs()),
        )),
        Ok(status) => Ok(status),
        Err(e) => {
            warn!(endpoint = %endpoint, error = %e, "Rate limit counter unavailable");
            Err(OAuth2Error::temporarily_unavailable())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_lookup() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session_id=abc123; other=1"),
        );
        assert_eq!(session_id(&headers).as_deref(), Some("abc123"));
        assert_eq!(get_cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_bearer_token_scheme_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer tok"));
        assert_eq!(bearer_token(&headers), Some("tok"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("abc", 60, true);
        assert!(cookie.starts_with("session_id=abc;"));
        assert!(cookie.contains("HttpOnly") && cookie.ends_with("; Secure"));
    }
}
