// ABOUTME: OAuth 2.0 and OpenID Connect protocol route handlers
// ABOUTME: /authorize, /consent, /token, /userinfo, discovery, and JWKS endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! OAuth 2.0 server routes
//!
//! Engine outcomes map to the wire as follows: `LoginRequired` redirects to
//! `/auth/login` with the original request in `next`, `ConsentRequired`
//! returns the consent prompt as JSON, `Issued` and redirected errors send a
//! `302` to the client, and direct errors render as an OAuth JSON error body.

use super::{bearer_token, client_ip, enforce_rate_limit, session_id};
use crate::context::ServerResources;
use crate::errors::AppError;
use crate::oauth2_server::{
    AuthorizationOutcome, AuthorizeRequest, ConsentDecision, OAuth2Error, RateLimitedEndpoint,
    TokenRequest,
};
use axum::{
    extract::{rejection::FormRejection, rejection::QueryRejection, ConnectInfo, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;
use url::form_urlencoded;

/// `POST /consent` form body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsentForm {
    /// Client being approved
    #[serde(default)]
    pub client_id: String,
    /// Space-separated scope shown on the consent screen
    #[serde(default)]
    pub scope: String,
    /// Redirect URI from the original request
    #[serde(default)]
    pub redirect_uri: String,
    /// State from the original request
    #[serde(default)]
    pub state: Option<String>,
    /// Nonce from the original request
    #[serde(default)]
    pub nonce: Option<String>,
    /// PKCE challenge from the original request
    #[serde(default)]
    pub code_challenge: Option<String>,
    /// PKCE method from the original request
    #[serde(default)]
    pub code_challenge_method: Option<String>,
    /// User decision
    #[serde(default)]
    pub consent: String,
}

impl ConsentForm {
    /// Whether the submitted `consent` value approves the request
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(
            self.consent.trim().to_ascii_lowercase().as_str(),
            "true" | "allow" | "approve" | "yes" | "on"
        )
    }

    fn into_decision(self) -> ConsentDecision {
        let granted = self.is_granted();
        ConsentDecision {
            client_id: self.client_id,
            scope: self.scope,
            redirect_uri: self.redirect_uri,
            state: self.state,
            nonce: self.nonce,
            code_challenge: self.code_challenge,
            code_challenge_method: self.code_challenge_method,
            granted,
        }
    }
}

fn found(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

fn no_store(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

/// `/auth/login?next=...` pointing back at the original authorization request
fn login_redirect(request: &AuthorizeRequest) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query
        .append_pair("response_type", &request.response_type)
        .append_pair("client_id", &request.client_id)
        .append_pair("redirect_uri", &request.redirect_uri);
    for (name, value) in [
        ("scope", &request.scope),
        ("state", &request.state),
        ("nonce", &request.nonce),
        ("code_challenge", &request.code_challenge),
        ("code_challenge_method", &request.code_challenge_method),
    ] {
        if let Some(value) = value {
            query.append_pair(name, value);
        }
    }
    let next = format!("/authorize?{}", query.finish());
    format!("/auth/login?next={}", urlencoding::encode(&next))
}

fn render_outcome(outcome: AuthorizationOutcome) -> Response {
    if let Some(location) = outcome.redirect_location() {
        return found(location);
    }
    match outcome {
        AuthorizationOutcome::LoginRequired { request } => found(login_redirect(&request)),
        AuthorizationOutcome::ConsentRequired(prompt) => no_store(Json(*prompt).into_response()),
        AuthorizationOutcome::Error { error, .. } => error.into_response(),
        // A redirect URI that cannot carry parameters never passes registration checks
        AuthorizationOutcome::Issued { .. } => OAuth2Error::server_error().into_response(),
    }
}

/// Fill client credentials from `Authorization: Basic`
///
/// Credentials are `urlencoded(client_id):urlencoded(client_secret)` per
/// RFC 6749 section 2.3.1.
fn apply_basic_auth(headers: &HeaderMap, request: &mut TokenRequest) -> Result<(), OAuth2Error> {
    let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        return Ok(());
    };
    let Some((scheme, encoded)) = value.split_once(' ') else {
        return Err(OAuth2Error::invalid_client());
    };
    if !scheme.eq_ignore_ascii_case("basic") {
        return Ok(());
    }

    let decoded = STANDARD
        .decode(encoded.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(OAuth2Error::invalid_client)?;
    let (raw_id, raw_secret) = decoded
        .split_once(':')
        .ok_or_else(OAuth2Error::invalid_client)?;
    let client_id = urlencoding::decode(raw_id).map_err(|_| OAuth2Error::invalid_client())?;
    let client_secret =
        urlencoding::decode(raw_secret).map_err(|_| OAuth2Error::invalid_client())?;

    if request.client_secret.is_some() {
        return Err(OAuth2Error::invalid_request(
            "Use only one client authentication method",
        ));
    }
    if request
        .client_id
        .as_deref()
        .is_some_and(|form_id| form_id != client_id)
    {
        return Err(OAuth2Error::invalid_request("client_id does not match"));
    }

    request.client_id = Some(client_id.into_owned());
    request.client_secret = Some(client_secret.into_owned());
    Ok(())
}

/// OAuth 2.0 routes implementation
pub struct OAuth2Routes;

impl OAuth2Routes {
    /// Create all OAuth 2.0 and discovery routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/authorize", get(Self::handle_authorize))
            .route("/consent", post(Self::handle_consent))
            .route("/token", post(Self::handle_token))
            .route(
                "/userinfo",
                get(Self::handle_userinfo).post(Self::handle_userinfo),
            )
            .route(
                "/.well-known/openid-configuration",
                get(Self::handle_discovery),
            )
            .route("/.well-known/jwks.json", get(Self::handle_jwks))
            .with_state(resources)
    }

    async fn handle_authorize(
        State(resources): State<Arc<ServerResources>>,
        connect_info: Option<ConnectInfo<SocketAddr>>,
        headers: HeaderMap,
        query: Result<Query<AuthorizeRequest>, QueryRejection>,
    ) -> Response {
        let ip = client_ip(connect_info.as_ref());
        if let Err(error) =
            enforce_rate_limit(&resources, RateLimitedEndpoint::Authorize, &ip).await
        {
            return error.into_response();
        }

        let Query(request) = match query {
            Ok(query) => query,
            Err(rejection) => {
                debug!(error = %rejection, "Unparseable authorization request");
                return OAuth2Error::invalid_request("Malformed authorization request")
                    .into_response();
            }
        };

        let user = match resources
            .sessions
            .current_user(session_id(&headers).as_deref(), bearer_token(&headers))
            .await
        {
            Ok(user) => user,
            Err(e) => return e.into_response(),
        };

        let outcome = resources
            .authorization
            .handle_authorization_request(request, user.map(|u| u.id))
            .await;
        render_outcome(outcome)
    }

    async fn handle_consent(
        State(resources): State<Arc<ServerResources>>,
        connect_info: Option<ConnectInfo<SocketAddr>>,
        headers: HeaderMap,
        form: Result<Form<ConsentForm>, FormRejection>,
    ) -> Response {
        let ip = client_ip(connect_info.as_ref());
        if let Err(error) =
            enforce_rate_limit(&resources, RateLimitedEndpoint::Authorize, &ip).await
        {
            return error.into_response();
        }

        let Ok(Form(form)) = form else {
            return OAuth2Error::invalid_request("Malformed consent form").into_response();
        };

        let user = match resources
            .sessions
            .current_user(session_id(&headers).as_deref(), bearer_token(&headers))
            .await
        {
            Ok(Some(user)) => user,
            Ok(None) => return AppError::auth_required().into_response(),
            Err(e) => return e.into_response(),
        };

        let outcome = resources
            .authorization
            .handle_consent(form.into_decision(), user.id)
            .await;
        render_outcome(outcome)
    }

    async fn handle_token(
        State(resources): State<Arc<ServerResources>>,
        connect_info: Option<ConnectInfo<SocketAddr>>,
        headers: HeaderMap,
        form: Result<Form<TokenRequest>, FormRejection>,
    ) -> Response {
        let ip = client_ip(connect_info.as_ref());
        if let Err(error) = enforce_rate_limit(&resources, RateLimitedEndpoint::Token, &ip).await
        {
            return error.into_response();
        }

        let Ok(Form(mut request)) = form else {
            return OAuth2Error::invalid_request("Token requests must be form encoded")
                .into_response();
        };
        if let Err(error) = apply_basic_auth(&headers, &mut request) {
            return error.into_response();
        }

        match resources.token_exchange.handle_token_request(request).await {
            Ok(response) => no_store(Json(response).into_response()),
            Err(error) => error.into_response(),
        }
    }

    async fn handle_userinfo(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Response {
        let Some(token) = bearer_token(&headers) else {
            return OAuth2Error::invalid_token().into_response();
        };
        match resources.token_exchange.get_user_info(token).await {
            Ok(info) => no_store(Json(info).into_response()),
            Err(error) => error.into_response(),
        }
    }

    async fn handle_discovery(State(resources): State<Arc<ServerResources>>) -> Response {
        match resources
            .token_exchange
            .get_openid_configuration(&resources.config.base_url)
        {
            Ok(document) => Json(document).into_response(),
            Err(error) => error.into_response(),
        }
    }

    async fn handle_jwks(State(resources): State<Arc<ServerResources>>) -> Response {
        (
            [(header::CACHE_CONTROL, "public, max-age=3600")],
            Json(resources.jwks.jwks()),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consent_values() {
        for value in ["true", "Allow", "approve", "yes", "on"] {
            let form = ConsentForm {
                consent: value.to_owned(),
                ..ConsentForm::default()
            };
            assert!(form.is_granted(), "{value} should grant");
        }
        let denied = ConsentForm {
            consent: "deny".to_owned(),
            ..ConsentForm::default()
        };
        assert!(!denied.is_granted());
    }

    #[test]
    fn test_login_redirect_preserves_request() {
        let request = AuthorizeRequest {
            response_type: "code".to_owned(),
            client_id: "c1".to_owned(),
            redirect_uri: "https://app.example/cb".to_owned(),
            state: Some("s1".to_owned()),
            ..AuthorizeRequest::default()
        };
        let location = login_redirect(&request);
        assert!(location.starts_with("/auth/login?next=%2Fauthorize%3F"));
        assert!(location.contains("state%3Ds1"));
        assert!(!location.contains("nonce"));
    }

    #[test]
    fn test_basic_auth_is_decoded() {
        let mut headers = HeaderMap::new();
        let encoded = STANDARD.encode("c1:s%3Acret");
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
        );
        let mut request = TokenRequest::default();
        apply_basic_auth(&headers, &mut request).unwrap();
        assert_eq!(request.client_id.as_deref(), Some("c1"));
        assert_eq!(request.client_secret.as_deref(), Some("s:cret"));
    }

    #[test]
    fn test_basic_auth_conflicting_client_id() {
        let mut headers = HeaderMap::new();
        let encoded = STANDARD.encode("c1:secret");
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
        );
        let mut request = TokenRequest {
            client_id: Some("c2".to_owned()),
            ..TokenRequest::default()
        };
        assert!(apply_basic_auth(&headers, &mut request).is_err());
    }
}
