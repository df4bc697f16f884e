// ABOUTME: OAuth 2.0 / OIDC protocol types: errors, requests, responses, flow outcomes
// ABOUTME: Typed error kinds with HTTP status mapping and RFC 6749 JSON rendering
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::redirect::build_redirect;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;

const RFC6749_AUTHORIZE_ERRORS: &str =
    "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1";
const RFC6749_TOKEN_ERRORS: &str = "https://datatracker.ietf.org/doc/html/rfc6749#section-5.2";
const RFC6750_ERRORS: &str = "https://datatracker.ietf.org/doc/html/rfc6750#section-3.1";

/// OAuth 2.0 error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuth2ErrorKind {
    /// Missing or malformed parameter
    InvalidRequest,
    /// Unknown, inactive, or unauthenticated client
    InvalidClient,
    /// Code or refresh token invalid, expired, replayed, or mismatched
    InvalidGrant,
    /// Client not registered for this grant or response type
    UnauthorizedClient,
    /// Grant type not understood
    UnsupportedGrantType,
    /// Response type not registered for the client
    UnsupportedResponseType,
    /// Scope outside the client's allow-list
    InvalidScope,
    /// User denied consent, or the account cannot be used
    AccessDenied,
    /// Bearer token missing, invalid, expired, or revoked
    InvalidToken,
    /// Internal failure
    ServerError,
    /// Secret store or another dependency is unavailable
    TemporarilyUnavailable,
    /// Redirect URI not in the allow-list; never redirected
    InvalidRedirectUri,
    /// Too many requests from this caller
    RateLimited,
}

impl OAuth2ErrorKind {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::InvalidScope => "invalid_scope",
            Self::AccessDenied => "access_denied",
            Self::InvalidToken => "invalid_token",
            Self::ServerError => "server_error",
            Self::TemporarilyUnavailable => "temporarily_unavailable",
            Self::InvalidRedirectUri => "invalid_redirect_uri",
            Self::RateLimited => "rate_limited",
        }
    }

    /// HTTP status used when the error is returned directly
    #[must_use]
    pub const fn http_status(self) -> StatusCode {
        match self {
            Self::InvalidClient | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::TemporarilyUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidRequest
            | Self::InvalidGrant
            | Self::UnauthorizedClient
            | Self::UnsupportedGrantType
            | Self::UnsupportedResponseType
            | Self::InvalidScope
            | Self::InvalidRedirectUri => StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for OAuth2ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OAuth 2.0 Error Response
///
/// Descriptions are short fixed phrases; nothing internal (store keys, source
/// errors) ever goes into them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OAuth2Error {
    /// Error code
    pub error: OAuth2ErrorKind,
    /// Human-readable error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// URI for error information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
    /// Seconds the caller should wait, for `rate_limited`
    #[serde(skip)]
    pub retry_after_secs: Option<u64>,
}

impl OAuth2Error {
    fn new(error: OAuth2ErrorKind, description: &str, uri: Option<&str>) -> Self {
        Self {
            error,
            error_description: Some(description.to_owned()),
            error_uri: uri.map(str::to_owned),
            retry_after_secs: None,
        }
    }

    /// Create an `invalid_request` error
    #[must_use]
    pub fn invalid_request(description: &str) -> Self {
        Self::new(
            OAuth2ErrorKind::InvalidRequest,
            description,
            Some(RFC6749_AUTHORIZE_ERRORS),
        )
    }

    /// Create an `invalid_client` error
    #[must_use]
    pub fn invalid_client() -> Self {
        Self::new(
            OAuth2ErrorKind::InvalidClient,
            "Client authentication failed",
            Some(RFC6749_TOKEN_ERRORS),
        )
    }

    /// Create an `invalid_grant` error
    #[must_use]
    pub fn invalid_grant(description: &str) -> Self {
        Self::new(
            OAuth2ErrorKind::InvalidGrant,
            description,
            Some(RFC6749_TOKEN_ERRORS),
        )
    }

    /// Create an `unauthorized_client` error
    #[must_use]
    pub fn unauthorized_client(description: &str) -> Self {
        Self::new(
            OAuth2ErrorKind::UnauthorizedClient,
            description,
            Some(RFC6749_AUTHORIZE_ERRORS),
        )
    }

    /// Create an `unsupported_grant_type` error
    #[must_use]
    pub fn unsupported_grant_type() -> Self {
        Self::new(
            OAuth2ErrorKind::UnsupportedGrantType,
            "Grant type not supported",
            Some(RFC6749_TOKEN_ERRORS),
        )
    }

    /// Create an `unsupported_response_type` error
    #[must_use]
    pub fn unsupported_response_type() -> Self {
        Self::new(
            OAuth2ErrorKind::UnsupportedResponseType,
            "Response type not supported for this client",
            Some(RFC6749_AUTHORIZE_ERRORS),
        )
    }

    /// Create an `invalid_scope` error
    #[must_use]
    pub fn invalid_scope(description: &str) -> Self {
        Self::new(
            OAuth2ErrorKind::InvalidScope,
            description,
            Some(RFC6749_AUTHORIZE_ERRORS),
        )
    }

    /// Create an `access_denied` error
    #[must_use]
    pub fn access_denied(description: &str) -> Self {
        Self::new(
            OAuth2ErrorKind::AccessDenied,
            description,
            Some(RFC6749_AUTHORIZE_ERRORS),
        )
    }

    /// Create an `invalid_token` error with the generic description
    #[must_use]
    pub fn invalid_token() -> Self {
        Self::new(
            OAuth2ErrorKind::InvalidToken,
            "The access token is invalid or expired",
            Some(RFC6750_ERRORS),
        )
    }

    /// Create an `invalid_redirect_uri` error
    #[must_use]
    pub fn invalid_redirect_uri() -> Self {
        Self::new(
            OAuth2ErrorKind::InvalidRedirectUri,
            "The redirect_uri is not registered for this client",
            None,
        )
    }

    /// Create a `server_error`
    #[must_use]
    pub fn server_error() -> Self {
        Self::new(
            OAuth2ErrorKind::ServerError,
            "The server encountered an internal error",
            None,
        )
    }

    /// Create a `temporarily_unavailable` error
    #[must_use]
    pub fn temporarily_unavailable() -> Self {
        Self::new(
            OAuth2ErrorKind::TemporarilyUnavailable,
            "The service is temporarily unavailable",
            None,
        )
    }

    /// Create a `rate_limited` error
    #[must_use]
    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self {
            retry_after_secs: Some(retry_after_secs),
            ..Self::new(
                OAuth2ErrorKind::RateLimited,
                "Too many requests, retry later",
                None,
            )
        }
    }
}

impl fmt::Display for OAuth2Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {description}", self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

impl StdError for OAuth2Error {}

impl IntoResponse for OAuth2Error {
    fn into_response(self) -> Response {
        let status = self.error.http_status();
        let challenge = match self.error {
            OAuth2ErrorKind::InvalidClient => Some("Basic realm=\"sso\"".to_owned()),
            OAuth2ErrorKind::InvalidToken => Some(format!(
                "Bearer error=\"invalid_token\", error_description=\"{}\"",
                self.error_description.as_deref().unwrap_or_default()
            )),
            _ => None,
        };
        let retry_after = self.retry_after_secs;

        let mut response = (status, Json(self)).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        if let Some(value) = challenge.and_then(|c| HeaderValue::from_str(&c).ok()) {
            headers.insert(header::WWW_AUTHENTICATE, value);
        }
        if let Some(secs) = retry_after {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// OAuth 2.0 Authorization Request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    /// Response type (only `code`)
    #[serde(default)]
    pub response_type: String,
    /// Client identifier
    #[serde(default)]
    pub client_id: String,
    /// Redirect URI for response
    #[serde(default)]
    pub redirect_uri: String,
    /// Requested scopes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Opaque client state, echoed on every redirect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// OIDC nonce, copied into the ID token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// PKCE code challenge (RFC 7636)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,
    /// PKCE code challenge method (only S256)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,
}

impl AuthorizeRequest {
    /// Treat empty optional parameters as absent
    #[must_use]
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.scope,
            &mut self.state,
            &mut self.nonce,
            &mut self.code_challenge,
            &mut self.code_challenge_method,
        ] {
            if field.as_deref().is_some_and(str::is_empty) {
                *field = None;
            }
        }
        self
    }
}

/// A user's answer to a consent prompt
///
/// Carries the parameters of the original request so the grant is bound to
/// exactly what was shown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentDecision {
    /// Client identifier
    pub client_id: String,
    /// Scope approved
    #[serde(default)]
    pub scope: String,
    /// Redirect URI from the original request
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
    /// Whether the user approved
    pub granted: bool,
}

/// What the user is asked to approve
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsentPrompt {
    /// Client identifier
    pub client_id: String,
    /// Client display name
    pub client_name: String,
    /// Client description
    pub client_description: Option<String>,
    /// Client logo
    pub client_logo: Option<String>,
    /// Client home page
    pub website_url: Option<String>,
    /// Privacy policy link
    pub privacy_policy_url: Option<String>,
    /// Terms of service link
    pub terms_of_service_url: Option<String>,
    /// Scope tokens requested
    pub requested_scopes: Vec<String>,
    /// Request to resubmit with the decision
    pub request: AuthorizeRequest,
}

/// Result of an authorization or consent step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    /// No authenticated user; re-enter with `request` after login
    LoginRequired {
        /// Original request, validated
        request: AuthorizeRequest,
    },
    /// The user must approve the scope first
    ConsentRequired(Box<ConsentPrompt>),
    /// A code was minted
    Issued {
        /// Validated redirect URI
        redirect_uri: String,
        /// Authorization code
        code: String,
        /// State to echo
        state: Option<String>,
    },
    /// The request failed
    Error {
        /// Protocol error
        error: OAuth2Error,
        /// Set only once the redirect URI is trusted
        redirect_uri: Option<String>,
        /// State to echo when redirecting
        state: Option<String>,
    },
}

impl AuthorizationOutcome {
    /// Error returned straight to the user-agent
    #[must_use]
    pub const fn direct_error(error: OAuth2Error) -> Self {
        Self::Error {
            error,
            redirect_uri: None,
            state: None,
        }
    }

    /// Error delivered to a trusted redirect URI
    #[must_use]
    pub fn redirected_error(error: OAuth2Error, redirect_uri: &str, state: Option<String>) -> Self {
        Self::Error {
            error,
            redirect_uri: Some(redirect_uri.to_owned()),
            state,
        }
    }

    /// Where to send the user-agent, for `Issued` and redirected errors
    #[must_use]
    pub fn redirect_location(&self) -> Option<String> {
        match self {
            Self::Issued {
                redirect_uri,
                code,
                state,
            } => build_redirect(redirect_uri, &[("code", code.as_str())], state.as_deref()),
            Self::Error {
                error,
                redirect_uri: Some(redirect_uri),
                state,
            } => {
                let mut params = vec![("error", error.error.as_str())];
                if let Some(description) = error.error_description.as_deref() {
                    params.push(("error_description", description));
                }
                build_redirect(redirect_uri, &params, state.as_deref())
            }
            _ => None,
        }
    }
}

/// OAuth 2.0 Token Request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    /// Grant type (`authorization_code`, `client_credentials`, `refresh_token`)
    #[serde(default)]
    pub grant_type: String,
    /// Authorization code (for `authorization_code` grant)
    #[serde(default)]
    pub code: Option<String>,
    /// Redirect URI used at `/authorize`
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// Client ID (form or Basic header)
    #[serde(default)]
    pub client_id: Option<String>,
    /// Client secret (form or Basic header)
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Requested scope
    #[serde(default)]
    pub scope: Option<String>,
    /// Refresh token (for `refresh_token` grant)
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// PKCE code verifier (RFC 7636)
    #[serde(default)]
    pub code_verifier: Option<String>,
}

/// OAuth 2.0 Token Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Access token (JWT)
    pub access_token: String,
    /// Token type (always "Bearer")
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Refresh token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// OIDC ID token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Granted scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Claims released by `/userinfo`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Subject
    pub sub: String,
    /// Display name (`profile`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Login name (`profile`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Avatar (`profile`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// Email (`email`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Email verification flag (`email`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    /// Phone number (`phone`, only when present)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}
