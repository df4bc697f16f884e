// ABOUTME: OAuth 2.0 and OpenID Connect authorization server engines
// ABOUTME: Authorization code flow with PKCE, token grants, userinfo, discovery, and rate limiting
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::errors::{AppError, ErrorCode};

/// Authorization endpoint and consent handling
pub mod authorization;
/// OpenID Connect discovery document
pub mod discovery;
/// OAuth 2.0 data models and protocol errors
pub mod models;
/// PKCE (RFC 7636) challenge validation and verification
pub mod pkce;
/// Rate limiting for OAuth 2.0 endpoints
pub mod rate_limiting;
/// Redirect URI construction
pub mod redirect;
/// Token endpoint grants and userinfo
pub mod token_exchange;

pub use authorization::AuthorizationFlowEngine;
pub use discovery::OpenIdConfiguration;
pub use token_exchange::TokenExchangeEngine;

/// Authorization request
pub use models::AuthorizeRequest;
/// Result of an authorization or consent step
pub use models::AuthorizationOutcome;
/// Consent form submission
pub use models::ConsentDecision;
/// What the consent screen shows
pub use models::ConsentPrompt;
/// OAuth 2.0 error response
pub use models::OAuth2Error;
/// OAuth 2.0 error codes
pub use models::OAuth2ErrorKind;
/// Token exchange request
pub use models::TokenRequest;
/// Token exchange response
pub use models::TokenResponse;
/// Userinfo response
pub use models::UserInfo;

pub use rate_limiting::{OAuth2RateLimiter, RateLimitStatus, RateLimitedEndpoint};

/// Map an infrastructure failure onto the protocol error a client sees
///
/// Nothing from the underlying error reaches the response.
pub(crate) fn internal_failure(error: &AppError) -> OAuth2Error {
    tracing::error!(code = ?error.code, error = %error, "OAuth request failed on infrastructure");
    match error.code {
        ErrorCode::ResourceUnavailable => OAuth2Error::temporarily_unavailable(),
        _ => OAuth2Error::server_error(),
    }
}
