// ABOUTME: OAuth 2.0 and OpenID Connect protocol vocabulary
// ABOUTME: Grant types, response types, scopes, PKCE bounds, and token lifetimes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Grant type identifiers accepted at the token endpoint
pub mod grant_types {
    /// RFC 6749 section 4.1
    pub const AUTHORIZATION_CODE: &str = "authorization_code";
    /// RFC 6749 section 6
    pub const REFRESH_TOKEN: &str = "refresh_token";
    /// RFC 6749 section 4.4
    pub const CLIENT_CREDENTIALS: &str = "client_credentials";

    /// Every grant type the token endpoint understands
    pub const SUPPORTED: &[&str] = &[AUTHORIZATION_CODE, CLIENT_CREDENTIALS, REFRESH_TOKEN];
}

/// Response types accepted at the authorization endpoint
pub mod response_types {
    /// Authorization code flow
    pub const CODE: &str = "code";
}

/// Scope names with meaning to the server
pub mod scopes {
    /// Triggers ID token issuance
    pub const OPENID: &str = "openid";
    /// Licenses name, username, and picture claims
    pub const PROFILE: &str = "profile";
    /// Licenses email and `email_verified` claims
    pub const EMAIL: &str = "email";
    /// Licenses the `phone_number` claim
    pub const PHONE: &str = "phone";
    /// Triggers refresh token issuance on the authorization code grant
    pub const OFFLINE_ACCESS: &str = "offline_access";

    /// Scope granted when an authorization request names none
    pub const DEFAULT_USER_SCOPE: &str = "openid profile email";
    /// Scope granted to `client_credentials` requests that name none
    pub const DEFAULT_CLIENT_CREDENTIALS_SCOPE: &str = "client";

    /// Scopes advertised in the discovery document
    pub const SUPPORTED: &[&str] = &[OPENID, PROFILE, EMAIL, PHONE, OFFLINE_ACCESS];
}

/// Token endpoint client authentication methods
pub mod client_auth_methods {
    /// HTTP Basic with `client_id:client_secret`
    pub const CLIENT_SECRET_BASIC: &str = "client_secret_basic";
    /// `client_id` and `client_secret` as form fields
    pub const CLIENT_SECRET_POST: &str = "client_secret_post";
    /// Public client, no secret
    pub const NONE: &str = "none";
}

/// Bearer token type returned in every token response
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Only supported JWS algorithm
pub const SIGNING_ALGORITHM: &str = "RS256";

/// Only supported PKCE method (RFC 7636)
pub const PKCE_METHOD_S256: &str = "S256";

/// Minimum length of a PKCE code verifier or challenge
pub const PKCE_MIN_LENGTH: usize = 43;

/// Maximum length of a PKCE code verifier or challenge
pub const PKCE_MAX_LENGTH: usize = 128;

/// Random bytes behind authorization codes, session ids, and token ids
pub const SECRET_RANDOM_BYTES: usize = 32;

/// Default per-client access token lifetime (1 hour)
pub const DEFAULT_CLIENT_ACCESS_TOKEN_LIFETIME_SECS: i64 = 3_600;

/// Default per-client refresh token lifetime (30 days)
pub const DEFAULT_CLIENT_REFRESH_TOKEN_LIFETIME_SECS: i64 = 2_592_000;

/// Default per-client authorization code lifetime (10 minutes)
pub const DEFAULT_CLIENT_AUTHORIZATION_CODE_LIFETIME_SECS: i64 = 600;

/// Longest access token lifetime a client may register (1 day)
pub const MAX_CLIENT_ACCESS_TOKEN_LIFETIME_SECS: i64 = 86_400;

/// Longest refresh token lifetime a client may register (365 days)
pub const MAX_CLIENT_REFRESH_TOKEN_LIFETIME_SECS: i64 = 31_536_000;

/// Longest authorization code lifetime a client may register (1 hour)
pub const MAX_CLIENT_AUTHORIZATION_CODE_LIFETIME_SECS: i64 = 3_600;

/// Access token lifetime for first-party login (30 minutes)
pub const DEFAULT_LOGIN_ACCESS_TOKEN_MINUTES: i64 = 30;

/// Refresh token lifetime for first-party login (30 days)
pub const DEFAULT_LOGIN_REFRESH_TOKEN_DAYS: i64 = 30;

/// ID token lifetime (60 minutes)
pub const DEFAULT_ID_TOKEN_MINUTES: i64 = 60;

/// Upper bound applied to every client's authorization code lifetime (10 minutes)
pub const DEFAULT_AUTHORIZATION_CODE_CAP_MINUTES: i64 = 10;

/// Session lifetime (24 hours)
pub const DEFAULT_SESSION_HOURS: i64 = 24;

/// Clock skew tolerated on `exp` and `iat`
pub const DEFAULT_JWT_LEEWAY_SECS: u64 = 5;

/// Consecutive failed logins before an account locks
pub const MAX_LOGIN_ATTEMPTS: u32 = 5;

/// Lockout duration after too many failed logins
pub const ACCOUNT_LOCKOUT_MINUTES: i64 = 30;

/// Name of the session cookie set by the login endpoint
pub const SESSION_COOKIE_NAME: &str = "session_id";
