// ABOUTME: Registered OAuth client application model
// ABOUTME: Typed allow-lists for redirect URIs, scopes, grant types, and response types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::constants::oauth::{
    client_auth_methods, grant_types, response_types, scopes,
    DEFAULT_CLIENT_ACCESS_TOKEN_LIFETIME_SECS, DEFAULT_CLIENT_AUTHORIZATION_CODE_LIFETIME_SECS,
    DEFAULT_CLIENT_REFRESH_TOKEN_LIFETIME_SECS,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered OAuth 2.0 client application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientApplication {
    /// Internal identifier
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Display name shown on the consent screen
    pub name: String,
    /// Optional description shown on the consent screen
    #[serde(default)]
    pub description: Option<String>,
    /// Public OAuth 2.0 client identifier
    pub client_id: String,
    /// Argon2 PHC hash of the client secret; `None` for public clients
    #[serde(default, skip_serializing)]
    pub client_secret_hash: Option<String>,
    /// Exact-match redirect URI allow-list
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    /// Scopes this client may request
    #[serde(default = "default_allowed_scopes")]
    pub allowed_scopes: Vec<String>,
    /// Grant types this client may use at the token endpoint
    #[serde(default = "default_grant_types")]
    pub grant_types: Vec<String>,
    /// Response types this client may use at the authorization endpoint
    #[serde(default = "default_response_types")]
    pub response_types: Vec<String>,
    /// Inactive clients are indistinguishable from unknown ones
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Confidential clients must authenticate with their secret
    #[serde(default = "default_true")]
    pub is_confidential: bool,
    /// Whether the user must approve the requested scope
    #[serde(default = "default_true")]
    pub require_consent: bool,
    /// Consent screen logo
    #[serde(default)]
    pub logo_url: Option<String>,
    /// Client home page
    #[serde(default)]
    pub website_url: Option<String>,
    /// Privacy policy link shown on the consent screen
    #[serde(default)]
    pub privacy_policy_url: Option<String>,
    /// Terms of service link shown on the consent screen
    #[serde(default)]
    pub terms_of_service_url: Option<String>,
    /// Registered token endpoint authentication method
    #[serde(default = "default_auth_method")]
    pub token_endpoint_auth_method: String,
    /// Access token lifetime in seconds, reported as `expires_in`
    #[serde(default = "default_access_token_lifetime")]
    pub access_token_lifetime: i64,
    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_token_lifetime")]
    pub refresh_token_lifetime: i64,
    /// Authorization code lifetime in seconds
    #[serde(default = "default_authorization_code_lifetime")]
    pub authorization_code_lifetime: i64,
}

impl ClientApplication {
    /// A confidential client with default scopes, grants and lifetimes
    pub fn new(client_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            client_id: client_id.into(),
            client_secret_hash: None,
            redirect_uris: Vec::new(),
            allowed_scopes: default_allowed_scopes(),
            grant_types: default_grant_types(),
            response_types: default_response_types(),
            is_active: true,
            is_confidential: true,
            require_consent: true,
            logo_url: None,
            website_url: None,
            privacy_policy_url: None,
            terms_of_service_url: None,
            token_endpoint_auth_method: default_auth_method(),
            access_token_lifetime: DEFAULT_CLIENT_ACCESS_TOKEN_LIFETIME_SECS,
            refresh_token_lifetime: DEFAULT_CLIENT_REFRESH_TOKEN_LIFETIME_SECS,
            authorization_code_lifetime: DEFAULT_CLIENT_AUTHORIZATION_CODE_LIFETIME_SECS,
        }
    }

    /// Space-separated view of the allowed scopes
    #[must_use]
    pub fn allowed_scope_string(&self) -> String {
        self.allowed_scopes.join(" ")
    }
}

fn default_allowed_scopes() -> Vec<String> {
    vec![
        scopes::OPENID.to_owned(),
        scopes::PROFILE.to_owned(),
        scopes::EMAIL.to_owned(),
    ]
}

fn default_grant_types() -> Vec<String> {
    vec![
        grant_types::AUTHORIZATION_CODE.to_owned(),
        grant_types::REFRESH_TOKEN.to_owned(),
    ]
}

fn default_response_types() -> Vec<String> {
    vec![response_types::CODE.to_owned()]
}

const fn default_true() -> bool {
    true
}

fn default_auth_method() -> String {
    client_auth_methods::CLIENT_SECRET_BASIC.to_owned()
}

const fn default_access_token_lifetime() -> i64 {
    DEFAULT_CLIENT_ACCESS_TOKEN_LIFETIME_SECS
}

const fn default_refresh_token_lifetime() -> i64 {
    DEFAULT_CLIENT_REFRESH_TOKEN_LIFETIME_SECS
}

const fn default_authorization_code_lifetime() -> i64 {
    DEFAULT_CLIENT_AUTHORIZATION_CODE_LIFETIME_SECS
}
