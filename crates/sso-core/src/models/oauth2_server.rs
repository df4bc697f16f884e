// ABOUTME: Records kept in the ephemeral secret store by the authorization engine
// ABOUTME: Sessions, one-time authorization codes, refresh token records, revoked token markers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An authenticated user-agent, stored under `session:{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Authenticated user
    pub user_id: Uuid,
    /// When the session was created
    pub created_at: DateTime<Utc>,
}

/// A pending grant, stored under `auth_code:{code}` and consumed exactly once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCodeRecord {
    /// User who approved the grant
    pub user_id: Uuid,
    /// Client the code was issued to
    pub client_id: String,
    /// Redirect URI the code was delivered to
    pub redirect_uri: String,
    /// Space-separated granted scope
    pub scope: String,
    /// OIDC nonce to embed in the ID token
    #[serde(default)]
    pub nonce: Option<String>,
    /// PKCE code challenge (RFC 7636)
    #[serde(default)]
    pub code_challenge: Option<String>,
    /// PKCE code challenge method
    #[serde(default)]
    pub code_challenge_method: Option<String>,
    /// When the code was issued
    pub created_at: DateTime<Utc>,
}

/// Server-side half of an issued refresh token, stored under
/// `refresh_token:{user_id}:{jti}` until the token expires or is revoked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    /// Token identifier
    pub jti: String,
    /// Token owner
    pub user_id: Uuid,
    /// Client the token was issued to; `None` for first-party login
    #[serde(default)]
    pub client_id: Option<String>,
    /// Scope originally granted
    pub scope: String,
    /// When the token was issued
    pub issued_at: DateTime<Utc>,
}

/// Marker for a revoked access token, stored under `blacklist:{jti}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokedToken {
    /// Owner of the revoked token
    pub user_id: Uuid,
    /// When it was revoked
    pub revoked_at: DateTime<Utc>,
}
