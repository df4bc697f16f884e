// ABOUTME: First-party login sessions: login, token refresh, logout, and current-user resolution
// ABOUTME: Sessions and refresh records live in the secret store; logout blacklists the access token
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Sessions
//!
//! The `/auth/*` endpoints let the SSO server's own login page and
//! first-party API clients authenticate directly. A login produces a
//! `session:*` entry (used by `/authorize` to recognise the user) and a pair
//! of tokens. First-party refresh tokens carry no `client_id` claim and their
//! records have `client_id: None`, so they cannot be redeemed at `/token`.

use crate::config::{OAuthPolicyConfig, TokenLifetimeConfig};
use crate::constants::oauth::{scopes, TOKEN_TYPE_BEARER};
use crate::crypto::generate_secret_token;
use crate::errors::{AppError, AppResult};
use crate::logging::AuditLogger;
use crate::models::{RefreshTokenRecord, RevokedToken, SessionRecord, User};
use crate::store::{SecretStore, StoreKey};
use crate::tokens::{ClaimSet, TokenClaims, TokenCodec, TokenType};
use crate::users::{AuthenticationError, UserDirectory};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{debug, warn};
use uuid::Uuid;

const INVALID_LOGIN: &str = "Invalid username or password";

/// Tokens handed to a first-party client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginTokens {
    /// Signed access token
    pub access_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Present on login, and on refresh when rotation is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginSession {
    /// Opaque session id for the session cookie
    pub session_id: String,
    /// Authenticated user
    pub user: User,
    /// Token pair
    pub tokens: LoginTokens,
}

/// What a logout revoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogoutSummary {
    /// Whose credentials were revoked
    pub user_id: Uuid,
    /// Whether a session entry was removed
    pub session_removed: bool,
    /// Whether the presented access token was blacklisted
    pub access_token_revoked: bool,
    /// How many refresh records were deleted
    pub revoked_refresh_tokens: u64,
}

fn ttl(duration: Duration) -> StdDuration {
    duration.to_std().unwrap_or(StdDuration::from_secs(1))
}

/// Session and first-party token management
#[derive(Clone)]
pub struct SessionManager {
    users: Arc<dyn UserDirectory>,
    store: SecretStore,
    codec: TokenCodec,
    lifetimes: TokenLifetimeConfig,
    policy: OAuthPolicyConfig,
}

impl SessionManager {
    /// Create a manager
    #[must_use]
    pub fn new(
        users: Arc<dyn UserDirectory>,
        store: SecretStore,
        codec: TokenCodec,
        lifetimes: TokenLifetimeConfig,
        policy: OAuthPolicyConfig,
    ) -> Self {
        Self {
            users,
            store,
            codec,
            lifetimes,
            policy,
        }
    }

    /// Authenticate and open a session
    ///
    /// # Errors
    ///
    /// `AuthInvalid` with the same message for every credential failure, so
    /// callers cannot tell unknown accounts from locked or inactive ones.
    /// Store and signing failures are returned as-is.
    pub async fn login(&self, username_or_email: &str, password: &str) -> AppResult<LoginSession> {
        let user = match self.users.authenticate(username_or_email, password).await {
            Ok(user) => user,
            Err(e) => {
                let reason = match e {
                    AuthenticationError::InvalidCredentials => "invalid_credentials",
                    AuthenticationError::AccountLocked { .. } => "account_locked",
                    AuthenticationError::AccountInactive => "account_inactive",
                };
                AuditLogger::log_login(None, false, Some(reason));
                return Err(AppError::auth_invalid(INVALID_LOGIN));
            }
        };

        let session_id = generate_secret_token()?;
        let record = SessionRecord {
            user_id: user.id,
            created_at: Utc::now(),
        };
        self.store
            .put(
                &StoreKey::Session(session_id.clone()),
                &record,
                ttl(Duration::hours(self.lifetimes.session_hours)),
            )
            .await?;

        let access_token = self.issue_access_token(&user)?;
        let refresh_token = self.issue_refresh_token(user.id).await?;

        AuditLogger::log_login(Some(user.id), true, None);

        Ok(LoginSession {
            session_id,
            tokens: LoginTokens {
                access_token,
                token_type: TOKEN_TYPE_BEARER.to_owned(),
                expires_in: self.lifetimes.access_token_minutes * 60,
                refresh_token: Some(refresh_token),
            },
            user,
        })
    }

    /// Exchange a first-party refresh token for a new access token
    ///
    /// # Errors
    ///
    /// `AuthInvalid` when the token does not verify, belongs to an OAuth
    /// client, or its record is gone; `PermissionDenied` for inactive users
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<LoginTokens> {
        let claims = self.codec.verify(refresh_token).map_err(|e| {
            debug!(error = %e, "First-party refresh token failed verification");
            AppError::auth_invalid("Invalid refresh token")
        })?;
        if claims.token_type != TokenType::Refresh || claims.extra.contains_key("client_id") {
            return Err(AppError::auth_invalid("Invalid refresh token"));
        }
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::auth_invalid("Invalid refresh token"))?;

        let key = StoreKey::RefreshToken {
            user_id,
            jti: claims.jti,
        };
        let record: Option<RefreshTokenRecord> = if self.policy.refresh_token_rotation {
            self.store.take(&key).await
        } else {
            self.store.get(&key).await
        };
        match record {
            Some(record) if record.client_id.is_none() => {}
            _ => return Err(AppError::auth_invalid("Refresh token has been revoked")),
        }

        let user = match self.users.get_user_by_id(user_id).await? {
            Some(user) if user.is_active => user,
            _ => return Err(AppError::forbidden("User account is not active")),
        };

        let access_token = self.issue_access_token(&user)?;
        let refresh_token = if self.policy.refresh_token_rotation {
            Some(self.issue_refresh_token(user.id).await?)
        } else {
            None
        };

        Ok(LoginTokens {
            access_token,
            token_type: TOKEN_TYPE_BEARER.to_owned(),
            expires_in: self.lifetimes.access_token_minutes * 60,
            refresh_token,
        })
    }

    /// End a session and revoke the user's credentials
    ///
    /// Deletes the session, blacklists the presented access token for the
    /// rest of its lifetime, and deletes every refresh record of the user.
    ///
    /// # Errors
    ///
    /// `AuthRequired` when neither credential identifies a user; store
    /// failures while revoking are returned rather than ignored
    pub async fn logout(
        &self,
        session_id: Option<&str>,
        bearer_token: Option<&str>,
    ) -> AppResult<LogoutSummary> {
        let mut user_id = None;
        let mut session_removed = false;

        if let Some(session_id) = session_id.filter(|s| !s.is_empty()) {
            let record: Option<SessionRecord> = self
                .store
                .take(&StoreKey::Session(session_id.to_owned()))
                .await;
            if let Some(record) = record {
                user_id = Some(record.user_id);
                session_removed = true;
            }
        }

        let mut access_token_revoked = false;
        if let Some(claims) = bearer_token.and_then(|t| self.decode_access_token(t)) {
            if let Ok(token_user) = Uuid::parse_str(&claims.sub) {
                let revoked = RevokedToken {
                    user_id: token_user,
                    revoked_at: Utc::now(),
                };
                self.store
                    .put(
                        &StoreKey::Blacklist(claims.jti.clone()),
                        &revoked,
                        claims
                            .acceptance_window(self.lifetimes.leeway_secs)
                            .max(StdDuration::from_secs(1)),
                    )
                    .await?;
                access_token_revoked = true;
                user_id.get_or_insert(token_user);
            }
        }

        let user_id = user_id.ok_or_else(AppError::auth_required)?;
        let revoked_refresh_tokens = self
            .store
            .delete_matching(&StoreKey::refresh_tokens_of(user_id))
            .await?;

        AuditLogger::log_logout(user_id, revoked_refresh_tokens, access_token_revoked);

        Ok(LogoutSummary {
            user_id,
            session_removed,
            access_token_revoked,
            revoked_refresh_tokens,
        })
    }

    /// Resolve the current user from a session id, then from a bearer token
    ///
    /// Revoked, expired or unknown credentials resolve to `None`, as do
    /// inactive users.
    ///
    /// # Errors
    ///
    /// Only user directory failures are returned
    pub async fn current_user(
        &self,
        session_id: Option<&str>,
        bearer_token: Option<&str>,
    ) -> AppResult<Option<User>> {
        let mut user_id = None;

        if let Some(session_id) = session_id.filter(|s| !s.is_empty()) {
            let record: Option<SessionRecord> = self
                .store
                .get(&StoreKey::Session(session_id.to_owned()))
                .await;
            user_id = record.map(|r| r.user_id);
        }

        if user_id.is_none() {
            if let Some(claims) = bearer_token.and_then(|t| self.decode_access_token(t)) {
                if self.is_revoked(&claims.jti).await {
                    debug!("Bearer token is revoked");
                } else {
                    user_id = Uuid::parse_str(&claims.sub).ok();
                }
            }
        }

        let Some(user_id) = user_id else {
            return Ok(None);
        };
        Ok(self
            .users
            .get_user_by_id(user_id)
            .await?
            .filter(|user| user.is_active))
    }

    fn decode_access_token(&self, token: &str) -> Option<TokenClaims> {
        self.codec
            .verify(token)
            .ok()
            .filter(|claims| claims.token_type == TokenType::Access)
    }

    /// Revocation check that treats an unreachable store as revoked
    async fn is_revoked(&self, jti: &str) -> bool {
        match self.store.exists(&StoreKey::Blacklist(jti.to_owned())).await {
            Ok(revoked) => revoked,
            Err(e) => {
                warn!(error = %e, "Revocation list unavailable, treating token as revoked");
                true
            }
        }
    }

    fn issue_access_token(&self, user: &User) -> AppResult<String> {
        let claims = ClaimSet::new(
            user.id.to_string(),
            Some(scopes::DEFAULT_USER_SCOPE.to_owned()),
        )
        .with_claim("username", user.username.as_str())
        .with_claim("email", user.email.as_str());
        Ok(self
            .codec
            .issue(
                claims,
                TokenType::Access,
                Duration::minutes(self.lifetimes.access_token_minutes),
            )?
            .token)
    }

    async fn issue_refresh_token(&self, user_id: Uuid) -> AppResult<String> {
        let lifetime = Duration::days(self.lifetimes.refresh_token_days);
        let issued = self.codec.issue(
            ClaimSet::new(
                user_id.to_string(),
                Some(scopes::DEFAULT_USER_SCOPE.to_owned()),
            ),
            TokenType::Refresh,
            lifetime,
        )?;

        let record = RefreshTokenRecord {
            jti: issued.claims.jti.clone(),
            user_id,
            client_id: None,
            scope: scopes::DEFAULT_USER_SCOPE.to_owned(),
            issued_at: Utc::now(),
        };
        self.store
            .put(
                &StoreKey::RefreshToken {
                    user_id,
                    jti: issued.claims.jti,
                },
                &record,
                ttl(lifetime),
            )
            .await?;

        Ok(issued.token)
    }
}
