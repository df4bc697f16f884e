// ABOUTME: Token endpoint grants and the userinfo endpoint
// ABOUTME: Redeems codes once, rotates or reuses refresh tokens, and projects userinfo claims by scope
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Token Exchange
//!
//! Client authentication happens before any grant is looked at, so an
//! unauthenticated caller learns nothing about codes or refresh tokens.
//!
//! Authorization codes are consumed with an atomic `take`. Two concurrent
//! redemptions of the same code see one success and one `invalid_grant`.
//!
//! Refresh tokens are JWTs backed by a `refresh_token:{user}:{jti}` record.
//! A token whose record is gone (logout, rotation, expiry) is dead even
//! while its signature still verifies.

use super::discovery::{openid_configuration, OpenIdConfiguration};
use super::models::{OAuth2Error, TokenRequest, TokenResponse, UserInfo};
use super::{internal_failure, pkce};
use crate::clients::ClientRegistry;
use crate::config::{OAuthPolicyConfig, TokenLifetimeConfig};
use crate::constants::oauth::{grant_types, scopes, TOKEN_TYPE_BEARER};
use crate::logging::AuditLogger;
use crate::models::{AuthorizationCodeRecord, ClientApplication, RefreshTokenRecord, User};
use crate::store::{SecretStore, StoreKey};
use crate::tokens::{ClaimSet, TokenClaims, TokenCodec, TokenType};
use crate::users::UserDirectory;
use chrono::{Duration, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Whether every token of `requested` appears in `granted`
fn is_scope_subset(requested: &str, granted: &str) -> bool {
    let granted: HashSet<&str> = granted.split_whitespace().collect();
    requested.split_whitespace().all(|s| granted.contains(s))
}

fn scope_contains(scope: &str, wanted: &str) -> bool {
    scope.split_whitespace().any(|s| s == wanted)
}

fn to_std(duration: Duration) -> StdDuration {
    duration
        .to_std()
        .unwrap_or_else(|_| StdDuration::from_secs(1))
}

/// Token endpoint and userinfo logic
#[derive(Clone)]
pub struct TokenExchangeEngine {
    clients: ClientRegistry,
    users: Arc<dyn UserDirectory>,
    store: SecretStore,
    codec: TokenCodec,
    policy: OAuthPolicyConfig,
    id_token_lifetime: Duration,
}

impl TokenExchangeEngine {
    /// Create an engine
    #[must_use]
    pub fn new(
        clients: ClientRegistry,
        users: Arc<dyn UserDirectory>,
        store: SecretStore,
        codec: TokenCodec,
        policy: OAuthPolicyConfig,
        lifetimes: &TokenLifetimeConfig,
    ) -> Self {
        Self {
            clients,
            users,
            store,
            codec,
            policy,
            id_token_lifetime: Duration::minutes(lifetimes.id_token_minutes),
        }
    }

    /// Handle `POST /token`
    ///
    /// # Errors
    ///
    /// Returns the OAuth 2.0 error to render for the grant
    pub async fn handle_token_request(
        &self,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuth2Error> {
        let client_id = request
            .client_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(OAuth2Error::invalid_client)?;

        let client = self
            .clients
            .validate_credentials(client_id, request.client_secret.as_deref())
            .await
            .ok_or_else(|| {
                AuditLogger::log_client_auth_failure(client_id);
                OAuth2Error::invalid_client()
            })?;

        let grant_type = request.grant_type.trim();
        if grant_type.is_empty() {
            return Err(OAuth2Error::invalid_request("grant_type is required"));
        }
        if !grant_types::SUPPORTED.contains(&grant_type) {
            return Err(OAuth2Error::unsupported_grant_type());
        }
        if !ClientRegistry::supports_grant_type(&client, grant_type) {
            return Err(OAuth2Error::unauthorized_client(
                "Client is not registered for this grant type",
            ));
        }

        let response = match grant_type {
            grant_types::AUTHORIZATION_CODE => {
                self.authorization_code_grant(&client, &request).await
            }
            grant_types::REFRESH_TOKEN => self.refresh_token_grant(&client, &request).await,
            _ => self.client_credentials_grant(&client, &request),
        }?;

        AuditLogger::log_token_issued(&client.client_id, grant_type, response.scope.as_deref());
        Ok(response)
    }

    async fn authorization_code_grant(
        &self,
        client: &ClientApplication,
        request: &TokenRequest,
    ) -> Result<TokenResponse, OAuth2Error> {
        let code = request
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| OAuth2Error::invalid_request("code is required"))?;

        let record: AuthorizationCodeRecord = self
            .store
            .take(&StoreKey::AuthCode(code.to_owned()))
            .await
            .ok_or_else(|| {
                AuditLogger::log_code_rejected(&client.client_id, "unknown, expired or redeemed");
                OAuth2Error::invalid_grant("Invalid or expired authorization code")
            })?;

        if record.client_id != client.client_id {
            AuditLogger::log_code_rejected(&client.client_id, "issued to another client");
            return Err(OAuth2Error::invalid_grant(
                "Authorization code was issued to another client",
            ));
        }

        if request
            .redirect_uri
            .as_deref()
            .is_some_and(|uri| uri != record.redirect_uri)
        {
            AuditLogger::log_code_rejected(&client.client_id, "redirect_uri mismatch");
            return Err(OAuth2Error::invalid_grant("redirect_uri does not match"));
        }

        pkce::verify(
            record.code_challenge.as_deref(),
            request.code_verifier.as_deref(),
        )?;

        let user = self.active_user(record.user_id).await?;

        let access = self.issue_access_token(client, &user.id.to_string(), &record.scope)?;
        let id_token = if scope_contains(&record.scope, scopes::OPENID) {
            Some(self.issue_id_token(client, &user, &record.scope, record.nonce.as_deref())?)
        } else {
            None
        };
        let refresh_token = if scope_contains(&record.scope, scopes::OFFLINE_ACCESS) {
            Some(
                self.issue_refresh_token(client, user.id, &record.scope)
                    .await?,
            )
        } else {
            None
        };

        Ok(TokenResponse {
            access_token: access,
            token_type: TOKEN_TYPE_BEARER.to_owned(),
            expires_in: client.access_token_lifetime,
            refresh_token,
            id_token,
            scope: Some(record.scope),
        })
    }

    async fn refresh_token_grant(
        &self,
        client: &ClientApplication,
        request: &TokenRequest,
    ) -> Result<TokenResponse, OAuth2Error> {
        let presented = request
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| OAuth2Error::invalid_request("refresh_token is required"))?;

        let claims = self.codec.verify(presented).map_err(|e| {
            debug!(error = %e, "Refresh token failed verification");
            OAuth2Error::invalid_grant("Invalid refresh token")
        })?;
        if claims.token_type != TokenType::Refresh {
            return Err(OAuth2Error::invalid_grant("Token is not a refresh token"));
        }
        if claims.extra.get("client_id").and_then(Value::as_str) != Some(client.client_id.as_str()) {
            return Err(OAuth2Error::invalid_grant(
                "Refresh token was issued to another client",
            ));
        }
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| OAuth2Error::invalid_grant("Invalid refresh token"))?;

        // Everything that can reject the request runs before a rotating
        // token is consumed, so a bad request never burns a good token.
        let requested = request.scope.as_deref().map(str::trim).filter(|s| !s.is_empty());
        if let Some(requested) = requested {
            if !is_scope_subset(requested, claims.scope.as_deref().unwrap_or_default()) {
                return Err(OAuth2Error::invalid_scope(
                    "Requested scope exceeds the original grant",
                ));
            }
        }
        let user = self.active_user(user_id).await?;

        let key = StoreKey::RefreshToken {
            user_id,
            jti: claims.jti.clone(),
        };
        let record: Option<RefreshTokenRecord> = if self.policy.refresh_token_rotation {
            self.store.take(&key).await
        } else {
            self.store.get(&key).await
        };
        let record =
            record.ok_or_else(|| OAuth2Error::invalid_grant("Refresh token has been revoked"))?;
        if record.client_id.as_deref() != Some(client.client_id.as_str()) {
            return Err(OAuth2Error::invalid_grant(
                "Refresh token was issued to another client",
            ));
        }

        let scope = match requested {
            Some(requested) if !is_scope_subset(requested, &record.scope) => {
                return Err(OAuth2Error::invalid_scope(
                    "Requested scope exceeds the original grant",
                ))
            }
            Some(requested) => requested.split_whitespace().collect::<Vec<_>>().join(" "),
            None => record.scope.clone(),
        };

        let access = self.issue_access_token(client, &user.id.to_string(), &scope)?;
        let id_token = if scope_contains(&scope, scopes::OPENID) {
            Some(self.issue_id_token(client, &user, &scope, None)?)
        } else {
            None
        };
        let refresh_token = if self.policy.refresh_token_rotation {
            // The replacement keeps the original grant so later refreshes may widen back
            Some(
                self.issue_refresh_token(client, user.id, &record.scope)
                    .await?,
            )
        } else {
            None
        };

        Ok(TokenResponse {
            access_token: access,
            token_type: TOKEN_TYPE_BEARER.to_owned(),
            expires_in: client.access_token_lifetime,
            refresh_token,
            id_token,
            scope: Some(scope),
        })
    }

    fn client_credentials_grant(
        &self,
        client: &ClientApplication,
        request: &TokenRequest,
    ) -> Result<TokenResponse, OAuth2Error> {
        let scope = match request.scope.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(requested) if !ClientRegistry::is_scope_allowed(client, requested) => {
                return Err(OAuth2Error::invalid_scope(
                    "Requested scope is not allowed for this client",
                ))
            }
            Some(requested) => requested.split_whitespace().collect::<Vec<_>>().join(" "),
            None => scopes::DEFAULT_CLIENT_CREDENTIALS_SCOPE.to_owned(),
        };

        let access = self.issue_access_token(client, &client.client_id, &scope)?;

        Ok(TokenResponse {
            access_token: access,
            token_type: TOKEN_TYPE_BEARER.to_owned(),
            expires_in: client.access_token_lifetime,
            refresh_token: None,
            id_token: None,
            scope: Some(scope),
        })
    }

    /// Handle `GET /userinfo`
    ///
    /// # Errors
    ///
    /// `invalid_token` for anything but a live, unrevoked access token issued
    /// to a user; `access_denied` when that user is no longer active
    pub async fn get_user_info(&self, access_token: &str) -> Result<UserInfo, OAuth2Error> {
        let claims = self.verify_access_token(access_token).await?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| OAuth2Error::invalid_token())?;
        let user = self.active_user(user_id).await?;
        Ok(project_user_info(&user, &claims))
    }

    /// Verify a bearer access token and check it against the revocation list
    ///
    /// # Errors
    ///
    /// `invalid_token` when the token is malformed, expired, of the wrong
    /// type, revoked, or the revocation list cannot be consulted
    pub async fn verify_access_token(&self, token: &str) -> Result<TokenClaims, OAuth2Error> {
        let claims = self.codec.verify(token).map_err(|e| {
            debug!(error = %e, "Access token failed verification");
            OAuth2Error::invalid_token()
        })?;
        if claims.token_type != TokenType::Access {
            return Err(OAuth2Error::invalid_token());
        }

        match self
            .store
            .exists(&StoreKey::Blacklist(claims.jti.clone()))
            .await
        {
            Ok(false) => Ok(claims),
            Ok(true) => Err(OAuth2Error::invalid_token()),
            Err(e) => {
                warn!(error = %e, "Revocation list unavailable, rejecting token");
                Err(OAuth2Error::invalid_token())
            }
        }
    }

    /// OpenID discovery document for `base_url`
    ///
    /// # Errors
    ///
    /// `invalid_request` when `base_url` is not an absolute http(s) URL
    pub fn get_openid_configuration(
        &self,
        base_url: &str,
    ) -> Result<OpenIdConfiguration, OAuth2Error> {
        openid_configuration(self.codec.issuer(), base_url)
    }

    async fn active_user(&self, user_id: Uuid) -> Result<User, OAuth2Error> {
        match self.users.get_user_by_id(user_id).await {
            Ok(Some(user)) if user.is_active => Ok(user),
            Ok(_) => Err(OAuth2Error::access_denied("User account is not active")),
            Err(e) => Err(internal_failure(&e)),
        }
    }

    fn issue_access_token(
        &self,
        client: &ClientApplication,
        subject: &str,
        scope: &str,
    ) -> Result<String, OAuth2Error> {
        let claims = ClaimSet::new(subject, Some(scope.to_owned()))
            .with_claim("client_id", client.client_id.as_str());
        self.codec
            .issue(
                claims,
                TokenType::Access,
                Duration::seconds(client.access_token_lifetime),
            )
            .map(|issued| issued.token)
            .map_err(|e| internal_failure(&e))
    }

    fn issue_id_token(
        &self,
        client: &ClientApplication,
        user: &User,
        scope: &str,
        nonce: Option<&str>,
    ) -> Result<String, OAuth2Error> {
        let mut claims = ClaimSet::new(user.id.to_string(), None)
            .with_claim("aud", client.client_id.as_str());
        if let Some(nonce) = nonce {
            claims = claims.with_claim("nonce", nonce);
        }
        if scope_contains(scope, scopes::PROFILE) {
            claims = claims
                .with_claim("name", user.display_name())
                .with_claim("username", user.username.as_str());
        }
        if scope_contains(scope, scopes::EMAIL) {
            claims = claims
                .with_claim("email", user.email.as_str())
                .with_claim("email_verified", user.is_verified);
        }

        self.codec
            .issue(claims, TokenType::Id, self.id_token_lifetime)
            .map(|issued| issued.token)
            .map_err(|e| internal_failure(&e))
    }

    async fn issue_refresh_token(
        &self,
        client: &ClientApplication,
        user_id: Uuid,
        scope: &str,
    ) -> Result<String, OAuth2Error> {
        let lifetime = Duration::seconds(client.refresh_token_lifetime);
        let claims = ClaimSet::new(user_id.to_string(), Some(scope.to_owned()))
            .with_claim("client_id", client.client_id.as_str());
        let issued = self
            .codec
            .issue(claims, TokenType::Refresh, lifetime)
            .map_err(|e| internal_failure(&e))?;

        let record = RefreshTokenRecord {
            jti: issued.claims.jti.clone(),
            user_id,
            client_id: Some(client.client_id.clone()),
            scope: scope.to_owned(),
            issued_at: Utc::now(),
        };
        let key = StoreKey::RefreshToken {
            user_id,
            jti: issued.claims.jti,
        };
        self.store
            .put(&key, &record, to_std(lifetime))
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to store refresh token record");
                internal_failure(&e)
            })?;

        Ok(issued.token)
    }
}

/// Claims released for the scopes an access token carries
#[must_use]
pub fn project_user_info(user: &User, claims: &TokenClaims) -> UserInfo {
    let mut info = UserInfo {
        sub: user.id.to_string(),
        ..UserInfo::default()
    };
    if claims.has_scope(scopes::PROFILE) {
        info.name = Some(user.display_name().to_owned());
        info.username = Some(user.username.clone());
        info.picture.clone_from(&user.picture);
    }
    if claims.has_scope(scopes::EMAIL) {
        info.email = Some(user.email.clone());
        info.email_verified = Some(user.is_verified);
    }
    if claims.has_scope(scopes::PHONE) {
        info.phone_number.clone_from(&user.phone_number);
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn claims(scope: &str) -> TokenClaims {
        TokenClaims {
            sub: Uuid::new_v4().to_string(),
            scope: Some(scope.to_owned()),
            token_type: TokenType::Access,
            jti: "j".to_owned(),
            iat: 0,
            exp: 0,
            iss: "iss".to_owned(),
            extra: Map::new(),
        }
    }

    fn user() -> User {
        User {
            full_name: Some("Ada Lovelace".to_owned()),
            phone_number: Some("+15550100".to_owned()),
            is_verified: true,
            ..User::new("ada", "ada@example.com")
        }
    }

    #[test]
    fn test_scope_subset() {
        assert!(is_scope_subset("openid", "openid profile"));
        assert!(is_scope_subset("", "openid"));
        assert!(!is_scope_subset("openid email", "openid profile"));
    }

    #[test]
    fn test_openid_only_projects_sub() {
        let info = project_user_info(&user(), &claims("openid"));
        assert!(info.name.is_none() && info.email.is_none() && info.phone_number.is_none());
    }

    #[test]
    fn test_projection_follows_scopes() {
        let info = project_user_info(&user(), &claims("openid profile email phone"));
        assert_eq!(info.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(info.username.as_deref(), Some("ada"));
        assert_eq!(info.email.as_deref(), Some("ada@example.com"));
        assert_eq!(info.email_verified, Some(true));
        assert_eq!(info.phone_number.as_deref(), Some("+15550100"));
    }
}
