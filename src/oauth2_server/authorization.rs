// ABOUTME: Authorization endpoint state machine: request validation, consent, code minting
// ABOUTME: Decides direct versus redirected errors and stores single-use authorization codes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Authorization Flow
//!
//! [`AuthorizationFlowEngine`] validates `/authorize` requests in a fixed
//! order. Until the redirect URI is known to belong to the client, errors go
//! straight back to the user-agent. After that they are delivered to the
//! client as `error=...&state=...` query parameters.
//!
//! 1. client exists and is active
//! 2. `response_type` is registered for the client
//! 3. `redirect_uri` exactly matches a registered URI
//! 4. every requested scope is allowed (absent scope falls back to the default)
//! 5. PKCE parameters are well formed
//! 6. a user is authenticated, otherwise login is required
//! 7. the user is still active
//! 8. consent is collected when the client requires it
//! 9. a code is minted and stored

use super::models::{
    AuthorizationOutcome, AuthorizeRequest, ConsentDecision, ConsentPrompt, OAuth2Error,
};
use super::{internal_failure, pkce};
use crate::clients::ClientRegistry;
use crate::config::{OAuthPolicyConfig, TokenLifetimeConfig};
use crate::constants::oauth::scopes;
use crate::crypto::generate_secret_token;
use crate::logging::AuditLogger;
use crate::models::{AuthorizationCodeRecord, ClientApplication, User};
use crate::store::{SecretStore, StoreKey};
use crate::users::UserDirectory;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Parameters that end up inside a stored authorization code
struct CodeGrant<'a> {
    user_id: Uuid,
    redirect_uri: &'a str,
    scope: &'a str,
    state: Option<String>,
    nonce: Option<String>,
    code_challenge: Option<String>,
    code_challenge_method: Option<String>,
}

/// Authorization endpoint logic
#[derive(Clone)]
pub struct AuthorizationFlowEngine {
    clients: ClientRegistry,
    users: Arc<dyn UserDirectory>,
    store: SecretStore,
    policy: OAuthPolicyConfig,
    code_lifetime_cap_secs: i64,
}

impl AuthorizationFlowEngine {
    /// Create an engine
    #[must_use]
    pub fn new(
        clients: ClientRegistry,
        users: Arc<dyn UserDirectory>,
        store: SecretStore,
        policy: OAuthPolicyConfig,
        lifetimes: &TokenLifetimeConfig,
    ) -> Self {
        Self {
            clients,
            users,
            store,
            policy,
            code_lifetime_cap_secs: lifetimes.authorization_code_minutes * 60,
        }
    }

    /// Handle `GET /authorize`
    ///
    /// `user_id` is the authenticated end user, if any. When it is `None`
    /// and the request is otherwise valid, the caller must send the user to
    /// login and replay the returned request afterwards.
    pub async fn handle_authorization_request(
        &self,
        request: AuthorizeRequest,
        user_id: Option<Uuid>,
    ) -> AuthorizationOutcome {
        let request = request.normalized();

        let Some(client) = self.clients.find_by_client_id(&request.client_id).await else {
            debug!(client_id = %request.client_id, "Authorization request for unknown client");
            return AuthorizationOutcome::direct_error(OAuth2Error::invalid_client());
        };

        if !ClientRegistry::supports_response_type(&client, &request.response_type) {
            return AuthorizationOutcome::direct_error(OAuth2Error::unsupported_response_type());
        }

        if !ClientRegistry::is_redirect_uri_allowed(&client, &request.redirect_uri) {
            warn!(
                client_id = %client.client_id,
                redirect_uri = %request.redirect_uri,
                "Rejected unregistered redirect_uri"
            );
            return AuthorizationOutcome::direct_error(OAuth2Error::invalid_redirect_uri());
        }

        // The redirect URI is trusted from here on
        let redirect_uri = request.redirect_uri.as_str();
        let state = request.state.clone();

        let scope = match Self::resolve_scope(&client, request.scope.as_deref()) {
            Ok(scope) => scope,
            Err(error) => {
                return AuthorizationOutcome::redirected_error(error, redirect_uri, state)
            }
        };

        if let Err(error) = self.check_pkce(
            &client,
            request.code_challenge.as_deref(),
            request.code_challenge_method.as_deref(),
        ) {
            return AuthorizationOutcome::redirected_error(error, redirect_uri, state);
        }

        let Some(user_id) = user_id else {
            return AuthorizationOutcome::LoginRequired { request };
        };

        if let Err(error) = self.active_user(user_id).await {
            return AuthorizationOutcome::redirected_error(error, redirect_uri, state);
        }

        if client.require_consent {
            let prompt = ConsentPrompt {
                client_id: client.client_id.clone(),
                client_name: client.name.clone(),
                client_description: client.description.clone(),
                client_logo: client.logo_url.clone(),
                website_url: client.website_url.clone(),
                privacy_policy_url: client.privacy_policy_url.clone(),
                terms_of_service_url: client.terms_of_service_url.clone(),
                requested_scopes: scope.split_whitespace().map(str::to_owned).collect(),
                request: AuthorizeRequest {
                    scope: Some(scope.clone()),
                    ..request.clone()
                },
            };
            return AuthorizationOutcome::ConsentRequired(Box::new(prompt));
        }

        self.issue_code(
            &client,
            CodeGrant {
                user_id,
                redirect_uri,
                scope: &scope,
                state,
                nonce: request.nonce.clone(),
                code_challenge: request.code_challenge.clone(),
                code_challenge_method: request.code_challenge_method.clone(),
            },
        )
        .await
    }

    /// Handle `POST /consent`
    ///
    /// The form round-trips through the user-agent, so client, redirect URI,
    /// scope and PKCE parameters are validated again before anything is
    /// minted or any redirect is made.
    pub async fn handle_consent(
        &self,
        decision: ConsentDecision,
        user_id: Uuid,
    ) -> AuthorizationOutcome {
        let state = decision.state.filter(|s| !s.is_empty());

        let Some(client) = self.clients.find_by_client_id(&decision.client_id).await else {
            return AuthorizationOutcome::direct_error(OAuth2Error::invalid_client());
        };

        if !ClientRegistry::is_redirect_uri_allowed(&client, &decision.redirect_uri) {
            return AuthorizationOutcome::direct_error(OAuth2Error::invalid_redirect_uri());
        }
        let redirect_uri = decision.redirect_uri.as_str();

        if !decision.granted {
            AuditLogger::log_consent_denied(&client.client_id, user_id);
            return AuthorizationOutcome::redirected_error(
                OAuth2Error::access_denied("The user denied the request"),
                redirect_uri,
                state,
            );
        }

        let scope = match Self::resolve_scope(&client, Some(decision.scope.as_str())) {
            Ok(scope) => scope,
            Err(error) => {
                return AuthorizationOutcome::redirected_error(error, redirect_uri, state)
            }
        };

        let code_challenge = decision.code_challenge.filter(|c| !c.is_empty());
        let code_challenge_method = decision.code_challenge_method.filter(|m| !m.is_empty());
        if let Err(error) = self.check_pkce(
            &client,
            code_challenge.as_deref(),
            code_challenge_method.as_deref(),
        ) {
            return AuthorizationOutcome::redirected_error(error, redirect_uri, state);
        }

        if let Err(error) = self.active_user(user_id).await {
            return AuthorizationOutcome::redirected_error(error, redirect_uri, state);
        }

        self.issue_code(
            &client,
            CodeGrant {
                user_id,
                redirect_uri,
                scope: &scope,
                state,
                nonce: decision.nonce.filter(|n| !n.is_empty()),
                code_challenge,
                code_challenge_method,
            },
        )
        .await
    }

    /// Requested scope, or the default scope narrowed to what the client may use
    fn resolve_scope(
        client: &ClientApplication,
        requested: Option<&str>,
    ) -> Result<String, OAuth2Error> {
        let scope = match requested.map(str::trim).filter(|s| !s.is_empty()) {
            Some(requested) => {
                if !ClientRegistry::is_scope_allowed(client, requested) {
                    return Err(OAuth2Error::invalid_scope(
                        "Requested scope is not allowed for this client",
                    ));
                }
                requested.split_whitespace().collect::<Vec<_>>().join(" ")
            }
            None => scopes::DEFAULT_USER_SCOPE
                .split_whitespace()
                .filter(|s| ClientRegistry::is_scope_allowed(client, s))
                .collect::<Vec<_>>()
                .join(" "),
        };

        if scope.is_empty() {
            return Err(OAuth2Error::invalid_scope("No usable scope requested"));
        }
        Ok(scope)
    }

    fn check_pkce(
        &self,
        client: &ClientApplication,
        code_challenge: Option<&str>,
        code_challenge_method: Option<&str>,
    ) -> Result<(), OAuth2Error> {
        pkce::validate_challenge(code_challenge, code_challenge_method)?;
        if code_challenge.is_none() && self.policy.require_pkce && !client.is_confidential {
            return Err(OAuth2Error::invalid_request(
                "code_challenge is required for public clients",
            ));
        }
        Ok(())
    }

    async fn active_user(&self, user_id: Uuid) -> Result<User, OAuth2Error> {
        match self.users.get_user_by_id(user_id).await {
            Ok(Some(user)) if user.is_active => Ok(user),
            Ok(_) => Err(OAuth2Error::access_denied("User account is not active")),
            Err(e) => Err(internal_failure(&e)),
        }
    }

    async fn issue_code(
        &self,
        client: &ClientApplication,
        grant: CodeGrant<'_>,
    ) -> AuthorizationOutcome {
        let code = match generate_secret_token() {
            Ok(code) => code,
            Err(e) => {
                return AuthorizationOutcome::redirected_error(
                    internal_failure(&e),
                    grant.redirect_uri,
                    grant.state,
                )
            }
        };

        let record = AuthorizationCodeRecord {
            user_id: grant.user_id,
            client_id: client.client_id.clone(),
            redirect_uri: grant.redirect_uri.to_owned(),
            scope: grant.scope.to_owned(),
            nonce: grant.nonce,
            code_challenge: grant.code_challenge,
            code_challenge_method: grant.code_challenge_method,
            created_at: Utc::now(),
        };

        let ttl = self.code_ttl(client);
        if let Err(e) = self
            .store
            .put(&StoreKey::AuthCode(code.clone()), &record, ttl)
            .await
        {
            warn!(client_id = %client.client_id, error = %e, "Failed to store authorization code");
            return AuthorizationOutcome::redirected_error(
                internal_failure(&e),
                grant.redirect_uri,
                grant.state,
            );
        }

        AuditLogger::log_code_issued(&client.client_id, grant.user_id, grant.scope);

        AuthorizationOutcome::Issued {
            redirect_uri: grant.redirect_uri.to_owned(),
            code,
            state: grant.state,
        }
    }

    /// The client's code lifetime, capped by the server-wide maximum
    fn code_ttl(&self, client: &ClientApplication) -> Duration {
        let secs = if client.authorization_code_lifetime > 0 {
            client
                .authorization_code_lifetime
                .min(self.code_lifetime_cap_secs)
        } else {
            self.code_lifetime_cap_secs
        };
        Duration::from_secs(secs.max(1).unsigned_abs())
    }
}
