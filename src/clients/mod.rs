// ABOUTME: Client registry adapter: read-only validation over registered OAuth clients
// ABOUTME: Credential check, redirect URI and scope allow-lists, grant/response type support
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Client Registry
//!
//! The engines never touch client storage directly. They go through
//! [`ClientRegistry`], which wraps any [`ClientDirectory`] and enforces:
//!
//! - inactive clients are indistinguishable from unknown ones
//! - confidential clients must present a matching secret
//! - redirect URIs match the allow-list exactly (no prefix matching)
//! - every requested scope token is in the client's allow-list

/// In-memory client directory with YAML seeding
pub mod memory;

use crate::constants::oauth::grant_types;
use crate::crypto::verify_client_secret;
use crate::errors::AppResult;
use crate::models::ClientApplication;
use std::sync::Arc;
use tokio::task;
use tracing::{debug, warn};

pub use memory::{ClientSeed, InMemoryClientDirectory};

/// Backing store of registered client applications
///
/// Admin tooling may write concurrently with these reads; implementations
/// must not fail a read because a write is in flight.
#[async_trait::async_trait]
pub trait ClientDirectory: Send + Sync {
    /// Look up a client by its public identifier
    async fn find_by_client_id(&self, client_id: &str) -> AppResult<Option<ClientApplication>>;
}

/// Validation surface over a [`ClientDirectory`]
#[derive(Clone)]
pub struct ClientRegistry {
    directory: Arc<dyn ClientDirectory>,
}

impl ClientRegistry {
    /// Wrap a directory
    #[must_use]
    pub fn new(directory: Arc<dyn ClientDirectory>) -> Self {
        Self { directory }
    }

    /// Find an active client
    ///
    /// Lookups are idempotent, so a failed one is retried once before the
    /// client is reported absent.
    pub async fn find_by_client_id(&self, client_id: &str) -> Option<ClientApplication> {
        let client = match self.directory.find_by_client_id(client_id).await {
            Ok(client) => client,
            Err(first) => {
                warn!(client_id, error = %first, "Client lookup failed, retrying once");
                match self.directory.find_by_client_id(client_id).await {
                    Ok(client) => client,
                    Err(e) => {
                        warn!(client_id, error = %e, "Client lookup failed, treating client as unknown");
                        None
                    }
                }
            }
        };

        match client {
            Some(client) if client.is_active => Some(client),
            Some(_) => {
                debug!(client_id, "Client is inactive");
                None
            }
            None => None,
        }
    }

    /// Authenticate a client
    ///
    /// Confidential clients need a secret matching the stored hash. Public
    /// clients are accepted without one; a secret sent by a public client is
    /// ignored.
    pub async fn validate_credentials(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> Option<ClientApplication> {
        let client = self.find_by_client_id(client_id).await?;

        if !client.is_confidential {
            return Some(client);
        }

        let (Some(secret), Some(stored_hash)) = (client_secret, client.client_secret_hash.clone())
        else {
            debug!(client_id, "Confidential client presented no secret");
            return None;
        };

        let secret = secret.to_owned();
        let matches = task::spawn_blocking(move || verify_client_secret(&secret, &stored_hash))
            .await
            .unwrap_or(false);

        if matches {
            Some(client)
        } else {
            debug!(client_id, "Client secret mismatch");
            None
        }
    }

    /// Exact-match redirect URI check
    #[must_use]
    pub fn is_redirect_uri_allowed(client: &ClientApplication, redirect_uri: &str) -> bool {
        client.redirect_uris.iter().any(|allowed| allowed == redirect_uri)
    }

    /// Every space-delimited token of `requested_scope` must be allowed
    ///
    /// An empty request is vacuously allowed.
    #[must_use]
    pub fn is_scope_allowed(client: &ClientApplication, requested_scope: &str) -> bool {
        requested_scope
            .split_whitespace()
            .all(|scope| client.allowed_scopes.iter().any(|allowed| allowed == scope))
    }

    /// Whether the client registered `response_type`
    #[must_use]
    pub fn supports_response_type(client: &ClientApplication, response_type: &str) -> bool {
        client.response_types.iter().any(|t| t == response_type)
    }

    /// Whether the client registered `grant_type`
    ///
    /// `client_credentials` is only honored for confidential clients, since a
    /// public client never proves who it is.
    #[must_use]
    pub fn supports_grant_type(client: &ClientApplication, grant_type: &str) -> bool {
        if grant_type == grant_types::CLIENT_CREDENTIALS && !client.is_confidential {
            return false;
        }
        client.grant_types.iter().any(|t| t == grant_type)
    }
}
