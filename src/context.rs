// ABOUTME: Shared server resources handed to every route group
// ABOUTME: Builds the store, signing keys, directories, and OAuth engines from configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Server Resources
//!
//! Everything a request handler needs, constructed once at startup and
//! passed to the routers as `Arc<ServerResources>`. Nothing here is a
//! process-wide global: tests build their own resources around an
//! in-memory store and generated keys.

use crate::clients::{ClientDirectory, ClientRegistry, InMemoryClientDirectory};
use crate::config::ServerConfig;
use crate::errors::AppResult;
use crate::jwks::JwksManager;
use crate::oauth2_server::{AuthorizationFlowEngine, OAuth2RateLimiter, TokenExchangeEngine};
use crate::sessions::SessionManager;
use crate::store::SecretStore;
use crate::tokens::TokenCodec;
use crate::users::{InMemoryUserDirectory, UserDirectory};
use std::sync::Arc;
use tracing::info;

/// Dependencies shared by all handlers
#[derive(Clone)]
pub struct ServerResources {
    /// Loaded configuration
    pub config: Arc<ServerConfig>,
    /// Ephemeral secret store
    pub store: SecretStore,
    /// Signing keys and JWKS
    pub jwks: Arc<JwksManager>,
    /// Token signing and verification
    pub tokens: TokenCodec,
    /// Client validation
    pub clients: ClientRegistry,
    /// User directory
    pub users: Arc<dyn UserDirectory>,
    /// `/authorize` and `/consent`
    pub authorization: AuthorizationFlowEngine,
    /// `/token` and `/userinfo`
    pub token_exchange: TokenExchangeEngine,
    /// `/auth/*`
    pub sessions: SessionManager,
    /// Per-endpoint rate limits
    pub rate_limiter: OAuth2RateLimiter,
}

impl ServerResources {
    /// Wire engines around already-constructed collaborators
    #[must_use]
    pub fn new(
        config: ServerConfig,
        store: SecretStore,
        jwks: Arc<JwksManager>,
        client_directory: Arc<dyn ClientDirectory>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        let tokens = TokenCodec::new(
            jwks.clone(),
            config.issuer.clone(),
            config.lifetimes.leeway_secs,
        );
        let clients = ClientRegistry::new(client_directory);

        let authorization = AuthorizationFlowEngine::new(
            clients.clone(),
            users.clone(),
            store.clone(),
            config.oauth.clone(),
            &config.lifetimes,
        );
        let token_exchange = TokenExchangeEngine::new(
            clients.clone(),
            users.clone(),
            store.clone(),
            tokens.clone(),
            config.oauth.clone(),
            &config.lifetimes,
        );
        let sessions = SessionManager::new(
            users.clone(),
            store.clone(),
            tokens.clone(),
            config.lifetimes.clone(),
            config.oauth.clone(),
        );
        let rate_limiter = OAuth2RateLimiter::new(store.clone(), config.rate_limit_enabled);

        Self {
            config: Arc::new(config),
            store,
            jwks,
            tokens,
            clients,
            users,
            authorization,
            token_exchange,
            sessions,
            rate_limiter,
        }
    }

    /// Open the store, load the signing keys and seed the directories
    ///
    /// # Errors
    ///
    /// Fails when the store cannot be opened, the key pair cannot be read or
    /// does not match, or a seed file is unreadable or invalid
    pub async fn from_config(config: ServerConfig) -> AppResult<Self> {
        let jwks = Arc::new(
            JwksManager::load_from_files(
                &config.keys.key_id,
                &config.keys.private_key_path,
                &config.keys.public_key_path,
            )
            .await?,
        );

        let clients = match &config.directories.clients_file {
            Some(path) => InMemoryClientDirectory::from_yaml_file(path).await?,
            None => InMemoryClientDirectory::new(),
        };
        let users = match &config.directories.users_file {
            Some(path) => InMemoryUserDirectory::from_yaml_file(path).await?,
            None => InMemoryUserDirectory::new(),
        };
        info!(
            clients = clients.len(),
            users = users.len(),
            "Directories loaded"
        );

        let store = SecretStore::open(config.store.clone()).await?;

        Ok(Self::new(
            config,
            store,
            jwks,
            Arc::new(clients),
            Arc::new(users),
        ))
    }
}
