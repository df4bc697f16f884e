// ABOUTME: DashMap-backed client directory, seedable from a YAML file
// ABOUTME: Seeds carry plaintext secrets which are hashed with Argon2 on load
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::ClientDirectory;
use crate::constants::oauth::{
    grant_types, MAX_CLIENT_ACCESS_TOKEN_LIFETIME_SECS, MAX_CLIENT_AUTHORIZATION_CODE_LIFETIME_SECS,
    MAX_CLIENT_REFRESH_TOKEN_LIFETIME_SECS,
};
use crate::crypto::hash_client_secret;
use crate::errors::{AppError, AppResult};
use crate::models::ClientApplication;
use dashmap::DashMap;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::info;

/// A client as written in a seed file
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSeed {
    /// Client definition
    #[serde(flatten)]
    pub client: ClientApplication,
    /// Plaintext secret, hashed before it is stored
    #[serde(default)]
    pub client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSeedFile {
    #[serde(default)]
    clients: Vec<ClientSeed>,
}

fn validate_seed(client: &ClientApplication) -> AppResult<()> {
    let id = &client.client_id;

    if !client.is_confidential
        && client
            .grant_types
            .iter()
            .any(|grant| grant == grant_types::CLIENT_CREDENTIALS)
    {
        return Err(AppError::config_invalid(format!(
            "Public client '{id}' cannot use the client_credentials grant"
        )));
    }

    let lifetimes = [
        (
            "access_token_lifetime",
            client.access_token_lifetime,
            MAX_CLIENT_ACCESS_TOKEN_LIFETIME_SECS,
        ),
        (
            "refresh_token_lifetime",
            client.refresh_token_lifetime,
            MAX_CLIENT_REFRESH_TOKEN_LIFETIME_SECS,
        ),
        (
            "authorization_code_lifetime",
            client.authorization_code_lifetime,
            MAX_CLIENT_AUTHORIZATION_CODE_LIFETIME_SECS,
        ),
    ];
    for (field, value, max) in lifetimes {
        if !(1..=max).contains(&value) {
            return Err(AppError::config_invalid(format!(
                "Client '{id}' {field} must be between 1 and {max} seconds, got {value}"
            )));
        }
    }
    Ok(())
}

/// Concurrent in-memory client directory
///
/// Reads never block on writers beyond a shard lock, so admin updates are
/// visible to the next lookup.
#[derive(Clone, Default)]
pub struct InMemoryClientDirectory {
    clients: Arc<DashMap<String, ClientApplication>>,
}

impl InMemoryClientDirectory {
    /// Empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a client
    pub fn upsert(&self, client: ClientApplication) {
        self.clients.insert(client.client_id.clone(), client);
    }

    /// Register a seed, hashing its secret
    ///
    /// # Errors
    ///
    /// Returns a `ConfigInvalid` error if a confidential seed has no secret,
    /// a public seed asks for `client_credentials`, or a lifetime is out of
    /// range; hashing failures are passed through
    pub fn insert_seed(&self, seed: ClientSeed) -> AppResult<()> {
        let mut client = seed.client;
        validate_seed(&client)?;
        if let Some(secret) = seed.client_secret {
            client.client_secret_hash = Some(hash_client_secret(&secret)?);
        }
        if client.is_confidential && client.client_secret_hash.is_none() {
            return Err(AppError::config_invalid(format!(
                "Confidential client '{}' has no client_secret",
                client.client_id
            )));
        }
        self.upsert(client);
        Ok(())
    }

    /// Remove a client, returning it if present
    pub fn remove(&self, client_id: &str) -> Option<ClientApplication> {
        self.clients.remove(client_id).map(|(_, client)| client)
    }

    /// Number of registered clients
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no clients are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Load a directory from a YAML file with a top-level `clients:` list
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed
    pub async fn from_yaml_file(path: &Path) -> AppResult<Self> {
        let raw = fs::read_to_string(path).await.map_err(|e| {
            AppError::config(format!("Cannot read clients file {}: {e}", path.display()))
        })?;
        let file: ClientSeedFile = serde_yaml::from_str(&raw).map_err(|e| {
            AppError::config_invalid(format!("Invalid clients file {}: {e}", path.display()))
        })?;

        let directory = Self::new();
        for seed in file.clients {
            directory.insert_seed(seed)?;
        }
        info!(count = directory.len(), path = %path.display(), "Loaded client applications");
        Ok(directory)
    }
}

#[async_trait::async_trait]
impl ClientDirectory for InMemoryClientDirectory {
    async fn find_by_client_id(&self, client_id: &str) -> AppResult<Option<ClientApplication>> {
        Ok(self.clients.get(client_id).map(|entry| entry.value().clone()))
    }
}
