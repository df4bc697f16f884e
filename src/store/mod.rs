// ABOUTME: Ephemeral secret store for sessions, authorization codes, and revocation state
// ABOUTME: Pluggable backends (in-memory, Redis) behind a fail-closed, timeout-bounded facade
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Ephemeral Secret Store
//!
//! Every short-lived secret the authorization engine relies on lives here:
//! sessions, one-time authorization codes, refresh token records, revoked
//! access token markers, and rate-limit counters.
//!
//! Backends implement [`StoreBackend`] over raw bytes. Callers go through
//! [`SecretStore`], which serializes values, bounds every call with the
//! configured operation timeout, and fails closed:
//!
//! - reads (`get`, `take`) log the failure and report the key as absent
//! - writes (`put`, `delete`, `increment`, `delete_matching`) return an error
//! - `exists` returns an error so callers can pick the safe interpretation
//!
//! `take` is a single atomic fetch-and-delete on every backend. Two
//! concurrent `take` calls for the same key never both observe the value.

/// In-memory backend with an LRU for rate counters and TTL sweeping
pub mod memory;
/// Redis backend with `ConnectionManager` and atomic commands
pub mod redis;

use crate::config::store::{StoreBackendKind, StoreConfig};
use crate::constants::store::{
    AUTH_CODE_PREFIX, BLACKLIST_PREFIX, RATE_LIMIT_PREFIX, REFRESH_TOKEN_PREFIX, SESSION_PREFIX,
};
use crate::errors::{AppError, AppResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Typed key into one of the store namespaces
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// `session:{id}`
    Session(String),
    /// `auth_code:{code}`
    AuthCode(String),
    /// `refresh_token:{user_id}:{jti}`
    RefreshToken {
        /// Token owner
        user_id: Uuid,
        /// Token identifier
        jti: String,
    },
    /// `blacklist:{jti}`
    Blacklist(String),
    /// `rate_limit:{identifier}:{endpoint}`
    RateLimit {
        /// Client IP or other caller identity
        identifier: String,
        /// Endpoint name
        endpoint: String,
    },
}

impl StoreKey {
    /// Glob pattern matching every refresh token record of a user
    #[must_use]
    pub fn refresh_tokens_of(user_id: Uuid) -> String {
        format!("{REFRESH_TOKEN_PREFIX}{user_id}:*")
    }

    /// Namespace name for log fields; never includes the secret part
    #[must_use]
    pub const fn namespace(&self) -> &'static str {
        match self {
            Self::Session(_) => "session",
            Self::AuthCode(_) => "auth_code",
            Self::RefreshToken { .. } => "refresh_token",
            Self::Blacklist(_) => "blacklist",
            Self::RateLimit { .. } => "rate_limit",
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(id) => write!(f, "{SESSION_PREFIX}{id}"),
            Self::AuthCode(code) => write!(f, "{AUTH_CODE_PREFIX}{code}"),
            Self::RefreshToken { user_id, jti } => {
                write!(f, "{REFRESH_TOKEN_PREFIX}{user_id}:{jti}")
            }
            Self::Blacklist(jti) => write!(f, "{BLACKLIST_PREFIX}{jti}"),
            Self::RateLimit {
                identifier,
                endpoint,
            } => write!(f, "{RATE_LIMIT_PREFIX}{identifier}:{endpoint}"),
        }
    }
}

/// Storage backend over raw bytes
///
/// Implementations must make `take` and `increment` atomic per key.
#[async_trait::async_trait]
pub trait StoreBackend: Send + Sync {
    /// Store bytes under `key`, replacing any previous value, expiring after `ttl`
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> AppResult<()>;

    /// Fetch the bytes under `key` if present and unexpired
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>>;

    /// Atomically fetch and remove the bytes under `key`
    async fn take(&self, key: &str) -> AppResult<Option<Vec<u8>>>;

    /// Remove `key`, returning whether it was present
    async fn delete(&self, key: &str) -> AppResult<bool>;

    /// Whether `key` is present and unexpired
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// Atomically increment the counter under `key`
    ///
    /// The TTL is only set when the counter is created, so the window is
    /// fixed from the first increment.
    async fn increment(&self, key: &str, window: Duration) -> AppResult<u64>;

    /// Remove every key matching a glob pattern, returning how many went
    async fn delete_matching(&self, pattern: &str) -> AppResult<u64>;

    /// Verify the backend answers
    async fn health_check(&self) -> AppResult<()>;

    /// Release background tasks and connections
    async fn close(&self) -> AppResult<()>;
}

/// Fail-closed facade over a [`StoreBackend`]
///
/// Cheap to clone; all clones share the backend and the closed flag. The
/// store is injected into every engine rather than held in a global.
#[derive(Clone)]
pub struct SecretStore {
    backend: Arc<dyn StoreBackend>,
    operation_timeout: Duration,
    closed: Arc<AtomicBool>,
}

impl SecretStore {
    /// Open the backend selected by `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis backend is selected and cannot connect
    pub async fn open(config: StoreConfig) -> AppResult<Self> {
        let backend: Arc<dyn StoreBackend> = match config.backend {
            StoreBackendKind::Memory => Arc::new(memory::InMemoryStore::new(&config)),
            StoreBackendKind::Redis => Arc::new(redis::RedisStore::connect(&config).await?),
        };
        info!(
            backend = %config.backend,
            timeout_ms = config.operation_timeout.as_millis(),
            "Secret store opened"
        );
        Ok(Self::with_backend(backend, config.operation_timeout))
    }

    /// Wrap an existing backend
    #[must_use]
    pub fn with_backend(backend: Arc<dyn StoreBackend>, operation_timeout: Duration) -> Self {
        Self {
            backend,
            operation_timeout,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Store a value
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized or the backend fails
    pub async fn put<T: Serialize + Sync>(
        &self,
        key: &StoreKey,
        value: &T,
        ttl: Duration,
    ) -> AppResult<()> {
        let bytes = serde_json::to_vec(value)?;
        let key = key.to_string();
        self.bounded("put", self.backend.put(&key, bytes, ttl)).await
    }

    /// Fetch a value, treating any failure as absent
    pub async fn get<T: DeserializeOwned>(&self, key: &StoreKey) -> Option<T> {
        let rendered = key.to_string();
        let result = self.bounded("get", self.backend.get(&rendered)).await;
        Self::decode_or_absent("get", key, result)
    }

    /// Atomically fetch and remove a value, treating any failure as absent
    ///
    /// A failed `take` may or may not have removed the key. Callers must not
    /// retry it.
    pub async fn take<T: DeserializeOwned>(&self, key: &StoreKey) -> Option<T> {
        let rendered = key.to_string();
        let result = self.bounded("take", self.backend.take(&rendered)).await;
        Self::decode_or_absent("take", key, result)
    }

    /// Remove a value, returning whether it was present
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or times out
    pub async fn delete(&self, key: &StoreKey) -> AppResult<bool> {
        let key = key.to_string();
        self.bounded("delete", self.backend.delete(&key)).await
    }

    /// Whether a key is present
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or times out
    pub async fn exists(&self, key: &StoreKey) -> AppResult<bool> {
        let key = key.to_string();
        self.bounded("exists", self.backend.exists(&key)).await
    }

    /// Increment a fixed-window counter, returning the new count
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or times out
    pub async fn increment(&self, key: &StoreKey, window: Duration) -> AppResult<u64> {
        let key = key.to_string();
        self.bounded("increment", self.backend.increment(&key, window))
            .await
    }

    /// Remove every key matching a glob pattern
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or times out
    pub async fn delete_matching(&self, pattern: &str) -> AppResult<u64> {
        self.bounded("delete_matching", self.backend.delete_matching(pattern))
            .await
    }

    /// Check the backend answers within the operation timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed, unreachable, or slow
    pub async fn health_check(&self) -> AppResult<()> {
        self.bounded("health_check", self.backend.health_check())
            .await
    }

    /// Close the store; every later call fails closed
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to release its resources
    pub async fn close(&self) -> AppResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!("Closing secret store");
        self.backend.close().await
    }

    /// Whether `close` has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>> + Send,
    {
        if self.is_closed() {
            return Err(AppError::storage_unavailable("Secret store is closed"));
        }
        time::timeout(self.operation_timeout, call)
            .await
            .unwrap_or_else(|_| {
                warn!(
                    operation,
                    timeout_ms = self.operation_timeout.as_millis(),
                    "Secret store operation timed out"
                );
                Err(AppError::storage_unavailable(format!(
                    "Secret store {operation} timed out"
                )))
            })
    }

    fn decode_or_absent<T: DeserializeOwned>(
        operation: &'static str,
        key: &StoreKey,
        result: AppResult<Option<Vec<u8>>>,
    ) -> Option<T> {
        match result {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(operation, namespace = key.namespace(), error = %e, "Discarding undecodable store value");
                    None
                }
            },
            Ok(None) => {
                debug!(operation, namespace = key.namespace(), "Store miss");
                None
            }
            Err(e) => {
                warn!(operation, namespace = key.namespace(), error = %e, "Store read failed, treating as absent");
                None
            }
        }
    }
}
