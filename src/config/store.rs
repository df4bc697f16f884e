// ABOUTME: Secret store configuration: backend selection, sizing, timeouts, Redis retry policy
// ABOUTME: Loaded from STORE_* and REDIS_* environment variables
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::environment::{env_var_or, parse_env};
use crate::constants::store::{
    DEFAULT_CLEANUP_INTERVAL_SECS, DEFAULT_OPERATION_TIMEOUT_MS, DEFAULT_STORE_MAX_ENTRIES,
    REDIS_CONNECT_TIMEOUT_SECS, REDIS_INITIAL_CONNECTION_RETRIES, REDIS_INITIAL_RETRY_DELAY_MS,
    REDIS_MAX_RETRY_DELAY_MS, REDIS_RECONNECTION_RETRIES, REDIS_RESPONSE_TIMEOUT_SECS,
};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which backend holds the secret store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    /// Process-local LRU map; secrets vanish on restart
    #[default]
    Memory,
    /// Shared Redis database
    Redis,
}

impl fmt::Display for StoreBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Redis => write!(f, "redis"),
        }
    }
}

impl FromStr for StoreBackendKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "in-memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(AppError::config_invalid(format!(
                "STORE_BACKEND must be 'memory' or 'redis', got '{other}'"
            ))),
        }
    }
}

/// Secret store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Selected backend
    pub backend: StoreBackendKind,
    /// Redis connection URL, required for the redis backend
    pub redis_url: Option<String>,
    /// Per-tier capacity of the in-memory backend (rate counters evict, secrets refuse)
    pub max_entries: usize,
    /// Sweep interval for expired in-memory entries
    pub cleanup_interval: Duration,
    /// Whether to spawn the in-memory sweeper (off in most tests)
    pub enable_background_cleanup: bool,
    /// Upper bound on every store call; exceeding it fails closed
    pub operation_timeout: Duration,
    /// Redis connection and retry policy
    pub redis_connection: RedisConnectionConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackendKind::Memory,
            redis_url: None,
            max_entries: DEFAULT_STORE_MAX_ENTRIES,
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            enable_background_cleanup: true,
            operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
            redis_connection: RedisConnectionConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Load store configuration from environment
    ///
    /// # Errors
    ///
    /// Returns a `ConfigInvalid` error for unparseable values, or when the
    /// redis backend is selected without `REDIS_URL`
    pub fn from_env() -> AppResult<Self> {
        let backend: StoreBackendKind = env_var_or("STORE_BACKEND", "memory").parse()?;
        let redis_url = env::var("REDIS_URL").ok().filter(|url| !url.is_empty());

        if backend == StoreBackendKind::Redis && redis_url.is_none() {
            return Err(AppError::config_invalid(
                "STORE_BACKEND=redis requires REDIS_URL",
            ));
        }

        Ok(Self {
            backend,
            redis_url,
            max_entries: parse_env("STORE_MAX_ENTRIES", DEFAULT_STORE_MAX_ENTRIES)?,
            cleanup_interval: Duration::from_secs(parse_env(
                "STORE_CLEANUP_INTERVAL_SECS",
                DEFAULT_CLEANUP_INTERVAL_SECS,
            )?),
            enable_background_cleanup: true,
            operation_timeout: Duration::from_millis(parse_env(
                "STORE_OPERATION_TIMEOUT_MS",
                DEFAULT_OPERATION_TIMEOUT_MS,
            )?),
            redis_connection: RedisConnectionConfig::from_env()?,
        })
    }
}

/// Redis connection and retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConnectionConfig {
    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,
    /// Response timeout in seconds
    pub response_timeout_secs: u64,
    /// Reconnection attempts after a dropped connection
    pub reconnection_retries: usize,
    /// Attempts for the initial connection at startup
    pub initial_connection_retries: u32,
    /// First retry delay in milliseconds, doubled per attempt
    pub initial_retry_delay_ms: u64,
    /// Cap on the retry delay in milliseconds
    pub max_retry_delay_ms: u64,
}

impl Default for RedisConnectionConfig {
    fn default() -> Self {
        Self {
            connection_timeout_secs: REDIS_CONNECT_TIMEOUT_SECS,
            response_timeout_secs: REDIS_RESPONSE_TIMEOUT_SECS,
            reconnection_retries: REDIS_RECONNECTION_RETRIES,
            initial_connection_retries: REDIS_INITIAL_CONNECTION_RETRIES,
            initial_retry_delay_ms: REDIS_INITIAL_RETRY_DELAY_MS,
            max_retry_delay_ms: REDIS_MAX_RETRY_DELAY_MS,
        }
    }
}

impl RedisConnectionConfig {
    /// Load Redis connection configuration from environment
    ///
    /// # Errors
    ///
    /// Returns a `ConfigInvalid` error for unparseable values
    pub fn from_env() -> AppResult<Self> {
        Ok(Self {
            connection_timeout_secs: parse_env(
                "REDIS_CONNECTION_TIMEOUT_SECS",
                REDIS_CONNECT_TIMEOUT_SECS,
            )?,
            response_timeout_secs: parse_env(
                "REDIS_RESPONSE_TIMEOUT_SECS",
                REDIS_RESPONSE_TIMEOUT_SECS,
            )?,
            reconnection_retries: parse_env(
                "REDIS_RECONNECTION_RETRIES",
                REDIS_RECONNECTION_RETRIES,
            )?,
            initial_connection_retries: parse_env(
                "REDIS_INITIAL_CONNECTION_RETRIES",
                REDIS_INITIAL_CONNECTION_RETRIES,
            )?,
            initial_retry_delay_ms: parse_env(
                "REDIS_INITIAL_RETRY_DELAY_MS",
                REDIS_INITIAL_RETRY_DELAY_MS,
            )?,
            max_retry_delay_ms: parse_env("REDIS_MAX_RETRY_DELAY_MS", REDIS_MAX_RETRY_DELAY_MS)?,
        })
    }
}
