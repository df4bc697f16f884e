// ABOUTME: Redis secret store backend with connection management and atomic commands
// ABOUTME: GETDEL for one-time takes, SET NX + INCR pipeline for fixed-window counters
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::StoreBackend;
use crate::config::store::{RedisConnectionConfig, StoreConfig};
use crate::constants::store::REDIS_SCAN_BATCH;
use crate::errors::{AppError, AppResult};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use std::time::Duration;
use tokio::time;
use tracing::{error, info, warn};

/// Redis store shared by every server instance pointing at the same database
///
/// Keys are written exactly as rendered by `StoreKey`, so the namespaces
/// (`session:*`, `auth_code:*`, ...) are visible to operators as-is.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    /// Connect using the URL and retry policy from `config`
    ///
    /// # Errors
    ///
    /// Returns an error if no URL is configured or every connection attempt fails
    pub async fn connect(config: &StoreConfig) -> AppResult<Self> {
        let redis_url = config
            .redis_url
            .as_ref()
            .ok_or_else(|| AppError::config("REDIS_URL is required for the redis store backend"))?;

        let conn_config = &config.redis_connection;
        info!(
            timeout_secs = conn_config.connection_timeout_secs,
            retries = conn_config.initial_connection_retries,
            "Connecting secret store to Redis"
        );

        let client = redis::Client::open(redis_url.as_str())
            .map_err(|e| AppError::config_invalid(format!("Invalid Redis URL: {e}")))?;

        let manager = Self::connect_with_retry(&client, conn_config).await?;
        info!("Secret store connected to Redis");

        Ok(Self { manager })
    }

    /// Connect with exponential backoff between attempts
    async fn connect_with_retry(
        client: &redis::Client,
        conn_config: &RedisConnectionConfig,
    ) -> AppResult<ConnectionManager> {
        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(Duration::from_secs(conn_config.connection_timeout_secs))
            .set_response_timeout(Duration::from_secs(conn_config.response_timeout_secs))
            .set_number_of_retries(conn_config.reconnection_retries)
            .set_max_delay(conn_config.max_retry_delay_ms);

        let max_retries = conn_config.initial_connection_retries;
        let mut delay_ms = conn_config.initial_retry_delay_ms;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            match ConnectionManager::new_with_config(client.clone(), manager_config.clone()).await {
                Ok(manager) => {
                    if attempt > 0 {
                        info!(attempt, "Redis connection established after retries");
                    }
                    return Ok(manager);
                }
                Err(e) => {
                    if attempt < max_retries {
                        warn!(
                            attempt = attempt + 1,
                            total = max_retries + 1,
                            delay_ms,
                            error = %e,
                            "Redis connection attempt failed, retrying"
                        );
                        time::sleep(Duration::from_millis(delay_ms)).await;
                        delay_ms = (delay_ms * 2).min(conn_config.max_retry_delay_ms);
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(AppError::storage_unavailable(format!(
            "Failed to connect to Redis after {} attempts: {}",
            max_retries + 1,
            last_error.map_or_else(|| "unknown error".to_owned(), |e| e.to_string())
        )))
    }

    fn command_error(command: &'static str, e: &redis::RedisError) -> AppError {
        error!(command, error = %e, "Redis command failed");
        AppError::storage(format!("Redis {command} failed"))
    }

    fn ttl_secs(ttl: Duration) -> u64 {
        ttl.as_secs().max(1)
    }
}

#[async_trait::async_trait]
impl StoreBackend for RedisStore {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> AppResult<()> {
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(key, value, Self::ttl_secs(ttl))
            .await
            .map_err(|e| Self::command_error("SETEX", &e))
    }

    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        conn.get(key)
            .await
            .map_err(|e| Self::command_error("GET", &e))
    }

    async fn take(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        redis::cmd("GETDEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::command_error("GETDEL", &e))
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.manager.clone();
        let removed: u64 = conn
            .del(key)
            .await
            .map_err(|e| Self::command_error("DEL", &e))?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.manager.clone();
        conn.exists(key)
            .await
            .map_err(|e| Self::command_error("EXISTS", &e))
    }

    async fn increment(&self, key: &str, window: Duration) -> AppResult<u64> {
        let mut conn = self.manager.clone();
        // SET NX only creates the counter (and its expiry) when absent.
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(key)
            .arg(0)
            .arg("EX")
            .arg(Self::ttl_secs(window))
            .arg("NX")
            .ignore()
            .cmd("INCR")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::command_error("INCR", &e))?;
        Ok(count)
    }

    async fn delete_matching(&self, pattern: &str) -> AppResult<u64> {
        let mut conn = self.manager.clone();
        let mut removed = 0u64;
        let mut cursor = 0u64;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(REDIS_SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| Self::command_error("SCAN", &e))?;

            if !keys.is_empty() {
                let deleted: u64 = conn
                    .del(&keys)
                    .await
                    .map_err(|e| Self::command_error("DEL", &e))?;
                removed += deleted;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(removed)
    }

    async fn health_check(&self) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let response: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::command_error("PING", &e))?;

        if response == "PONG" {
            Ok(())
        } else {
            Err(AppError::storage_unavailable(format!(
                "Unexpected PING response '{response}'"
            )))
        }
    }

    async fn close(&self) -> AppResult<()> {
        // ConnectionManager closes its connection when the last clone drops.
        info!("Redis secret store closed");
        Ok(())
    }
}
