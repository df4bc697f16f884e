// ABOUTME: In-memory secret store backend with TTL support and bounded capacity
// ABOUTME: Rate counters sit in an LRU; security entries are never evicted, only expired
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::StoreBackend;
use crate::config::store::StoreConfig;
use crate::constants::store::RATE_LIMIT_PREFIX;
use crate::errors::{AppError, AppResult};
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time;

#[derive(Debug, Clone)]
struct StoreEntry {
    data: Vec<u8>,
    expires_at: Instant,
}

impl StoreEntry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Both tiers live behind one lock so every operation stays atomic per key
struct Tiers {
    /// `rate_limit:*` counters; losing one only resets a window
    counters: LruCache<String, StoreEntry>,
    /// Sessions, codes, refresh records and blacklist markers
    secrets: HashMap<String, StoreEntry>,
    capacity: usize,
}

impl Tiers {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            counters: LruCache::new(capacity),
            secrets: HashMap::new(),
            capacity: capacity.get(),
        }
    }

    fn is_counter(key: &str) -> bool {
        key.starts_with(RATE_LIMIT_PREFIX)
    }

    fn peek(&self, key: &str) -> Option<&StoreEntry> {
        if Self::is_counter(key) {
            self.counters.peek(key)
        } else {
            self.secrets.get(key)
        }
    }

    fn pop(&mut self, key: &str) -> Option<StoreEntry> {
        if Self::is_counter(key) {
            self.counters.pop(key)
        } else {
            self.secrets.remove(key)
        }
    }

    fn insert(&mut self, key: &str, entry: StoreEntry) -> AppResult<()> {
        if Self::is_counter(key) {
            self.counters.push(key.to_owned(), entry);
            return Ok(());
        }

        if !self.secrets.contains_key(key) && self.secrets.len() >= self.capacity {
            self.secrets.retain(|_, existing| !existing.is_expired());
            if self.secrets.len() >= self.capacity {
                return Err(AppError::storage_unavailable(format!(
                    "Secret store is full ({} live entries)",
                    self.capacity
                )));
            }
        }
        self.secrets.insert(key.to_owned(), entry);
        Ok(())
    }

    fn keys(&self) -> impl Iterator<Item = &String> {
        self.counters
            .iter()
            .map(|(key, _)| key)
            .chain(self.secrets.keys())
    }

    fn live_len(&self) -> usize {
        self.counters
            .iter()
            .map(|(_, entry)| entry)
            .chain(self.secrets.values())
            .filter(|entry| !entry.is_expired())
            .count()
    }

    fn clear(&mut self) {
        self.counters.clear();
        self.secrets.clear();
    }
}

type Entries = Arc<RwLock<Tiers>>;

/// In-memory store with bounded capacity and background cleanup
///
/// Every operation holds the write lock for its whole read-modify-write, so
/// `take` and `increment` cannot interleave with another caller on the same
/// key. Values do not survive a restart.
///
/// Rate-limit counters are kept in an LRU of `max_entries`. Every other
/// namespace is only removed by expiry or an explicit delete; when that tier
/// is full of live entries `put` fails instead of dropping revocation state.
#[derive(Clone)]
pub struct InMemoryStore {
    entries: Entries,
    shutdown_tx: Arc<Mutex<Option<mpsc::Sender<()>>>>,
}

impl InMemoryStore {
    const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1000) {
        Some(n) => n,
        None => unreachable!(),
    };

    /// Create the store, spawning the cleanup task when enabled
    ///
    /// Must be called inside a Tokio runtime when background cleanup is on.
    #[must_use]
    pub fn new(config: &StoreConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(Self::DEFAULT_CAPACITY);
        let entries: Entries = Arc::new(RwLock::new(Tiers::new(capacity)));

        let shutdown_tx = if config.enable_background_cleanup {
            let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
            let sweep_entries = entries.clone();
            let cleanup_interval = config.cleanup_interval;

            tokio::spawn(async move {
                let mut interval = time::interval(cleanup_interval);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            Self::cleanup_expired(&sweep_entries).await;
                        }
                        _ = shutdown_rx.recv() => {
                            tracing::debug!("Secret store cleanup task received shutdown signal");
                            break;
                        }
                    }
                }
            });

            Some(shutdown_tx)
        } else {
            None
        };

        Self {
            entries,
            shutdown_tx: Arc::new(Mutex::new(shutdown_tx)),
        }
    }

    async fn cleanup_expired(entries: &Entries) {
        let mut guard = entries.write().await;

        let expired_counters: Vec<String> = guard
            .counters
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired_counters {
            guard.counters.pop(key);
        }

        let before = guard.secrets.len();
        guard.secrets.retain(|_, entry| !entry.is_expired());
        let removed = expired_counters.len() + (before - guard.secrets.len());
        drop(guard);

        if removed > 0 {
            tracing::debug!(removed, "Swept expired secret store entries");
        }
    }

    /// Number of live entries, for tests and diagnostics
    pub async fn len(&self) -> usize {
        self.entries.read().await.live_len()
    }

    /// Whether the store holds no live entries
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait::async_trait]
impl StoreBackend for InMemoryStore {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> AppResult<()> {
        self.entries
            .write()
            .await
            .insert(key, StoreEntry::new(value, ttl))
    }

    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let mut guard = self.entries.write().await;
        let value = match guard.peek(key) {
            Some(entry) if entry.is_expired() => {
                guard.pop(key);
                None
            }
            Some(entry) => Some(entry.data.clone()),
            None => None,
        };
        if value.is_some() && Tiers::is_counter(key) {
            guard.counters.promote(key);
        }
        drop(guard);
        Ok(value)
    }

    async fn take(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let popped = self.entries.write().await.pop(key);
        Ok(popped.filter(|entry| !entry.is_expired()).map(|entry| entry.data))
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        let popped = self.entries.write().await.pop(key);
        Ok(popped.is_some_and(|entry| !entry.is_expired()))
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut guard = self.entries.write().await;
        let live = match guard.peek(key) {
            Some(entry) if entry.is_expired() => {
                guard.pop(key);
                false
            }
            Some(_) => true,
            None => false,
        };
        drop(guard);
        Ok(live)
    }

    async fn increment(&self, key: &str, window: Duration) -> AppResult<u64> {
        let mut guard = self.entries.write().await;

        let (current, expires_at) = match guard.peek(key) {
            Some(entry) if !entry.is_expired() => {
                let text = String::from_utf8(entry.data.clone())
                    .map_err(|e| AppError::storage(format!("Counter is not UTF-8: {e}")))?;
                let count: u64 = text
                    .parse()
                    .map_err(|e| AppError::storage(format!("Counter is not an integer: {e}")))?;
                (count, entry.expires_at)
            }
            _ => (0, Instant::now() + window),
        };

        let next = current.saturating_add(1);
        guard.insert(
            key,
            StoreEntry {
                data: next.to_string().into_bytes(),
                expires_at,
            },
        )?;
        drop(guard);
        Ok(next)
    }

    async fn delete_matching(&self, pattern: &str) -> AppResult<u64> {
        let glob_pattern = glob::Pattern::new(pattern)
            .map_err(|e| AppError::invalid_input(format!("Invalid key pattern '{pattern}': {e}")))?;

        let mut guard = self.entries.write().await;
        let matching: Vec<String> = guard
            .keys()
            .filter(|key| glob_pattern.matches(key))
            .cloned()
            .collect();

        for key in &matching {
            guard.pop(key);
        }
        drop(guard);

        Ok(matching.len() as u64)
    }

    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }

    async fn close(&self) -> AppResult<()> {
        if let Some(tx) = self.shutdown_tx.lock().await.take() {
            if let Err(e) = tx.send(()).await {
                tracing::debug!(error = ?e, "Cleanup task already stopped");
            }
        }
        self.entries.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> InMemoryStore {
        InMemoryStore::new(&StoreConfig {
            enable_background_cleanup: false,
            ..StoreConfig::default()
        })
    }

    fn small_store(max_entries: usize) -> InMemoryStore {
        InMemoryStore::new(&StoreConfig {
            max_entries,
            enable_background_cleanup: false,
            ..StoreConfig::default()
        })
    }

    #[tokio::test]
    async fn test_increment_keeps_first_expiry() {
        let store = test_store();
        assert_eq!(store.increment("rate_limit:a:token", Duration::from_secs(60)).await.unwrap(), 1);
        let first_expiry = store.entries.read().await.peek("rate_limit:a:token").unwrap().expires_at;

        assert_eq!(store.increment("rate_limit:a:token", Duration::from_secs(600)).await.unwrap(), 2);
        let second_expiry = store.entries.read().await.peek("rate_limit:a:token").unwrap().expires_at;

        assert_eq!(first_expiry, second_expiry);
    }

    #[tokio::test]
    async fn test_lru_evicts_oldest_counter_when_full() {
        let store = small_store(2);
        let window = Duration::from_secs(60);
        store.increment("rate_limit:a:token", window).await.unwrap();
        store.increment("rate_limit:b:token", window).await.unwrap();
        store.increment("rate_limit:c:token", window).await.unwrap();

        assert!(!store.exists("rate_limit:a:token").await.unwrap());
        assert!(store.exists("rate_limit:c:token").await.unwrap());
    }

    #[tokio::test]
    async fn test_counter_flood_keeps_blacklist_entries() {
        let store = small_store(4);
        let ttl = Duration::from_secs(60);
        store.put("blacklist:jti-1", b"{}".to_vec(), ttl).await.unwrap();
        store.put("auth_code:abc", b"{}".to_vec(), ttl).await.unwrap();

        for i in 0..50 {
            store
                .increment(&format!("rate_limit:10.0.0.{i}:token"), ttl)
                .await
                .unwrap();
        }

        assert!(store.exists("blacklist:jti-1").await.unwrap());
        assert!(store.exists("auth_code:abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_full_secret_tier_refuses_new_entries() {
        let store = small_store(2);
        let ttl = Duration::from_secs(60);
        store.put("blacklist:one", b"1".to_vec(), ttl).await.unwrap();
        store.put("blacklist:two", b"2".to_vec(), ttl).await.unwrap();

        let err = store.put("blacklist:three", b"3".to_vec(), ttl).await.unwrap_err();
        assert!(err.message.contains("full"), "unexpected error: {err}");
        assert!(store.exists("blacklist:one").await.unwrap());
        assert!(store.exists("blacklist:two").await.unwrap());

        // Overwriting an existing key is not a new entry
        store.put("blacklist:one", b"1b".to_vec(), ttl).await.unwrap();
    }

    #[tokio::test]
    async fn test_full_secret_tier_reclaims_expired_entries() {
        let store = small_store(1);
        store.put("session:old", b"x".to_vec(), Duration::from_millis(1)).await.unwrap();
        time::sleep(Duration::from_millis(10)).await;

        store.put("session:new", b"y".to_vec(), Duration::from_secs(60)).await.unwrap();
        assert!(store.exists("session:new").await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_removes_expired() {
        let store = test_store();
        store.put("gone", b"x".to_vec(), Duration::from_millis(1)).await.unwrap();
        store.put("kept", b"y".to_vec(), Duration::from_secs(60)).await.unwrap();
        store.increment("rate_limit:x:token", Duration::from_millis(1)).await.unwrap();
        time::sleep(Duration::from_millis(10)).await;

        InMemoryStore::cleanup_expired(&store.entries).await;

        let guard = store.entries.read().await;
        assert_eq!(guard.secrets.len(), 1);
        assert!(guard.counters.is_empty());
    }
}
