// ABOUTME: Integration tests for the ephemeral secret store facade and its backends
// ABOUTME: Covers TTL expiry, one-time take under concurrency, counters, bulk delete, fail-closed reads
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use anyhow::Result;
use chrono::Utc;
use sso_server::config::{StoreBackendKind, StoreConfig};
use sso_server::errors::{AppResult, ErrorCode};
use sso_server::models::{RefreshTokenRecord, SessionRecord};
use sso_server::store::{SecretStore, StoreBackend, StoreKey};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use uuid::Uuid;

async fn memory_store() -> Result<SecretStore> {
    common::init_test_logging();
    Ok(SecretStore::open(StoreConfig {
        enable_background_cleanup: false,
        ..StoreConfig::default()
    })
    .await?)
}

fn session(user_id: Uuid) -> SessionRecord {
    SessionRecord {
        user_id,
        created_at: Utc::now(),
    }
}

fn refresh_record(user_id: Uuid, jti: &str) -> RefreshTokenRecord {
    RefreshTokenRecord {
        jti: jti.to_owned(),
        user_id,
        client_id: Some("web-app".to_owned()),
        scope: "openid".to_owned(),
        issued_at: Utc::now(),
    }
}

/// Backend that never answers
struct HangingBackend;

#[async_trait::async_trait]
impl StoreBackend for HangingBackend {
    async fn put(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> AppResult<()> {
        time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
    async fn get(&self, _key: &str) -> AppResult<Option<Vec<u8>>> {
        time::sleep(Duration::from_secs(30)).await;
        Ok(Some(b"{}".to_vec()))
    }
    async fn take(&self, _key: &str) -> AppResult<Option<Vec<u8>>> {
        time::sleep(Duration::from_secs(30)).await;
        Ok(None)
    }
    async fn delete(&self, _key: &str) -> AppResult<bool> {
        Ok(false)
    }
    async fn exists(&self, _key: &str) -> AppResult<bool> {
        time::sleep(Duration::from_secs(30)).await;
        Ok(false)
    }
    async fn increment(&self, _key: &str, _window: Duration) -> AppResult<u64> {
        Ok(1)
    }
    async fn delete_matching(&self, _pattern: &str) -> AppResult<u64> {
        Ok(0)
    }
    async fn health_check(&self) -> AppResult<()> {
        time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
    async fn close(&self) -> AppResult<()> {
        Ok(())
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

#[tokio::test]
async fn test_put_get_roundtrip() -> Result<()> {
    let store = memory_store().await?;
    let user_id = Uuid::new_v4();
    let key = StoreKey::Session("s-1".to_owned());

    store.put(&key, &session(user_id), Duration::from_secs(60)).await?;

    let loaded: Option<SessionRecord> = store.get(&key).await;
    assert_eq!(loaded.map(|s| s.user_id), Some(user_id));
    // get leaves the value in place
    assert!(store.exists(&key).await?);
    Ok(())
}

#[tokio::test]
async fn test_entries_expire() -> Result<()> {
    let store = memory_store().await?;
    let key = StoreKey::Session("short-lived".to_owned());

    store
        .put(&key, &session(Uuid::new_v4()), Duration::from_millis(50))
        .await?;
    time::sleep(Duration::from_millis(120)).await;

    let loaded: Option<SessionRecord> = store.get(&key).await;
    assert!(loaded.is_none());
    assert!(!store.exists(&key).await?);
    Ok(())
}

#[tokio::test]
async fn test_take_removes_value() -> Result<()> {
    let store = memory_store().await?;
    let key = StoreKey::AuthCode("code-1".to_owned());
    store.put(&key, &"payload", Duration::from_secs(60)).await?;

    let first: Option<String> = store.take(&key).await;
    let second: Option<String> = store.take(&key).await;

    assert_eq!(first.as_deref(), Some("payload"));
    assert!(second.is_none());
    Ok(())
}

#[tokio::test]
async fn test_concurrent_take_has_single_winner() -> Result<()> {
    let store = memory_store().await?;
    let key = StoreKey::AuthCode("contested".to_owned());
    store.put(&key, &"payload", Duration::from_secs(60)).await?;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = store.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            store.take::<String>(&key).await.is_some()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await? {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    Ok(())
}

#[tokio::test]
async fn test_increment_fixed_window() -> Result<()> {
    let store = memory_store().await?;
    let key = StoreKey::RateLimit {
        identifier: "10.0.0.1".to_owned(),
        endpoint: "token".to_owned(),
    };
    let window = Duration::from_millis(100);

    assert_eq!(store.increment(&key, window).await?, 1);
    assert_eq!(store.increment(&key, window).await?, 2);
    assert_eq!(store.increment(&key, window).await?, 3);

    time::sleep(Duration::from_millis(150)).await;
    assert_eq!(store.increment(&key, window).await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_delete_matching_is_scoped_to_user() -> Result<()> {
    let store = memory_store().await?;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    for (user_id, jti) in [(alice, "a1"), (alice, "a2"), (bob, "b1")] {
        let key = StoreKey::RefreshToken {
            user_id,
            jti: jti.to_owned(),
        };
        store
            .put(&key, &refresh_record(user_id, jti), Duration::from_secs(60))
            .await?;
    }

    let removed = store
        .delete_matching(&StoreKey::refresh_tokens_of(alice))
        .await?;
    assert_eq!(removed, 2);

    let bobs = StoreKey::RefreshToken {
        user_id: bob,
        jti: "b1".to_owned(),
    };
    assert!(store.exists(&bobs).await?);
    Ok(())
}

#[tokio::test]
async fn test_delete_reports_presence() -> Result<()> {
    let store = memory_store().await?;
    let key = StoreKey::Blacklist("jti-1".to_owned());
    store.put(&key, &true, Duration::from_secs(60)).await?;

    assert!(store.delete(&key).await?);
    assert!(!store.delete(&key).await?);
    Ok(())
}

#[tokio::test]
async fn test_closed_store_fails_closed() -> Result<()> {
    let store = memory_store().await?;
    let key = StoreKey::Session("s".to_owned());
    store.put(&key, &session(Uuid::new_v4()), Duration::from_secs(60)).await?;

    store.close().await?;
    assert!(store.is_closed());
    // A second close is a no-op
    store.close().await?;

    let loaded: Option<SessionRecord> = store.get(&key).await;
    assert!(loaded.is_none());
    let err = store
        .put(&key, &session(Uuid::new_v4()), Duration::from_secs(60))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ResourceUnavailable);
    assert!(store.health_check().await.is_err());
    Ok(())
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn test_unreachable_backend_reads_absent_and_writes_fail() -> Result<()> {
    let store = SecretStore::with_backend(Arc::new(common::UnreachableBackend), Duration::from_secs(1));
    let key = StoreKey::AuthCode("code".to_owned());

    let taken: Option<String> = store.take(&key).await;
    assert!(taken.is_none());
    let got: Option<String> = store.get(&key).await;
    assert!(got.is_none());

    assert!(store.put(&key, &"v", Duration::from_secs(1)).await.is_err());
    assert!(store.exists(&key).await.is_err());
    assert!(store.increment(&key, Duration::from_secs(1)).await.is_err());
    assert!(store.delete_matching("refresh_token:*").await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_slow_backend_is_bounded_by_timeout() -> Result<()> {
    let store = SecretStore::with_backend(Arc::new(HangingBackend), Duration::from_millis(50));
    let key = StoreKey::Session("s".to_owned());

    let started = time::Instant::now();
    let got: Option<SessionRecord> = store.get(&key).await;
    assert!(got.is_none());

    let err = store.exists(&key).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ResourceUnavailable);
    assert!(started.elapsed() < Duration::from_secs(5));
    Ok(())
}

#[tokio::test]
async fn test_undecodable_value_reads_absent() -> Result<()> {
    let store = memory_store().await?;
    let key = StoreKey::Session("garbled".to_owned());
    store.put(&key, &"not a session", Duration::from_secs(60)).await?;

    let loaded: Option<SessionRecord> = store.get(&key).await;
    assert!(loaded.is_none());
    Ok(())
}

// ============================================================================
// Redis backend (runs only when REDIS_URL is set)
// ============================================================================

async fn redis_store() -> Result<Option<SecretStore>> {
    let Ok(url) = env::var("REDIS_URL") else {
        eprintln!("REDIS_URL not set, skipping Redis backend test");
        return Ok(None);
    };
    common::init_test_logging();
    let store = SecretStore::open(StoreConfig {
        backend: StoreBackendKind::Redis,
        redis_url: Some(url),
        ..StoreConfig::default()
    })
    .await?;
    Ok(Some(store))
}

#[tokio::test]
async fn test_redis_take_and_expiry() -> Result<()> {
    let Some(store) = redis_store().await? else {
        return Ok(());
    };
    let key = StoreKey::AuthCode(format!("test-{}", Uuid::new_v4()));
    store.put(&key, &"payload", Duration::from_secs(60)).await?;

    let first: Option<String> = store.take(&key).await;
    let second: Option<String> = store.take(&key).await;
    assert_eq!(first.as_deref(), Some("payload"));
    assert!(second.is_none());

    let short = StoreKey::Session(format!("test-{}", Uuid::new_v4()));
    store.put(&short, &"v", Duration::from_secs(1)).await?;
    time::sleep(Duration::from_millis(1_500)).await;
    assert!(!store.exists(&short).await?);
    Ok(())
}

#[tokio::test]
async fn test_redis_counters_and_bulk_delete() -> Result<()> {
    let Some(store) = redis_store().await? else {
        return Ok(());
    };
    let key = StoreKey::RateLimit {
        identifier: Uuid::new_v4().to_string(),
        endpoint: "login".to_owned(),
    };
    assert_eq!(store.increment(&key, Duration::from_secs(60)).await?, 1);
    assert_eq!(store.increment(&key, Duration::from_secs(60)).await?, 2);

    let user_id = Uuid::new_v4();
    for jti in ["r1", "r2"] {
        let key = StoreKey::RefreshToken {
            user_id,
            jti: jti.to_owned(),
        };
        store
            .put(&key, &refresh_record(user_id, jti), Duration::from_secs(60))
            .await?;
    }
    assert_eq!(
        store
            .delete_matching(&StoreKey::refresh_tokens_of(user_id))
            .await?,
        2
    );
    store.close().await?;
    Ok(())
}
