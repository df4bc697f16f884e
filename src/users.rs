// ABOUTME: User directory collaborator: credential checks and lookups by id
// ABOUTME: In-memory implementation with bcrypt passwords and failed-login lockout
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # User Directory
//!
//! Profile management lives outside this service. The engines only need to
//! authenticate a username or email with a password and fetch a user by id;
//! [`UserDirectory`] is that contract.

use crate::constants::oauth::{ACCOUNT_LOCKOUT_MINUTES, MAX_LOGIN_ATTEMPTS};
use crate::errors::{AppError, AppResult};
use crate::models::User;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::task;
use tracing::{info, warn};
use uuid::Uuid;

/// Why a login was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthenticationError {
    /// Unknown account or wrong password
    #[error("Invalid username or password")]
    InvalidCredentials,
    /// Too many recent failures
    #[error("Account is locked until {until}")]
    AccountLocked {
        /// When the lock lifts
        until: DateTime<Utc>,
    },
    /// Account disabled
    #[error("Account is inactive")]
    AccountInactive,
}

/// Read surface over user accounts
#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    /// Check a password for a username or email
    async fn authenticate(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> Result<User, AuthenticationError>;

    /// Fetch a user by id
    async fn get_user_by_id(&self, user_id: Uuid) -> AppResult<Option<User>>;
}

#[derive(Debug, Clone, Copy, Default)]
struct LoginAttempts {
    failures: u32,
    locked_until: Option<DateTime<Utc>>,
}

/// A user as written in a seed file
#[derive(Debug, Clone, Deserialize)]
pub struct UserSeed {
    /// Account
    #[serde(flatten)]
    pub user: User,
    /// Plaintext password, hashed with bcrypt on load
    #[serde(default)]
    pub password: Option<String>,
    /// Pre-computed bcrypt hash, used when no password is given
    #[serde(default)]
    pub password_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserSeedFile {
    #[serde(default)]
    users: Vec<UserSeed>,
}

/// Concurrent in-memory user directory
#[derive(Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<DashMap<Uuid, User>>,
    logins: Arc<DashMap<String, Uuid>>,
    attempts: Arc<DashMap<Uuid, LoginAttempts>>,
}

impl InMemoryUserDirectory {
    /// Empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user whose `password_hash` is already set
    pub fn upsert(&self, user: User) {
        self.logins.insert(user.username.to_lowercase(), user.id);
        self.logins.insert(user.email.to_lowercase(), user.id);
        self.users.insert(user.id, user);
    }

    /// Hash `password` at `cost` and insert the user
    ///
    /// # Errors
    ///
    /// Returns a `CryptoError` if bcrypt fails
    pub fn insert_with_password(&self, mut user: User, password: &str, cost: u32) -> AppResult<()> {
        user.password_hash = bcrypt::hash(password, cost)
            .map_err(|e| AppError::crypto(format!("bcrypt hashing failed: {e}")))?;
        self.upsert(user);
        Ok(())
    }

    /// Enable or disable an account
    pub fn set_active(&self, user_id: Uuid, active: bool) {
        if let Some(mut user) = self.users.get_mut(&user_id) {
            user.is_active = active;
        }
    }

    /// Number of accounts
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether there are no accounts
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Load a directory from a YAML file with a top-level `users:` list
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed, or a
    /// seed has neither `password` nor `password_hash`
    pub async fn from_yaml_file(path: &Path) -> AppResult<Self> {
        let raw = fs::read_to_string(path).await.map_err(|e| {
            AppError::config(format!("Cannot read users file {}: {e}", path.display()))
        })?;
        let file: UserSeedFile = serde_yaml::from_str(&raw).map_err(|e| {
            AppError::config_invalid(format!("Invalid users file {}: {e}", path.display()))
        })?;

        let directory = Self::new();
        for seed in file.users {
            match (seed.password, seed.password_hash) {
                (Some(password), _) => {
                    directory.insert_with_password(seed.user, &password, bcrypt::DEFAULT_COST)?;
                }
                (None, Some(hash)) => {
                    let mut user = seed.user;
                    user.password_hash = hash;
                    directory.upsert(user);
                }
                (None, None) => {
                    return Err(AppError::config_invalid(format!(
                        "User '{}' needs a password or password_hash",
                        seed.user.username
                    )));
                }
            }
        }
        info!(count = directory.len(), path = %path.display(), "Loaded user accounts");
        Ok(directory)
    }

    fn record_failure(&self, user_id: Uuid) {
        let mut attempts = self.attempts.entry(user_id).or_default();
        attempts.failures += 1;
        if attempts.failures >= MAX_LOGIN_ATTEMPTS {
            let until = Utc::now() + Duration::minutes(ACCOUNT_LOCKOUT_MINUTES);
            attempts.locked_until = Some(until);
            attempts.failures = 0;
            warn!(%user_id, %until, "Account locked after repeated login failures");
        }
    }

    fn locked_until(&self, user_id: Uuid) -> Option<DateTime<Utc>> {
        let until = self.attempts.get(&user_id).and_then(|a| a.locked_until)?;
        if until > Utc::now() {
            Some(until)
        } else {
            self.attempts.remove(&user_id);
            None
        }
    }
}

#[async_trait::async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn authenticate(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> Result<User, AuthenticationError> {
        let user_id = self
            .logins
            .get(&username_or_email.to_lowercase())
            .map(|id| *id.value())
            .ok_or(AuthenticationError::InvalidCredentials)?;
        let user = self
            .users
            .get(&user_id)
            .map(|user| user.value().clone())
            .ok_or(AuthenticationError::InvalidCredentials)?;

        if let Some(until) = self.locked_until(user_id) {
            return Err(AuthenticationError::AccountLocked { until });
        }
        if !user.is_active {
            return Err(AuthenticationError::AccountInactive);
        }

        let password = password.to_owned();
        let hash = user.password_hash.clone();
        let verified = task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .ok()
            .and_then(Result::ok)
            .unwrap_or(false);

        if !verified {
            self.record_failure(user_id);
            return Err(AuthenticationError::InvalidCredentials);
        }

        self.attempts.remove(&user_id);
        Ok(user)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.get(&user_id).map(|user| user.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "Alice@Example.com".into(),
            full_name: Some("Alice Liddell".into()),
            phone_number: None,
            picture: None,
            password_hash: String::new(),
            is_active: true,
            is_verified: true,
        }
    }

    #[tokio::test]
    async fn test_login_by_username_or_email() {
        let directory = InMemoryUserDirectory::new();
        directory.insert_with_password(alice(), "wonderland", 4).unwrap();

        assert!(directory.authenticate("alice", "wonderland").await.is_ok());
        assert!(directory.authenticate("alice@example.com", "wonderland").await.is_ok());
        assert_eq!(
            directory.authenticate("alice", "nope").await.unwrap_err(),
            AuthenticationError::InvalidCredentials
        );
        assert_eq!(
            directory.authenticate("bob", "wonderland").await.unwrap_err(),
            AuthenticationError::InvalidCredentials
        );
    }

    #[tokio::test]
    async fn test_lockout_after_repeated_failures() {
        let directory = InMemoryUserDirectory::new();
        directory.insert_with_password(alice(), "wonderland", 4).unwrap();

        for _ in 0..MAX_LOGIN_ATTEMPTS {
            let _ = directory.authenticate("alice", "wrong").await;
        }

        let result = directory.authenticate("alice", "wonderland").await;
        assert!(matches!(result, Err(AuthenticationError::AccountLocked { .. })));
    }

    #[tokio::test]
    async fn test_inactive_account_refused() {
        let directory = InMemoryUserDirectory::new();
        let user = alice();
        let id = user.id;
        directory.insert_with_password(user, "wonderland", 4).unwrap();
        directory.set_active(id, false);

        assert_eq!(
            directory.authenticate("alice", "wonderland").await.unwrap_err(),
            AuthenticationError::AccountInactive
        );
    }
}
