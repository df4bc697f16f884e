// ABOUTME: User account model handed to the engines by the user directory
// ABOUTME: Carries the profile, email, and phone claims userinfo may project
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable subject identifier, used as the `sub` claim
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Login name
    pub username: String,
    /// Email address
    pub email: String,
    /// Display name
    #[serde(default)]
    pub full_name: Option<String>,
    /// Phone number, released only under the `phone` scope
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Avatar URL
    #[serde(default)]
    pub picture: Option<String>,
    /// bcrypt hash of the password
    #[serde(default, skip_serializing)]
    pub password_hash: String,
    /// Inactive users cannot log in or redeem grants
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Whether the email address has been verified
    #[serde(default)]
    pub is_verified: bool,
}

impl User {
    /// An active, unverified user without a password
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            full_name: None,
            phone_number: None,
            picture: None,
            password_hash: String::new(),
            is_active: true,
            is_verified: false,
        }
    }

    /// Name to show in claims, falling back to the username
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.username)
    }
}

const fn default_true() -> bool {
    true
}
