// ABOUTME: Configuration management for the SSO server
// ABOUTME: Environment-driven server settings and secret store settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration is read once at startup from environment variables. Unset
//! variables take documented defaults; set-but-invalid values stop the
//! process with a `ConfigInvalid` error instead of silently falling back.

/// Server configuration from environment variables
pub mod environment;
/// Secret store backend configuration
pub mod store;

pub use environment::{
    DirectorySeedConfig, HttpConfig, OAuthPolicyConfig, ServerConfig, SigningKeyConfig,
    TokenLifetimeConfig,
};
pub use store::{StoreBackendKind, StoreConfig};
