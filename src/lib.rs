// ABOUTME: Main library entry point for the SSO identity provider
// ABOUTME: OAuth 2.0 / OpenID Connect authorization engine over an ephemeral secret store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # SSO Server
//!
//! An OAuth 2.0 / OpenID Connect identity provider. It authenticates end
//! users, runs the authorization code flow with PKCE and consent, issues and
//! verifies RS256 tokens, and keeps every short-lived secret (sessions,
//! authorization codes, refresh token records, revoked tokens, rate limit
//! counters) in an ephemeral store with per-key expiry.
//!
//! ## Architecture
//!
//! - **store**: the secret store facade with in-memory and Redis backends
//! - **jwks** / **tokens**: signing keys and the token codec
//! - **clients** / **users**: directory contracts the engines consume
//! - **`oauth2_server`**: authorization and token exchange engines
//! - **sessions**: first-party login, refresh and logout
//! - **routes**: the axum HTTP surface
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sso_server::config::ServerConfig;
//! use sso_server::context::ServerResources;
//! use sso_server::errors::AppResult;
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     let resources = ServerResources::from_config(config).await?;
//!     let _app = sso_server::routes::router(std::sync::Arc::new(resources));
//!     Ok(())
//! }
//! ```

/// Client application validation and the in-memory client directory
pub mod clients;
/// Configuration loaded from the environment
pub mod config;
/// Shared resources handed to route handlers
pub mod context;
/// Random secrets and client secret hashing
pub mod crypto;
/// RSA signing keys and the JSON Web Key Set
pub mod jwks;
/// Structured logging and audit events
pub mod logging;
/// OAuth 2.0 / OpenID Connect engines
pub mod oauth2_server;
/// HTTP routes
pub mod routes;
/// First-party sessions
pub mod sessions;
/// Ephemeral secret store
pub mod store;
/// Token issuing and verification
pub mod tokens;
/// User directory contract and the in-memory implementation
pub mod users;

/// Error types shared with `sso-core`
pub use sso_core::errors;

/// Constants shared with `sso-core`
pub use sso_core::constants;

/// Data models shared with `sso-core`
pub use sso_core::models;
