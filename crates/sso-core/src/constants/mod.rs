// ABOUTME: Application constants organized by domain
// ABOUTME: Store namespaces, OAuth 2.0 vocabulary, default lifetimes, and rate limits
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Secret store key namespaces and sizing defaults
pub mod store;

/// OAuth 2.0 / OIDC protocol vocabulary and lifetimes
pub mod oauth;

/// Per-endpoint fixed-window rate limits
pub mod rate_limits;

/// Service identity used in logs and health output
pub mod service {
    /// Service name reported by `/health` and the startup log line
    pub const SERVICE_NAME: &str = "sso-server";

    /// Default `iss` claim and discovery issuer when none is configured
    pub const DEFAULT_ISSUER: &str = "http://localhost:8080";

    /// Default public base URL used to derive discovery endpoint URLs
    pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

    /// Default `kid` header value for the signing key
    pub const DEFAULT_KEY_ID: &str = "sso-signing-key";
}
