// ABOUTME: Secret store key namespaces and capacity defaults
// ABOUTME: Shared by the in-memory and Redis backends so both lay keys out identically
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Authenticated user-agent sessions
pub const SESSION_PREFIX: &str = "session:";

/// One-time authorization codes
pub const AUTH_CODE_PREFIX: &str = "auth_code:";

/// Refresh token records, laid out as `refresh_token:{user_id}:{jti}`
pub const REFRESH_TOKEN_PREFIX: &str = "refresh_token:";

/// Revoked access token identifiers
pub const BLACKLIST_PREFIX: &str = "blacklist:";

/// Fixed-window request counters
pub const RATE_LIMIT_PREFIX: &str = "rate_limit:";

/// Default maximum entries for the in-memory store
pub const DEFAULT_STORE_MAX_ENTRIES: usize = 10_000;

/// Default cleanup interval in seconds for expired entries
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300; // 5 minutes

/// Upper bound on any single store operation before it fails closed
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 3_000;

/// Redis connection timeout in seconds
pub const REDIS_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Redis response timeout in seconds
pub const REDIS_RESPONSE_TIMEOUT_SECS: u64 = 5;

/// Reconnection attempts the connection manager makes after a drop
pub const REDIS_RECONNECTION_RETRIES: usize = 3;

/// Connection attempts at startup before giving up
pub const REDIS_INITIAL_CONNECTION_RETRIES: u32 = 3;

/// First backoff delay at startup, doubled on every retry
pub const REDIS_INITIAL_RETRY_DELAY_MS: u64 = 500;

/// Backoff cap in milliseconds
pub const REDIS_MAX_RETRY_DELAY_MS: u64 = 5_000;

/// Keys fetched per SCAN round trip during pattern deletes
pub const REDIS_SCAN_BATCH: usize = 100;
