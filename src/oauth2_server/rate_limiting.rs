// ABOUTME: Fixed-window rate limiting for OAuth and login endpoints over the secret store
// ABOUTME: Counters keyed by caller identity and endpoint, expiring with their window
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Each `(identifier, endpoint)` pair gets a counter under
//! `rate_limit:{identifier}:{endpoint}`. The first request of a window
//! creates it with the window as TTL; later requests only increment it. When
//! it expires, the next request starts a new window.
//!
//! This is a fixed window: a caller can send `limit` requests at the end of
//! one window and `limit` more at the start of the next.

use crate::constants::rate_limits;
use crate::errors::AppResult;
use crate::logging::AuditLogger;
use crate::store::{SecretStore, StoreKey};
use std::fmt;
use std::time::Duration;

/// Endpoints with their own counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitedEndpoint {
    /// `GET /authorize` and `POST /consent`
    Authorize,
    /// `POST /token`
    Token,
    /// `POST /auth/login`
    Login,
    /// `POST /auth/refresh`
    Refresh,
}

impl RateLimitedEndpoint {
    /// Counter key segment
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authorize => "authorize",
            Self::Token => "token",
            Self::Login => "login",
            Self::Refresh => "refresh",
        }
    }

    /// Requests allowed per window
    #[must_use]
    pub const fn max_requests(self) -> u64 {
        match self {
            Self::Authorize => rate_limits::AUTHORIZE_MAX_REQUESTS,
            Self::Token => rate_limits::TOKEN_MAX_REQUESTS,
            Self::Login => rate_limits::LOGIN_MAX_REQUESTS,
            Self::Refresh => rate_limits::REFRESH_MAX_REQUESTS,
        }
    }

    /// Window length
    #[must_use]
    pub const fn window(self) -> Duration {
        Duration::from_secs(match self {
            Self::Authorize => rate_limits::AUTHORIZE_WINDOW_SECS,
            Self::Token => rate_limits::TOKEN_WINDOW_SECS,
            Self::Login => rate_limits::LOGIN_WINDOW_SECS,
            Self::Refresh => rate_limits::REFRESH_WINDOW_SECS,
        })
    }
}

impl fmt::Display for RateLimitedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Whether this request is over the limit
    pub is_limited: bool,
    /// Limit for the window
    pub limit: u64,
    /// Requests left in the window after this one
    pub remaining: u64,
    /// Seconds to wait before retrying, when limited
    pub retry_after_seconds: Option<u64>,
}

impl RateLimitStatus {
    const fn unlimited() -> Self {
        Self {
            is_limited: false,
            limit: u64::MAX,
            remaining: u64::MAX,
            retry_after_seconds: None,
        }
    }
}

/// Store-backed fixed-window rate limiter
#[derive(Clone)]
pub struct OAuth2RateLimiter {
    store: SecretStore,
    enabled: bool,
}

impl OAuth2RateLimiter {
    /// Create a limiter; a disabled limiter never limits and never touches the store
    #[must_use]
    pub const fn new(store: SecretStore, enabled: bool) -> Self {
        Self { store, enabled }
    }

    /// Count a request and report whether it is allowed
    ///
    /// # Errors
    ///
    /// Returns an error when the counter cannot be updated. Callers refuse
    /// the request in that case.
    pub async fn check_rate_limit(
        &self,
        endpoint: RateLimitedEndpoint,
        identifier: &str,
    ) -> AppResult<RateLimitStatus> {
        if !self.enabled {
            return Ok(RateLimitStatus::unlimited());
        }

        let key = StoreKey::RateLimit {
            identifier: identifier.to_owned(),
            endpoint: endpoint.as_str().to_owned(),
        };
        let window = endpoint.window();
        let count = self.store.increment(&key, window).await?;
        let limit = endpoint.max_requests();
        let is_limited = count > limit;

        if is_limited {
            AuditLogger::log_rate_limited(endpoint.as_str(), identifier, count);
        }

        Ok(RateLimitStatus {
            is_limited,
            limit,
            remaining: limit.saturating_sub(count),
            retry_after_seconds: is_limited.then(|| window.as_secs()),
        })
    }
}
