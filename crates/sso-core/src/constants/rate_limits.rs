// ABOUTME: Fixed-window rate limits for the public authentication endpoints
// ABOUTME: Counters live in the secret store under the rate_limit namespace
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// `GET /authorize`: 20 requests per 5 minutes
pub const AUTHORIZE_MAX_REQUESTS: u64 = 20;
/// Window for [`AUTHORIZE_MAX_REQUESTS`]
pub const AUTHORIZE_WINDOW_SECS: u64 = 300;

/// `POST /token`: 30 requests per 5 minutes
pub const TOKEN_MAX_REQUESTS: u64 = 30;
/// Window for [`TOKEN_MAX_REQUESTS`]
pub const TOKEN_WINDOW_SECS: u64 = 300;

/// `POST /auth/login`: 20 requests per 15 minutes
pub const LOGIN_MAX_REQUESTS: u64 = 20;
/// Window for [`LOGIN_MAX_REQUESTS`]
pub const LOGIN_WINDOW_SECS: u64 = 900;

/// `POST /auth/refresh`: 30 requests per 5 minutes
pub const REFRESH_MAX_REQUESTS: u64 = 30;
/// Window for [`REFRESH_MAX_REQUESTS`]
pub const REFRESH_WINDOW_SECS: u64 = 300;
