// ABOUTME: Core types and constants for the SSO authorization server
// ABOUTME: Foundation crate with error handling, store namespaces, and persistence records
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # SSO Core
//!
//! Foundation crate shared by the SSO server and its tooling. It holds the
//! types that change rarely so the main crate recompiles without them.
//!
//! ## Modules
//!
//! - **errors**: `AppError`, `ErrorCode` and the HTTP mapping
//! - **constants**: store key namespaces, OAuth 2.0 vocabulary, default lifetimes
//! - **models**: client applications, users, and the records kept in the secret store

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Application constants organized by domain
pub mod constants;

/// Core data models (clients, users, store records)
pub mod models;
