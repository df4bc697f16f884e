// ABOUTME: Core data models shared between the engines and the storage adapters
// ABOUTME: Re-exports client applications, users, and secret store records
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Data Models
//!
//! - `ClientApplication`: a registered OAuth client as the registry sees it
//! - `User`: an account as the user directory hands it to the engines
//! - `SessionRecord`, `AuthorizationCodeRecord`, `RefreshTokenRecord`,
//!   `RevokedToken`: the values kept in the secret store

mod client;
mod oauth2_server;
mod user;

pub use client::ClientApplication;
pub use oauth2_server::{AuthorizationCodeRecord, RefreshTokenRecord, RevokedToken, SessionRecord};
pub use user::User;
