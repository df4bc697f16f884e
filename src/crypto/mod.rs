// ABOUTME: Random secret generation and client secret hashing primitives
// ABOUTME: ring SystemRandom for unguessable values, Argon2id for stored client secrets
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Cryptographic helpers shared by the engines.
//!
//! Session ids, authorization codes, and generated client secrets all come
//! from [`generate_secret_token`]: 32 bytes from the OS CSPRNG, base64url
//! encoded without padding.

use crate::constants::oauth::SECRET_RANDOM_BYTES;
use crate::errors::{AppError, AppResult};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::rand::{SecureRandom, SystemRandom};

/// Generate an unguessable URL-safe token
///
/// # Errors
///
/// Returns a `CryptoError` if the system RNG fails
pub fn generate_secret_token() -> AppResult<String> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; SECRET_RANDOM_BYTES];
    rng.fill(&mut bytes)
        .map_err(|_| AppError::crypto("System random number generator failed"))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a client secret for storage using Argon2id with a random salt
///
/// # Errors
///
/// Returns a `CryptoError` if hashing fails
pub fn hash_client_secret(secret: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::crypto(format!("Argon2 hashing failed: {e}")))
}

/// Check a presented client secret against its stored Argon2 hash
///
/// The comparison inside `argon2` is constant-time. An unparseable stored
/// hash never matches.
#[must_use]
pub fn verify_client_secret(secret: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        tracing::error!("Stored client secret hash is not a valid PHC string");
        return false;
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok()
}
