// ABOUTME: PKCE (RFC 7636) challenge validation and verifier checking
// ABOUTME: S256 only; verifier digests are compared in constant time
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::models::OAuth2Error;
use crate::constants::oauth::{PKCE_MAX_LENGTH, PKCE_METHOD_S256, PKCE_MIN_LENGTH};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

fn is_unreserved(value: &str) -> bool {
    value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
}

fn has_valid_shape(value: &str) -> bool {
    (PKCE_MIN_LENGTH..=PKCE_MAX_LENGTH).contains(&value.len()) && is_unreserved(value)
}

/// Validate the PKCE parameters of an authorization request
///
/// # Errors
///
/// `invalid_request` when a method is sent without a challenge, the method is
/// not `S256`, or the challenge is not 43-128 unreserved characters
pub fn validate_challenge(
    code_challenge: Option<&str>,
    code_challenge_method: Option<&str>,
) -> Result<(), OAuth2Error> {
    let Some(challenge) = code_challenge else {
        return if code_challenge_method.is_some() {
            Err(OAuth2Error::invalid_request(
                "code_challenge_method requires code_challenge",
            ))
        } else {
            Ok(())
        };
    };

    if code_challenge_method != Some(PKCE_METHOD_S256) {
        return Err(OAuth2Error::invalid_request(
            "code_challenge_method must be S256",
        ));
    }
    if !has_valid_shape(challenge) {
        return Err(OAuth2Error::invalid_request("Malformed code_challenge"));
    }
    Ok(())
}

/// S256 transform of a verifier
#[must_use]
pub fn s256_challenge(code_verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()))
}

/// Check the verifier presented at the token endpoint against the stored challenge
///
/// # Errors
///
/// `invalid_grant` when exactly one side is present, the verifier is
/// malformed, or it does not hash to the challenge
pub fn verify(
    stored_challenge: Option<&str>,
    code_verifier: Option<&str>,
) -> Result<(), OAuth2Error> {
    match (stored_challenge, code_verifier) {
        (None, None) => Ok(()),
        (Some(_), None) => Err(OAuth2Error::invalid_grant("code_verifier is required")),
        (None, Some(_)) => Err(OAuth2Error::invalid_grant(
            "code_verifier sent but no code_challenge was registered",
        )),
        (Some(challenge), Some(verifier)) => {
            if !has_valid_shape(verifier) {
                return Err(OAuth2Error::invalid_grant("Malformed code_verifier"));
            }
            let computed = s256_challenge(verifier);
            if bool::from(computed.as_bytes().ct_eq(challenge.as_bytes())) {
                Ok(())
            } else {
                Err(OAuth2Error::invalid_grant("PKCE verification failed"))
            }
        }
    }
}
