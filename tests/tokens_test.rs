// ABOUTME: Integration tests for RS256 token issuing, verification, and key loading
// ABOUTME: Covers expiry leeway, issuer and key id checks, JWKS shape, and PEM files on disk
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use anyhow::Result;
use chrono::Duration;
use serde_json::Value;
use sso_server::errors::ErrorCode;
use sso_server::jwks::{JwksManager, SigningKeyPair};
use sso_server::tokens::{ClaimSet, TokenCodec, TokenType, TokenValidationError};
use std::fs;
use std::sync::Arc;
use std::time::Duration as StdDuration;

fn codec(issuer: &str, leeway_secs: u64) -> Result<TokenCodec> {
    Ok(TokenCodec::new(common::test_jwks()?, issuer, leeway_secs))
}

#[test]
fn test_issue_and_verify() -> Result<()> {
    let codec = codec(common::ISSUER, 5)?;
    let claims = ClaimSet::new("user-1", Some("openid profile".to_owned()))
        .with_claim("client_id", "web-app");

    let issued = codec.issue(claims, TokenType::Access, Duration::minutes(5))?;
    let verified = codec.verify(&issued.token)?;

    assert_eq!(verified, issued.claims);
    assert_eq!(verified.sub, "user-1");
    assert_eq!(verified.iss, common::ISSUER);
    assert_eq!(verified.token_type, TokenType::Access);
    assert!(verified.has_scope("profile"));
    assert!(!verified.has_scope("email"));
    assert_eq!(
        verified.extra.get("client_id").and_then(Value::as_str),
        Some("web-app")
    );
    assert_eq!(verified.exp - verified.iat, 300);
    Ok(())
}

#[test]
fn test_every_token_gets_a_fresh_jti() -> Result<()> {
    let codec = codec(common::ISSUER, 5)?;
    let a = codec.issue(ClaimSet::new("u", None), TokenType::Refresh, Duration::days(1))?;
    let b = codec.issue(ClaimSet::new("u", None), TokenType::Refresh, Duration::days(1))?;
    assert_ne!(a.claims.jti, b.claims.jti);
    Ok(())
}

#[test]
fn test_expired_token_rejected() -> Result<()> {
    let codec = codec(common::ISSUER, 5)?;
    let issued = codec.issue(
        ClaimSet::new("u", None),
        TokenType::Access,
        Duration::seconds(-60),
    )?;

    let err = codec.verify(&issued.token).unwrap_err();
    assert!(matches!(err, TokenValidationError::Expired { .. }));
    Ok(())
}

#[test]
fn test_leeway_tolerates_small_skew() -> Result<()> {
    let codec = codec(common::ISSUER, 30)?;
    let issued = codec.issue(
        ClaimSet::new("u", None),
        TokenType::Access,
        Duration::seconds(-5),
    )?;
    assert!(codec.verify(&issued.token).is_ok());
    Ok(())
}

#[test]
fn test_zero_leeway_expiry_boundary() -> Result<()> {
    let codec = codec(common::ISSUER, 0)?;

    let just_expired = codec.issue(ClaimSet::new("u", None), TokenType::Access, Duration::seconds(-1))?;
    assert!(matches!(
        codec.verify(&just_expired.token),
        Err(TokenValidationError::Expired { .. })
    ));

    // exp == iat == now: no longer in the future
    let expiring_now = codec.issue(ClaimSet::new("u", None), TokenType::Access, Duration::zero())?;
    assert!(matches!(
        codec.verify(&expiring_now.token),
        Err(TokenValidationError::Expired { .. })
    ));

    let still_valid = codec.issue(ClaimSet::new("u", None), TokenType::Access, Duration::seconds(2))?;
    assert!(codec.verify(&still_valid.token).is_ok());
    Ok(())
}

#[test]
fn test_leeway_window_is_exclusive() -> Result<()> {
    let codec = codec(common::ISSUER, 3)?;
    let past_window = codec.issue(ClaimSet::new("u", None), TokenType::Access, Duration::seconds(-3))?;
    assert!(matches!(
        codec.verify(&past_window.token),
        Err(TokenValidationError::Expired { .. })
    ));
    Ok(())
}

#[test]
fn test_acceptance_window_covers_leeway() -> Result<()> {
    let codec = codec(common::ISSUER, 30)?;

    // Past exp but inside the leeway: verify still accepts it
    let lapsed = codec.issue(ClaimSet::new("u", None), TokenType::Access, Duration::seconds(-5))?;
    assert!(codec.verify(&lapsed.token).is_ok());
    assert_eq!(lapsed.claims.acceptance_window(30), StdDuration::from_secs(30));

    let fresh = codec.issue(ClaimSet::new("u", None), TokenType::Access, Duration::seconds(60))?;
    let window = fresh.claims.acceptance_window(30);
    assert!(window > StdDuration::from_secs(85), "window too short: {window:?}");
    assert!(window <= StdDuration::from_secs(90));
    Ok(())
}

#[test]
fn test_foreign_issuer_rejected() -> Result<()> {
    let theirs = codec("https://other.example", 5)?;
    let ours = codec(common::ISSUER, 5)?;
    let issued = theirs.issue(ClaimSet::new("u", None), TokenType::Access, Duration::minutes(5))?;

    let err = ours.verify(&issued.token).unwrap_err();
    assert!(matches!(err, TokenValidationError::InvalidSignature(_)));
    Ok(())
}

#[test]
fn test_tampered_and_garbage_tokens_rejected() -> Result<()> {
    let codec = codec(common::ISSUER, 5)?;
    let issued = codec.issue(ClaimSet::new("u", None), TokenType::Access, Duration::minutes(5))?;

    let mut parts: Vec<String> = issued.token.split('.').map(str::to_owned).collect();
    parts[1] = parts[1].chars().rev().collect();
    assert!(codec.verify(&parts.join(".")).is_err());

    let err = codec.verify("not-a-token").unwrap_err();
    assert!(matches!(err, TokenValidationError::Malformed(_)));
    Ok(())
}

#[test]
fn test_unknown_key_id_rejected() -> Result<()> {
    let other_pair = SigningKeyPair::from_pem(
        "rotated-key",
        &common::signing_keys().export_private_key_pem()?,
        &common::signing_keys().export_public_key_pem()?,
    )?;
    let other = TokenCodec::new(Arc::new(JwksManager::new(other_pair)?), common::ISSUER, 5);
    let ours = codec(common::ISSUER, 5)?;

    let issued = other.issue(ClaimSet::new("u", None), TokenType::Access, Duration::minutes(5))?;
    let err = ours.verify(&issued.token).unwrap_err();
    assert!(matches!(err, TokenValidationError::InvalidSignature(_)));
    Ok(())
}

#[test]
fn test_jwks_publishes_signing_key() -> Result<()> {
    let jwks = common::test_jwks()?.jwks();
    assert_eq!(jwks.keys.len(), 1);

    let key = &jwks.keys[0];
    assert_eq!(key.kid, "test-key");
    assert_eq!(key.kty, "RSA");
    assert_eq!(key.alg, "RS256");
    assert_eq!(key.key_use, "sig");
    assert_eq!(key.e, "AQAB");

    let json = serde_json::to_value(&jwks)?;
    assert_eq!(json["keys"][0]["use"], "sig");
    Ok(())
}

#[test]
fn test_small_keys_refused() {
    let err = SigningKeyPair::generate_with_key_size("k", 1024).err().unwrap();
    assert_eq!(err.code, ErrorCode::InvalidInput);
}

#[tokio::test]
async fn test_load_key_pair_from_files() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let private_path = dir.path().join("private_key.pem");
    let public_path = dir.path().join("public_key.pem");
    let pair = common::signing_keys();
    fs::write(&private_path, pair.export_private_key_pem()?)?;
    fs::write(&public_path, pair.export_public_key_pem()?)?;

    let manager = JwksManager::load_from_files("disk-key", &private_path, &public_path).await?;
    assert_eq!(manager.kid(), "disk-key");

    let missing = JwksManager::load_from_files(
        "disk-key",
        &dir.path().join("absent.pem"),
        &public_path,
    )
    .await;
    assert_eq!(missing.err().unwrap().code, ErrorCode::ConfigError);
    Ok(())
}

#[tokio::test]
async fn test_mismatched_key_files_refused() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let private_path = dir.path().join("private_key.pem");
    let public_path = dir.path().join("public_key.pem");

    let ours = common::signing_keys();
    let theirs = SigningKeyPair::generate_with_key_size("other", 2048)?;
    fs::write(&private_path, ours.export_private_key_pem()?)?;
    fs::write(&public_path, theirs.export_public_key_pem()?)?;

    let result = JwksManager::load_from_files("k", &private_path, &public_path).await;
    assert_eq!(result.err().unwrap().code, ErrorCode::CryptoError);
    Ok(())
}
