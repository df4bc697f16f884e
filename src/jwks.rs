// ABOUTME: RSA signing key pair loading and JWKS rendering for RS256 token signatures
// ABOUTME: Loads the PEM pair at startup, checks it matches, and publishes the public half
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! JWKS (JSON Web Key Set) Management
//!
//! - PEM key pair loading (PKCS#8 or PKCS#1 private key, SPKI or PKCS#1 public key)
//! - RSA key generation for `sso-keygen` and tests
//! - JWKS JSON for `/.well-known/jwks.json`
//!
//! The private key never leaves the process. The signing key is read-only
//! after startup and shared by every request.

use crate::constants::oauth::SIGNING_ALGORITHM;
use crate::errors::{AppError, AppResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{DecodingKey, EncodingKey};
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::info;

/// Smallest RSA modulus accepted for signing
pub const MIN_RSA_KEY_BITS: usize = 2048;

/// JWK (JSON Web Key) representation for the JWKS endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key type (always "RSA")
    pub kty: String,
    /// Public key use (always "sig")
    #[serde(rename = "use")]
    pub key_use: String,
    /// Key ID, matched against the `kid` token header
    pub kid: String,
    /// Algorithm (RS256)
    pub alg: String,
    /// RSA modulus (base64url)
    pub n: String,
    /// RSA exponent (base64url)
    pub e: String,
}

/// JWKS (JSON Web Key Set) container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    /// Published public keys
    pub keys: Vec<JsonWebKey>,
}

/// RSA key pair identified by a key id
#[derive(Clone)]
pub struct SigningKeyPair {
    /// Key identifier
    pub kid: String,
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl SigningKeyPair {
    /// Generate a fresh key pair
    ///
    /// # Errors
    /// Returns an error if the size is below 2048 bits or generation fails
    pub fn generate_with_key_size(kid: &str, key_size_bits: usize) -> AppResult<Self> {
        if key_size_bits < MIN_RSA_KEY_BITS {
            return Err(AppError::invalid_input(format!(
                "RSA keys must be at least {MIN_RSA_KEY_BITS} bits"
            )));
        }

        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, key_size_bits)
            .map_err(|e| AppError::crypto(format!("Failed to generate RSA private key: {e}")))?;
        let public_key = RsaPublicKey::from(&private_key);

        Ok(Self {
            kid: kid.to_owned(),
            private_key,
            public_key,
        })
    }

    /// Build a key pair from PEM text
    ///
    /// # Errors
    /// Returns an error if either PEM fails to parse or the halves do not match
    pub fn from_pem(kid: &str, private_pem: &str, public_pem: &str) -> AppResult<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(private_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(private_pem))
            .map_err(|e| AppError::crypto(format!("Failed to parse private key PEM: {e}")))?;

        let public_key = RsaPublicKey::from_public_key_pem(public_pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(public_pem))
            .map_err(|e| AppError::crypto(format!("Failed to parse public key PEM: {e}")))?;

        if RsaPublicKey::from(&private_key) != public_key {
            return Err(AppError::crypto(
                "Public key does not belong to the private key",
            ));
        }

        Ok(Self {
            kid: kid.to_owned(),
            private_key,
            public_key,
        })
    }

    /// Export the private key as PKCS#8 PEM
    ///
    /// # Errors
    /// Returns an error if PEM encoding fails
    pub fn export_private_key_pem(&self) -> AppResult<String> {
        self.private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| AppError::crypto(format!("Failed to export private key as PEM: {e}")))
    }

    /// Export the public key as SPKI PEM
    ///
    /// # Errors
    /// Returns an error if PEM encoding fails
    pub fn export_public_key_pem(&self) -> AppResult<String> {
        self.public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| AppError::crypto(format!("Failed to export public key as PEM: {e}")))
    }

    /// Public key in JWK form
    #[must_use]
    pub fn to_jwk(&self) -> JsonWebKey {
        JsonWebKey {
            kty: "RSA".to_owned(),
            key_use: "sig".to_owned(),
            kid: self.kid.clone(),
            alg: SIGNING_ALGORITHM.to_owned(),
            n: URL_SAFE_NO_PAD.encode(self.public_key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(self.public_key.e().to_bytes_be()),
        }
    }

    fn encoding_key(&self) -> AppResult<EncodingKey> {
        let der = self
            .private_key
            .to_pkcs1_der()
            .map_err(|e| AppError::crypto(format!("Failed to encode private key: {e}")))?;
        Ok(EncodingKey::from_rsa_der(der.as_bytes()))
    }

    fn decoding_key(&self) -> AppResult<DecodingKey> {
        let jwk = self.to_jwk();
        DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|e| AppError::crypto(format!("Failed to build decoding key: {e}")))
    }
}

/// Holds the active signing key and its derived jsonwebtoken keys
pub struct JwksManager {
    key_pair: SigningKeyPair,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwksManager {
    /// Prepare a manager around an existing key pair
    ///
    /// # Errors
    /// Returns an error if the jsonwebtoken keys cannot be derived
    pub fn new(key_pair: SigningKeyPair) -> AppResult<Self> {
        let encoding_key = key_pair.encoding_key()?;
        let decoding_key = key_pair.decoding_key()?;
        Ok(Self {
            key_pair,
            encoding_key,
            decoding_key,
        })
    }

    /// Load the PEM pair from disk
    ///
    /// # Errors
    /// Returns a `ConfigError` if either file is unreadable and a `CryptoError`
    /// if the keys are invalid or mismatched
    pub async fn load_from_files(
        kid: &str,
        private_key_path: &Path,
        public_key_path: &Path,
    ) -> AppResult<Self> {
        let private_pem = fs::read_to_string(private_key_path)
            .await
            .map_err(|e| {
                AppError::config(format!(
                    "Cannot read private key {}: {e}",
                    private_key_path.display()
                ))
            })?;
        let public_pem = fs::read_to_string(public_key_path)
            .await
            .map_err(|e| {
                AppError::config(format!(
                    "Cannot read public key {}: {e}",
                    public_key_path.display()
                ))
            })?;

        let key_pair = SigningKeyPair::from_pem(kid, &private_pem, &public_pem)?;
        info!(kid, "Loaded RS256 signing key pair");
        Self::new(key_pair)
    }

    /// Key id placed in token headers
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.key_pair.kid
    }

    /// Signing key
    #[must_use]
    pub const fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    /// Verification key
    #[must_use]
    pub const fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// The published key set
    #[must_use]
    pub fn jwks(&self) -> JsonWebKeySet {
        JsonWebKeySet {
            keys: vec![self.key_pair.to_jwk()],
        }
    }
}
