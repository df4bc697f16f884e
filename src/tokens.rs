// ABOUTME: RS256 token codec for access, refresh, and ID tokens
// ABOUTME: Stamps iat/exp/iss/jti/token_type on issue and reports typed failures on verify
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Token Codec
//!
//! Every token the server hands out is a self-contained RS256 JWT. The codec
//! owns the claims every token carries (`iat`, `exp`, `iss`, `jti`,
//! `token_type`); callers supply the subject, the scope, and any extra claims
//! such as `aud`, `nonce`, or profile fields.
//!
//! Verification checks the signature, the issuer, and the expiry (with the
//! configured clock-skew leeway) and reports which of those failed. Whether
//! the reason reaches the client is up to the caller; the HTTP layer always
//! answers with a generic `invalid_token`.

use crate::errors::{AppError, AppResult};
use crate::jwks::{JsonWebKeySet, JwksManager};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{decode, decode_header, encode, Algorithm, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Claims the codec owns; stripped from caller-supplied extras
const RESERVED_CLAIMS: &[&str] = &["sub", "scope", "token_type", "jti", "iat", "exp", "iss"];

/// Token type discriminator carried in the `token_type` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    /// Bearer token for resource access
    #[serde(rename = "access_token")]
    Access,
    /// Long-lived token exchanged for new access tokens
    #[serde(rename = "refresh_token")]
    Refresh,
    /// OpenID Connect identity assertion
    #[serde(rename = "id_token")]
    Id,
}

impl TokenType {
    /// Wire name of the discriminator
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access_token",
            Self::Refresh => "refresh_token",
            Self::Id => "id_token",
        }
    }
}

/// Caller-supplied claims
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimSet {
    /// Subject: a user id, or a client id for `client_credentials`
    pub sub: String,
    /// Space-separated scope
    pub scope: Option<String>,
    /// Any other claims (`aud`, `nonce`, `email`, ...)
    pub extra: Map<String, Value>,
}

impl ClaimSet {
    /// Claims for `sub` with an optional scope
    pub fn new(sub: impl Into<String>, scope: Option<String>) -> Self {
        Self {
            sub: sub.into(),
            scope,
            extra: Map::new(),
        }
    }

    /// Add an extra claim; reserved names are ignored
    #[must_use]
    pub fn with_claim(mut self, name: &str, value: impl Into<Value>) -> Self {
        if !RESERVED_CLAIMS.contains(&name) {
            self.extra.insert(name.to_owned(), value.into());
        }
        self
    }
}

/// Decoded claims of a verified token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject
    pub sub: String,
    /// Space-separated scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Token type discriminator
    pub token_type: TokenType,
    /// Unique token id
    pub jti: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
    /// Issuer
    pub iss: String,
    /// Every other claim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenClaims {
    /// Whether `scope` lists `wanted`
    #[must_use]
    pub fn has_scope(&self, wanted: &str) -> bool {
        self.scope
            .as_deref()
            .is_some_and(|scope| scope.split_whitespace().any(|s| s == wanted))
    }

    /// Expiry as a timestamp
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }

    /// Time until expiry, zero when already past
    #[must_use]
    pub fn remaining_lifetime(&self) -> Duration {
        (self.expires_at() - Utc::now()).max(Duration::zero())
    }

    /// How long `TokenCodec::verify` keeps accepting this token under `leeway_secs`
    ///
    /// Revocation markers must outlive this window, not just `exp`.
    #[must_use]
    pub fn acceptance_window(&self, leeway_secs: u64) -> StdDuration {
        self.remaining_lifetime()
            .to_std()
            .unwrap_or_default()
            .saturating_add(StdDuration::from_secs(leeway_secs))
    }
}

/// A freshly signed token and the claims it carries
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Compact JWT
    pub token: String,
    /// Claims embedded in it
    pub claims: TokenClaims,
}

/// Why a token failed verification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenValidationError {
    /// Signature, key id, or issuer do not check out
    #[error("Token signature is invalid: {0}")]
    InvalidSignature(String),
    /// `exp` is in the past beyond the leeway
    #[error("Token expired at {expired_at}")]
    Expired {
        /// When the token expired
        expired_at: DateTime<Utc>,
    },
    /// Not a well-formed token
    #[error("Token is malformed: {0}")]
    Malformed(String),
}

/// Issues and verifies RS256 tokens
#[derive(Clone)]
pub struct TokenCodec {
    keys: Arc<JwksManager>,
    issuer: String,
    leeway_secs: u64,
}

impl TokenCodec {
    /// Create a codec signing with `keys` on behalf of `issuer`
    pub fn new(keys: Arc<JwksManager>, issuer: impl Into<String>, leeway_secs: u64) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            leeway_secs,
        }
    }

    /// Configured issuer
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Published verification keys
    #[must_use]
    pub fn jwks(&self) -> JsonWebKeySet {
        self.keys.jwks()
    }

    /// Sign `claims` as a token of `token_type` valid for `lifetime`
    ///
    /// # Errors
    ///
    /// Returns a `CryptoError` if signing fails
    pub fn issue(
        &self,
        claims: ClaimSet,
        token_type: TokenType,
        lifetime: Duration,
    ) -> AppResult<IssuedToken> {
        let now = Utc::now();
        let mut extra = claims.extra;
        extra.retain(|name, _| !RESERVED_CLAIMS.contains(&name.as_str()));

        let claims = TokenClaims {
            sub: claims.sub,
            scope: claims.scope,
            token_type,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            iss: self.issuer.clone(),
            extra,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.keys.kid().to_owned());

        let token = encode(&header, &claims, self.keys.encoding_key())
            .map_err(|e| AppError::crypto(format!("Failed to sign {}: {e}", token_type.as_str())))?;

        Ok(IssuedToken { token, claims })
    }

    /// Verify a token and return its claims
    ///
    /// # Errors
    ///
    /// Returns the specific [`TokenValidationError`] that applies
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenValidationError> {
        let header = decode_header(token)
            .map_err(|e| TokenValidationError::Malformed(format!("bad header: {e}")))?;

        if header.kid.as_deref().is_some_and(|kid| kid != self.keys.kid()) {
            return Err(TokenValidationError::InvalidSignature(
                "unknown key id".to_owned(),
            ));
        }

        let mut validation = Validation::new(Algorithm::RS256);
        // Expiry is checked below so the leeway applies to exp and iat alike.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);
        validation.set_issuer(&[&self.issuer]);

        let claims = decode::<TokenClaims>(token, self.keys.decoding_key(), &validation)
            .map(|data| data.claims)
            .map_err(|e| Self::convert_jwt_error(&e))?;

        self.check_time_claims(&claims)?;
        Ok(claims)
    }

    fn check_time_claims(&self, claims: &TokenClaims) -> Result<(), TokenValidationError> {
        let now = Utc::now().timestamp();
        let leeway = i64::try_from(self.leeway_secs).unwrap_or(i64::MAX);

        if now >= claims.exp.saturating_add(leeway) {
            debug!(token_type = claims.token_type.as_str(), "Token expired");
            return Err(TokenValidationError::Expired {
                expired_at: claims.expires_at(),
            });
        }
        if claims.iat > now.saturating_add(leeway) {
            return Err(TokenValidationError::Malformed(
                "token issued in the future".to_owned(),
            ));
        }
        Ok(())
    }

    fn convert_jwt_error(e: &JwtError) -> TokenValidationError {
        debug!(error = ?e, "Token verification failed");
        match e.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidIssuer | ErrorKind::InvalidAlgorithm => {
                TokenValidationError::InvalidSignature(e.to_string())
            }
            ErrorKind::ExpiredSignature => TokenValidationError::Expired {
                expired_at: Utc::now(),
            },
            _ => TokenValidationError::Malformed(e.to_string()),
        }
    }
}
