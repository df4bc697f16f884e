// ABOUTME: Environment-based server configuration with typed sections and defaults
// ABOUTME: Covers bind address, issuer, signing keys, token lifetimes, OAuth policy, store, seeds
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::store::StoreConfig;
use crate::constants::oauth::{
    DEFAULT_AUTHORIZATION_CODE_CAP_MINUTES, DEFAULT_ID_TOKEN_MINUTES, DEFAULT_JWT_LEEWAY_SECS,
    DEFAULT_LOGIN_ACCESS_TOKEN_MINUTES, DEFAULT_LOGIN_REFRESH_TOKEN_DAYS, DEFAULT_SESSION_HOURS,
};
use crate::constants::service::{DEFAULT_BASE_URL, DEFAULT_ISSUER, DEFAULT_KEY_ID};
use crate::errors::{AppError, AppResult};
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;
use url::Url;

/// Read an environment variable, falling back to `default` when unset
#[must_use]
pub fn env_var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_owned())
}

/// Parse an environment variable, falling back to `default` when unset
///
/// # Errors
///
/// Returns a `ConfigInvalid` error naming the variable when it is set but
/// does not parse
pub fn parse_env<T>(name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| AppError::config_invalid(format!("Invalid {name} value '{raw}': {e}"))),
        _ => Ok(default),
    }
}

/// HTTP listener settings
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
}

/// Signing key pair location
#[derive(Debug, Clone)]
pub struct SigningKeyConfig {
    /// PEM private key (PKCS#8 or PKCS#1)
    pub private_key_path: PathBuf,
    /// PEM public key (SPKI or PKCS#1)
    pub public_key_path: PathBuf,
    /// `kid` published in token headers and the JWKS
    pub key_id: String,
}

/// Token and secret lifetimes
#[derive(Debug, Clone)]
pub struct TokenLifetimeConfig {
    /// Access token lifetime for first-party login
    pub access_token_minutes: i64,
    /// Refresh token lifetime for first-party login
    pub refresh_token_days: i64,
    /// ID token lifetime
    pub id_token_minutes: i64,
    /// Upper bound on any client's authorization code lifetime
    pub authorization_code_minutes: i64,
    /// Session lifetime
    pub session_hours: i64,
    /// Clock-skew leeway applied to `exp` and `iat`
    pub leeway_secs: u64,
}

impl Default for TokenLifetimeConfig {
    fn default() -> Self {
        Self {
            access_token_minutes: DEFAULT_LOGIN_ACCESS_TOKEN_MINUTES,
            refresh_token_days: DEFAULT_LOGIN_REFRESH_TOKEN_DAYS,
            id_token_minutes: DEFAULT_ID_TOKEN_MINUTES,
            authorization_code_minutes: DEFAULT_AUTHORIZATION_CODE_CAP_MINUTES,
            session_hours: DEFAULT_SESSION_HOURS,
            leeway_secs: DEFAULT_JWT_LEEWAY_SECS,
        }
    }
}

impl TokenLifetimeConfig {
    /// Load lifetimes from environment
    ///
    /// # Errors
    ///
    /// Returns a `ConfigInvalid` error for unparseable or non-positive values
    pub fn from_env() -> AppResult<Self> {
        let config = Self {
            access_token_minutes: parse_env(
                "JWT_ACCESS_TOKEN_EXPIRE_MINUTES",
                DEFAULT_LOGIN_ACCESS_TOKEN_MINUTES,
            )?,
            refresh_token_days: parse_env(
                "JWT_REFRESH_TOKEN_EXPIRE_DAYS",
                DEFAULT_LOGIN_REFRESH_TOKEN_DAYS,
            )?,
            id_token_minutes: parse_env("JWT_ID_TOKEN_EXPIRE_MINUTES", DEFAULT_ID_TOKEN_MINUTES)?,
            authorization_code_minutes: parse_env(
                "OAUTH_AUTHORIZATION_CODE_EXPIRE_MINUTES",
                DEFAULT_AUTHORIZATION_CODE_CAP_MINUTES,
            )?,
            session_hours: parse_env("SESSION_EXPIRE_HOURS", DEFAULT_SESSION_HOURS)?,
            leeway_secs: parse_env("JWT_LEEWAY_SECS", DEFAULT_JWT_LEEWAY_SECS)?,
        };

        for (name, value) in [
            ("JWT_ACCESS_TOKEN_EXPIRE_MINUTES", config.access_token_minutes),
            ("JWT_REFRESH_TOKEN_EXPIRE_DAYS", config.refresh_token_days),
            ("JWT_ID_TOKEN_EXPIRE_MINUTES", config.id_token_minutes),
            (
                "OAUTH_AUTHORIZATION_CODE_EXPIRE_MINUTES",
                config.authorization_code_minutes,
            ),
            ("SESSION_EXPIRE_HOURS", config.session_hours),
        ] {
            if value <= 0 {
                return Err(AppError::config_invalid(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        Ok(config)
    }
}

/// OAuth policy switches
#[derive(Debug, Clone, Default)]
pub struct OAuthPolicyConfig {
    /// Rotate refresh tokens on every use
    pub refresh_token_rotation: bool,
    /// Require PKCE from public clients
    pub require_pkce: bool,
}

/// YAML seed files for the in-memory directories
#[derive(Debug, Clone, Default)]
pub struct DirectorySeedConfig {
    /// Client applications
    pub clients_file: Option<PathBuf>,
    /// User accounts
    pub users_file: Option<PathBuf>,
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listener
    pub http: HttpConfig,
    /// `iss` claim and discovery issuer
    pub issuer: String,
    /// Public base URL for discovery endpoint URLs
    pub base_url: String,
    /// Signing key pair
    pub keys: SigningKeyConfig,
    /// Lifetimes
    pub lifetimes: TokenLifetimeConfig,
    /// OAuth policy
    pub oauth: OAuthPolicyConfig,
    /// Secret store
    pub store: StoreConfig,
    /// Whether per-endpoint rate limits apply
    pub rate_limit_enabled: bool,
    /// Directory seed files
    pub directories: DirectorySeedConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig {
                host: "0.0.0.0".to_owned(),
                port: 8080,
            },
            issuer: DEFAULT_ISSUER.to_owned(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            keys: SigningKeyConfig {
                private_key_path: PathBuf::from("keys/private_key.pem"),
                public_key_path: PathBuf::from("keys/public_key.pem"),
                key_id: DEFAULT_KEY_ID.to_owned(),
            },
            lifetimes: TokenLifetimeConfig::default(),
            oauth: OAuthPolicyConfig::default(),
            store: StoreConfig::default(),
            rate_limit_enabled: true,
            directories: DirectorySeedConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns a `ConfigInvalid` error when any variable is set to an
    /// unparseable value
    pub fn from_env() -> AppResult<Self> {
        info!("Loading configuration from environment variables");

        let base_url = env_var_or("SSO_BASE_URL", DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_owned();
        Url::parse(&base_url)
            .map_err(|e| AppError::config_invalid(format!("Invalid SSO_BASE_URL: {e}")))?;

        let config = Self {
            http: HttpConfig {
                host: env_var_or("HTTP_HOST", "0.0.0.0"),
                port: parse_env("HTTP_PORT", 8080)?,
            },
            issuer: env_var_or("SSO_ISSUER", DEFAULT_ISSUER),
            base_url,
            keys: SigningKeyConfig {
                private_key_path: PathBuf::from(env_var_or(
                    "JWT_PRIVATE_KEY_PATH",
                    "keys/private_key.pem",
                )),
                public_key_path: PathBuf::from(env_var_or(
                    "JWT_PUBLIC_KEY_PATH",
                    "keys/public_key.pem",
                )),
                key_id: env_var_or("JWT_KEY_ID", DEFAULT_KEY_ID),
            },
            lifetimes: TokenLifetimeConfig::from_env()?,
            oauth: OAuthPolicyConfig {
                refresh_token_rotation: parse_env("OAUTH_REFRESH_TOKEN_ROTATION", false)?,
                require_pkce: parse_env("OAUTH_REQUIRE_PKCE", false)?,
            },
            store: StoreConfig::from_env()?,
            rate_limit_enabled: parse_env("RATE_LIMIT_ENABLED", true)?,
            directories: DirectorySeedConfig {
                clients_file: env::var("SSO_CLIENTS_FILE").ok().map(PathBuf::from),
                users_file: env::var("SSO_USERS_FILE").ok().map(PathBuf::from),
            },
        };

        info!(
            issuer = %config.issuer,
            store = %config.store.backend,
            rotation = config.oauth.refresh_token_rotation,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Human-readable summary for the startup log; contains no secrets
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "listen={}:{} issuer={} store={} rate_limits={} rotation={} require_pkce={}",
            self.http.host,
            self.http.port,
            self.issuer,
            self.store.backend,
            self.rate_limit_enabled,
            self.oauth.refresh_token_rotation,
            self.oauth.require_pkce,
        )
    }
}
