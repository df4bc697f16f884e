// ABOUTME: Logging configuration and structured logging setup for the SSO server
// ABOUTME: tracing-subscriber initialisation plus audit helpers for security-relevant events
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Production-ready logging configuration with structured output

use crate::constants::service::SERVICE_NAME;
use anyhow::Result;
use serde_json::json;
use std::env;
use std::io;
use tracing::{info, warn, Level};
use tracing_subscriber::{
    filter::Directive,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};
use uuid::Uuid;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty, compact)
    pub format: LogFormat,
    /// Include source file and line numbers
    pub include_location: bool,
    /// Include thread information
    pub include_thread: bool,
    /// Include span information for tracing
    pub include_spans: bool,
    /// Service name for structured logging
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Environment (development, staging, production)
    pub environment: String,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// `JSON` format for production logging
    Json,
    /// Pretty format for development
    Pretty,
    /// Compact format for space-constrained environments
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Pretty,
            include_location: false,
            include_thread: false,
            include_spans: false,
            service_name: SERVICE_NAME.into(),
            service_version: env!("CARGO_PKG_VERSION").to_owned(),
            environment: "development".into(),
        }
    }
}

fn directive(spec: &str, fallback: Level) -> Directive {
    spec.parse().unwrap_or_else(|_| fallback.into())
}

impl LoggingConfig {
    /// Create logging configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let level = env::var("RUST_LOG").unwrap_or_else(|_| "info".into());

        let format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") => LogFormat::Compact,
            _ => LogFormat::Pretty,
        };

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        // In production, use more detailed logging
        let is_production = environment == "production";

        Self {
            level,
            format,
            include_location: is_production || env::var("LOG_INCLUDE_LOCATION").is_ok(),
            include_thread: is_production || env::var("LOG_INCLUDE_THREAD").is_ok(),
            include_spans: is_production || env::var("LOG_INCLUDE_SPANS").is_ok(),
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| SERVICE_NAME.into()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_owned()),
            environment,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        // RUST_LOG wins as the base; noise reduction applies either way
        env::var("RUST_LOG")
            .map_or_else(|_| EnvFilter::new(&self.level), EnvFilter::new)
            .add_directive(directive("hyper=warn", Level::WARN))
            .add_directive(directive("hyper::proto=warn", Level::WARN))
            .add_directive(directive("redis=warn", Level::WARN))
            .add_directive(directive("tower_http=info", Level::INFO))
            .add_directive(directive(
                &format!("sso_server={}", self.level),
                Level::INFO,
            ))
    }

    /// Initialize the global tracing subscriber
    ///
    /// # Errors
    ///
    /// Returns an error if a global subscriber is already installed
    pub fn init(&self) -> Result<()> {
        let registry = tracing_subscriber::registry().with(self.env_filter());
        let span_events = if self.include_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        match self.format {
            LogFormat::Json => {
                let json_layer = fmt::layer()
                    .with_file(self.include_location)
                    .with_line_number(self.include_location)
                    .with_thread_ids(self.include_thread)
                    .with_thread_names(self.include_thread)
                    .with_target(true)
                    .with_writer(io::stdout)
                    .with_span_events(span_events)
                    .json();

                registry.with(json_layer).try_init()?;
            }
            LogFormat::Pretty => {
                let pretty_layer = fmt::layer()
                    .with_file(self.include_location)
                    .with_line_number(self.include_location)
                    .with_thread_ids(self.include_thread)
                    .with_thread_names(self.include_thread)
                    .with_target(true)
                    .with_writer(io::stdout)
                    .with_span_events(span_events);

                registry.with(pretty_layer).try_init()?;
            }
            LogFormat::Compact => {
                let compact_layer = fmt::layer()
                    .compact()
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(false)
                    .with_thread_names(false)
                    .with_target(false)
                    .with_writer(io::stdout)
                    .with_span_events(FmtSpan::NONE);

                registry.with(compact_layer).try_init()?;
            }
        }

        self.log_startup_info();
        Ok(())
    }

    fn log_startup_info(&self) {
        info!(
            service.name = %self.service_name,
            service.version = %self.service_version,
            environment = %self.environment,
            log.level = %self.level,
            log.format = ?self.format,
            "SSO server starting up"
        );

        let config_summary = json!({
            "service": {
                "name": self.service_name,
                "version": self.service_version,
                "environment": self.environment
            },
            "logging": {
                "level": self.level,
                "format": format!("{:?}", self.format),
                "features": {
                    "location": self.include_location,
                    "thread": self.include_thread,
                    "spans": self.include_spans
                }
            }
        });

        info!("Logging configured: {}", config_summary);
    }
}

/// Initialize logging from environment
///
/// # Errors
///
/// Returns an error if logging initialization fails
pub fn init_from_env() -> Result<()> {
    LoggingConfig::from_env().init()
}

/// Security audit events
///
/// Codes, secrets and tokens are never passed in here; events carry
/// identifiers only.
pub struct AuditLogger;

impl AuditLogger {
    /// First-party login attempt
    pub fn log_login(user_id: Option<Uuid>, success: bool, reason: Option<&str>) {
        if success {
            info!(
                user_id = ?user_id,
                event_type = "login",
                success = true,
                "Login successful"
            );
        } else {
            warn!(
                user_id = ?user_id,
                event_type = "login",
                success = false,
                reason = reason.unwrap_or("unknown"),
                "Login failed"
            );
        }
    }

    /// Logout and the refresh records it revoked
    pub fn log_logout(user_id: Uuid, revoked_refresh_tokens: u64, access_token_revoked: bool) {
        info!(
            user_id = %user_id,
            revoked_refresh_tokens,
            access_token_revoked,
            event_type = "logout",
            "User logged out"
        );
    }

    /// Token endpoint client authentication failed
    pub fn log_client_auth_failure(client_id: &str) {
        warn!(
            client_id = %client_id,
            event_type = "client_authentication",
            "Client authentication failed"
        );
    }

    /// Authorization code minted
    pub fn log_code_issued(client_id: &str, user_id: Uuid, scope: &str) {
        info!(
            client_id = %client_id,
            user_id = %user_id,
            scope = %scope,
            event_type = "authorization_code_issued",
            "Authorization code issued"
        );
    }

    /// Authorization code redemption refused
    pub fn log_code_rejected(client_id: &str, reason: &str) {
        warn!(
            client_id = %client_id,
            reason = %reason,
            event_type = "authorization_code_rejected",
            "Authorization code rejected"
        );
    }

    /// User declined consent
    pub fn log_consent_denied(client_id: &str, user_id: Uuid) {
        info!(
            client_id = %client_id,
            user_id = %user_id,
            event_type = "consent_denied",
            "User denied consent"
        );
    }

    /// Token endpoint success
    pub fn log_token_issued(client_id: &str, grant_type: &str, scope: Option<&str>) {
        info!(
            client_id = %client_id,
            grant_type = %grant_type,
            scope = scope.unwrap_or(""),
            event_type = "token_issued",
            "Tokens issued"
        );
    }

    /// Rate limit exceeded
    pub fn log_rate_limited(endpoint: &str, identifier: &str, count: u64) {
        warn!(
            endpoint = %endpoint,
            identifier = %identifier,
            count,
            event_type = "rate_limited",
            "Rate limit exceeded"
        );
    }
}
