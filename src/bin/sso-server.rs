// ABOUTME: SSO server binary: loads configuration, wires resources, and serves HTTP
// ABOUTME: Drains in-flight requests and closes the secret store on SIGINT/SIGTERM
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # SSO Server Binary
//!
//! Starts the OAuth 2.0 / OpenID Connect endpoints. Configuration comes from
//! the environment; a missing or mismatched signing key pair stops startup.

use anyhow::{Context, Result};
use clap::Parser;
use sso_server::{config::ServerConfig, context::ServerResources, logging, routes};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "sso-server")]
#[command(about = "SSO identity provider - OAuth 2.0 / OpenID Connect authorization server")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override bind host
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env().context("Invalid configuration")?;
    if let Some(http_port) = args.http_port {
        config.http.port = http_port;
    }
    if let Some(host) = args.host {
        config.http.host = host;
    }

    logging::init_from_env()?;

    info!("Starting SSO server");
    info!("{}", config.summary());

    let bind_addr = format!("{}:{}", config.http.host, config.http.port);
    let resources = Arc::new(
        ServerResources::from_config(config)
            .await
            .context("Failed to initialise server resources")?,
    );
    let store = resources.store.clone();

    let app = routes::router(resources);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Cannot bind {bind_addr}"))?;

    info!(address = %bind_addr, "Listening");
    display_available_endpoints(&bind_addr);

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    if let Err(e) = store.close().await {
        error!(error = %e, "Failed to close secret store");
    }

    served.context("Server error")?;
    info!("Shutdown complete");
    Ok(())
}

fn display_available_endpoints(bind_addr: &str) {
    info!("=== Available Endpoints ===");
    info!("   Authorization:  GET  http://{bind_addr}/authorize");
    info!("   Consent:        POST http://{bind_addr}/consent");
    info!("   Token:          POST http://{bind_addr}/token");
    info!("   Userinfo:       GET  http://{bind_addr}/userinfo");
    info!("   Discovery:      GET  http://{bind_addr}/.well-known/openid-configuration");
    info!("   JWKS:           GET  http://{bind_addr}/.well-known/jwks.json");
    info!("   Login:          POST http://{bind_addr}/auth/login");
    info!("   Health:         GET  http://{bind_addr}/health");
}

/// Wait for SIGTERM or SIGINT
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received, draining connections");
}
