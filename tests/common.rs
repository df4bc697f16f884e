// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Builds server resources over an in-memory store with seeded clients and users
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::too_many_lines
)]
//! Shared test utilities for `sso_server`
//!
//! RSA key generation is slow in debug builds, so one key pair is generated
//! per test binary and shared through a `OnceLock`.

use anyhow::{bail, Result};
use sso_server::{
    errors::{AppError, AppResult},
    clients::{ClientSeed, InMemoryClientDirectory},
    config::{ServerConfig, StoreConfig},
    context::ServerResources,
    jwks::{JwksManager, SigningKeyPair},
    models::{ClientApplication, User},
    oauth2_server::{AuthorizationOutcome, AuthorizeRequest, ConsentDecision},
    store::{SecretStore, StoreBackend},
    users::InMemoryUserDirectory,
};
use std::env;
use std::sync::{Arc, Once, OnceLock};
use std::time::Duration;
use tracing::Level;
use uuid::Uuid;

pub const ISSUER: &str = "https://sso.test";

pub const WEB_CLIENT_ID: &str = "web-app";
pub const WEB_CLIENT_SECRET: &str = "web-app-secret";
pub const WEB_REDIRECT_URI: &str = "https://app.example/callback";

pub const SPA_CLIENT_ID: &str = "spa";
pub const SPA_REDIRECT_URI: &str = "http://localhost:3000/callback";

pub const SERVICE_CLIENT_ID: &str = "reporting-service";
pub const SERVICE_CLIENT_SECRET: &str = "reporting-secret";

pub const ALICE_PASSWORD: &str = "correct horse battery staple";

/// RFC 7636 appendix B verifier and challenge
pub const PKCE_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
pub const PKCE_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

static INIT_LOGGER: Once = Once::new();
static SIGNING_KEYS: OnceLock<SigningKeyPair> = OnceLock::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => Level::TRACE,
            Ok("DEBUG") => Level::DEBUG,
            Ok("INFO") => Level::INFO,
            _ => Level::WARN,
        };

        let _ = tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .try_init();
    });
}

/// Key pair shared by every test in the binary
pub fn signing_keys() -> SigningKeyPair {
    SIGNING_KEYS
        .get_or_init(|| {
            SigningKeyPair::generate_with_key_size("test-key", 2048)
                .expect("Failed to generate test RSA key")
        })
        .clone()
}

/// JWKS manager around the shared key pair
pub fn test_jwks() -> Result<Arc<JwksManager>> {
    Ok(Arc::new(JwksManager::new(signing_keys())?))
}

/// Configuration with an in-memory store and no background sweeper
pub fn test_config() -> ServerConfig {
    ServerConfig {
        issuer: ISSUER.to_owned(),
        base_url: ISSUER.to_owned(),
        store: StoreConfig {
            enable_background_cleanup: false,
            ..StoreConfig::default()
        },
        ..ServerConfig::default()
    }
}

/// Confidential client that asks for consent
pub fn web_client() -> ClientApplication {
    ClientApplication {
        redirect_uris: vec![WEB_REDIRECT_URI.to_owned()],
        allowed_scopes: ["openid", "profile", "email", "phone", "offline_access"]
            .map(str::to_owned)
            .to_vec(),
        ..ClientApplication::new(WEB_CLIENT_ID, "Example Web App")
    }
}

/// Public client trusted without a consent screen
pub fn spa_client() -> ClientApplication {
    ClientApplication {
        redirect_uris: vec![SPA_REDIRECT_URI.to_owned()],
        allowed_scopes: ["openid", "profile", "email", "offline_access"]
            .map(str::to_owned)
            .to_vec(),
        is_confidential: false,
        require_consent: false,
        token_endpoint_auth_method: "none".to_owned(),
        ..ClientApplication::new(SPA_CLIENT_ID, "Example SPA")
    }
}

/// Confidential machine-to-machine client
pub fn service_client() -> ClientApplication {
    ClientApplication {
        allowed_scopes: vec!["client".to_owned(), "reports:read".to_owned()],
        grant_types: vec!["client_credentials".to_owned()],
        response_types: Vec::new(),
        ..ClientApplication::new(SERVICE_CLIENT_ID, "Reporting Service")
    }
}

pub fn alice() -> User {
    User {
        full_name: Some("Alice Liddell".to_owned()),
        phone_number: Some("+15550100".to_owned()),
        is_verified: true,
        ..User::new("alice", "alice@example.com")
    }
}

/// Resources plus handles on the seeded directories
pub struct TestServer {
    pub resources: Arc<ServerResources>,
    pub clients: InMemoryClientDirectory,
    pub users: InMemoryUserDirectory,
    pub alice: User,
}

impl TestServer {
    pub fn alice_id(&self) -> Uuid {
        self.alice.id
    }
}

/// Build resources around `config` and the default seeds
pub async fn build_server_with(config: ServerConfig) -> Result<TestServer> {
    init_test_logging();
    let store = SecretStore::open(config.store.clone()).await?;
    build_server_with_store(config, store)
}

/// Build resources around an explicit store, e.g. a failing double
pub fn build_server_with_store(config: ServerConfig, store: SecretStore) -> Result<TestServer> {
    init_test_logging();

    let clients = InMemoryClientDirectory::new();
    clients.insert_seed(ClientSeed {
        client: web_client(),
        client_secret: Some(WEB_CLIENT_SECRET.to_owned()),
    })?;
    clients.insert_seed(ClientSeed {
        client: spa_client(),
        client_secret: None,
    })?;
    clients.insert_seed(ClientSeed {
        client: service_client(),
        client_secret: Some(SERVICE_CLIENT_SECRET.to_owned()),
    })?;

    let users = InMemoryUserDirectory::new();
    let alice = alice();
    users.insert_with_password(alice.clone(), ALICE_PASSWORD, 4)?;

    let resources = ServerResources::new(
        config,
        store,
        test_jwks()?,
        Arc::new(clients.clone()),
        Arc::new(users.clone()),
    );

    Ok(TestServer {
        resources: Arc::new(resources),
        clients,
        users,
        alice,
    })
}

/// Standard test server
pub async fn build_server() -> Result<TestServer> {
    build_server_with(test_config()).await
}

/// Authorization request for the web client
pub fn web_authorize_request(scope: &str) -> AuthorizeRequest {
    AuthorizeRequest {
        response_type: "code".to_owned(),
        client_id: WEB_CLIENT_ID.to_owned(),
        redirect_uri: WEB_REDIRECT_URI.to_owned(),
        scope: Some(scope.to_owned()),
        state: Some("state-123".to_owned()),
        nonce: Some("nonce-456".to_owned()),
        ..AuthorizeRequest::default()
    }
}

/// Run `/authorize`, approving consent if asked, and return the issued code
pub async fn obtain_code(
    server: &TestServer,
    request: AuthorizeRequest,
    user_id: Uuid,
) -> Result<String> {
    let outcome = server
        .resources
        .authorization
        .handle_authorization_request(request, Some(user_id))
        .await;

    let outcome = match outcome {
        AuthorizationOutcome::ConsentRequired(prompt) => {
            let request = prompt.request;
            server
                .resources
                .authorization
                .handle_consent(
                    ConsentDecision {
                        client_id: request.client_id,
                        scope: request.scope.unwrap_or_default(),
                        redirect_uri: request.redirect_uri,
                        state: request.state,
                        nonce: request.nonce,
                        code_challenge: request.code_challenge,
                        code_challenge_method: request.code_challenge_method,
                        granted: true,
                    },
                    user_id,
                )
                .await
        }
        other => other,
    };

    match outcome {
        AuthorizationOutcome::Issued { code, .. } => Ok(code),
        other => bail!("Expected an issued code, got {other:?}"),
    }
}

/// Backend whose every call fails, standing in for an unreachable Redis
pub struct UnreachableBackend;

#[async_trait::async_trait]
impl StoreBackend for UnreachableBackend {
    async fn put(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> AppResult<()> {
        Err(AppError::storage_unavailable("connection refused"))
    }
    async fn get(&self, _key: &str) -> AppResult<Option<Vec<u8>>> {
        Err(AppError::storage_unavailable("connection refused"))
    }
    async fn take(&self, _key: &str) -> AppResult<Option<Vec<u8>>> {
        Err(AppError::storage_unavailable("connection refused"))
    }
    async fn delete(&self, _key: &str) -> AppResult<bool> {
        Err(AppError::storage_unavailable("connection refused"))
    }
    async fn exists(&self, _key: &str) -> AppResult<bool> {
        Err(AppError::storage_unavailable("connection refused"))
    }
    async fn increment(&self, _key: &str, _window: Duration) -> AppResult<u64> {
        Err(AppError::storage_unavailable("connection refused"))
    }
    async fn delete_matching(&self, _pattern: &str) -> AppResult<u64> {
        Err(AppError::storage_unavailable("connection refused"))
    }
    async fn health_check(&self) -> AppResult<()> {
        Err(AppError::storage_unavailable("connection refused"))
    }
    async fn close(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Store over [`UnreachableBackend`]
pub fn unreachable_store() -> SecretStore {
    SecretStore::with_backend(Arc::new(UnreachableBackend), Duration::from_millis(200))
}
