// ABOUTME: Health check route handlers for service monitoring and status endpoints
// ABOUTME: Reports liveness and whether the secret store answers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Health check routes for service monitoring

use crate::constants::service::SERVICE_NAME;
use crate::context::ServerResources;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create all health check routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/health", get(Self::health_handler))
            .route("/ready", get(Self::ready_handler))
            .with_state(resources)
    }

    async fn health_handler(
        State(resources): State<Arc<ServerResources>>,
    ) -> (StatusCode, Json<Value>) {
        let store_ok = resources.store.health_check().await.is_ok();
        let status = if store_ok {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };

        (
            status,
            Json(json!({
                "status": if store_ok { "healthy" } else { "degraded" },
                "service": SERVICE_NAME,
                "version": env!("CARGO_PKG_VERSION"),
                "store": if store_ok { "ok" } else { "unavailable" },
                "timestamp": Utc::now().to_rfc3339(),
            })),
        )
    }

    async fn ready_handler() -> Json<Value> {
        Json(json!({
            "status": "ready",
            "timestamp": Utc::now().to_rfc3339()
        }))
    }
}
