// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{DefaultBodyLimit, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::analyze_crowd::analyze_crowd_handler;
use super::predict::predict_handler;
use crate::config::NodeConfig;
use crate::service::CrowdService;
use crate::vision::DetectorHandle;

/// Multipart framing and form fields on top of the image itself
const BODY_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared state for the HTTP routes
pub struct AppState {
    pub service: Arc<CrowdService>,
}

impl AppState {
    pub fn new(config: NodeConfig, handle: Arc<DetectorHandle>) -> anyhow::Result<Self> {
        Ok(Self {
            service: Arc::new(CrowdService::new(config, handle)?),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub conf: f32,
    pub model_loaded: bool,
}

/// Largest request body accepted, sized for a base64-inflated image
pub fn body_limit(max_image_bytes: usize) -> usize {
    (max_image_bytes.saturating_mul(4) / 3).saturating_add(BODY_OVERHEAD_BYTES)
}

pub fn create_app(state: Arc<AppState>) -> Router {
    let limit = body_limit(state.service.config().max_image_bytes);

    Router::new()
        .route("/health", get(health_handler))
        .route("/predict", post(predict_handler))
        .route("/analyze_crowd", post(analyze_crowd_handler))
        .layer(DefaultBodyLimit::max(limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = state.service.config().bind_addr()?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let service = &state.service;
    Json(HealthResponse {
        status: "ok".to_string(),
        model: service.handle().model_name().to_string(),
        conf: service.config().conf_thresh,
        model_loaded: service.handle().is_loaded(),
    })
}
