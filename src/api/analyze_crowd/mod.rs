// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Legacy crowd analysis endpoint
//!
//! `POST /analyze_crowd` keeps the response shape older clients expect:
//! `{"person_count": n}` on success and a bare `{"error": "..."}` otherwise.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info_span, warn, Instrument};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::http_server::AppState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeCrowdRequest {
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyzeCrowdResponse {
    pub person_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LegacyErrorResponse {
    pub error: String,
}

/// POST /analyze_crowd - Count people in a base64 image
///
/// Counts person detections among every class the model returns, using the
/// configured confidence threshold rather than the model's built-in default.
/// Undecodable base64 is a 400 "Could not decode image", not a generic 500.
pub async fn analyze_crowd_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let span = info_span!("analyze_crowd", request_id = %request_id);

    async move {
        let result = match parse_body(&body) {
            // Model availability is reported before payload problems
            Ok(request) => state.service.analyze_inline(request.image).await,
            Err(e) if state.service.handle().is_loaded() => Err(e),
            Err(_) => state.service.analyze_inline(None).await,
        };

        match result {
            Ok(person_count) => Json(AnalyzeCrowdResponse { person_count }).into_response(),
            Err(e) => {
                let (status, message) = legacy_error(&e);
                if status.is_client_error() {
                    warn!("Crowd analysis rejected: {}", e);
                } else {
                    error!("Error during crowd analysis: {}", e);
                }
                (status, Json(LegacyErrorResponse { error: message })).into_response()
            }
        }
    }
    .instrument(span)
    .await
}

fn parse_body(body: &[u8]) -> Result<AnalyzeCrowdRequest, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid JSON body: {}", e)))
}

fn legacy_error(error: &ApiError) -> (StatusCode, String) {
    match error {
        ApiError::ModelUnavailable(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Model not loaded".to_string()),
        ApiError::MissingInput(_) => (StatusCode::BAD_REQUEST, "No image data provided".to_string()),
        ApiError::DecodeFailed(_) => (StatusCode::BAD_REQUEST, "Could not decode image".to_string()),
        other => (other.status_code(), other.message()),
    }
}
