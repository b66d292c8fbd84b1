// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Predict endpoint handler

use axum::{
    body::to_bytes,
    extract::{FromRequest, Request, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::Multipart;
use std::sync::Arc;
use tracing::{debug, error, info_span, warn, Instrument};
use uuid::Uuid;

use super::request::{non_empty, parse_field, PredictJsonRequest};
use super::response::PredictResponse;
use crate::api::errors::{ApiError, ApiErrorResponse};
use crate::api::http_server::{body_limit, AppState};
use crate::service::DetectionRequest;
use crate::source::{ImageSource, StagedUpload, StagingError};

/// POST /predict - Count people in an image
///
/// Accepts either a multipart form or a JSON body.
///
/// # Request
/// - `file`: Uploaded image (multipart only)
/// - `image_url`: Remote image to fetch
/// - `image`: Base64-encoded image (JSON only)
/// - `beachName`: Free-text label echoed back
/// - `t1`, `t2`, `t3`: Congestion thresholds (all three or none)
/// - `conf`: Confidence threshold override
///
/// Exactly one of `file`, `image_url` or `image` must be supplied.
///
/// # Errors
/// - 400 Bad Request: missing or duplicate source, invalid field, fetch or decode failure
/// - 500 Internal Server Error: model unavailable or inference failed
pub async fn predict_handler(State(state): State<Arc<AppState>>, req: Request) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let span = info_span!("predict", request_id = %request_id);

    async move {
        let outcome = match read_request(&state, req).await {
            Ok(request) => state.service.detect(request).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => Json(PredictResponse::from(result)).into_response(),
            Err(e) => {
                if e.is_client_error() {
                    warn!("Predict rejected: {}", e);
                } else {
                    error!("Predict failed: {}", e);
                }
                ApiErrorResponse::new(e, request_id).into_response()
            }
        }
    }
    .instrument(span)
    .await
}

async fn read_request(state: &Arc<AppState>, req: Request) -> Result<DetectionRequest, ApiError> {
    let is_multipart = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false);

    if is_multipart {
        let multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        read_multipart(state, multipart).await
    } else {
        read_json(state, req).await
    }
}

async fn read_json(state: &Arc<AppState>, req: Request) -> Result<DetectionRequest, ApiError> {
    let limit = body_limit(state.service.config().max_image_bytes);
    let body = to_bytes(req.into_body(), limit)
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Failed to read body: {}", e)))?;

    if body.iter().all(|b| b.is_ascii_whitespace()) {
        debug!("Predict request with empty body");
        return Ok(DetectionRequest::default());
    }

    let request: PredictJsonRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid JSON body: {}", e)))?;
    Ok(request.into_detection_request())
}

async fn read_multipart(
    state: &Arc<AppState>,
    mut multipart: Multipart,
) -> Result<DetectionRequest, ApiError> {
    let max_bytes = state.service.config().max_image_bytes;
    let mut request = DetectionRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field
                    .file_name()
                    .filter(|f| !f.is_empty())
                    .unwrap_or("upload")
                    .to_string();
                let staging = state.service.new_staging_area()?;
                let path = staging
                    .stage_stream(&filename, field, max_bytes)
                    .await
                    .map_err(|e| match e {
                        StagingError::Io(_) => ApiError::DetectionFailed(e.to_string()),
                        _ => ApiError::InvalidRequest(format!("Upload failed: {}", e)),
                    })?;
                debug!("Upload '{}' staged at {}", filename, path.display());
                request.sources.push(ImageSource::Upload(StagedUpload {
                    filename,
                    path,
                    staging,
                }));
            }
            "image_url" | "imageUrl" => {
                if let Some(url) = non_empty(Some(read_text(field, &name).await?)) {
                    request.sources.push(ImageSource::Remote(url.trim().to_string()));
                }
            }
            "beachName" | "beach_name" => {
                request.label_name = Some(read_text(field, &name).await?);
            }
            "t1" => request.t1 = parse_field("t1", &read_text(field, &name).await?)?,
            "t2" => request.t2 = parse_field("t2", &read_text(field, &name).await?)?,
            "t3" => request.t3 = parse_field("t3", &read_text(field, &name).await?)?,
            "conf" => request.confidence = parse_field("conf", &read_text(field, &name).await?)?,
            other => debug!("Ignoring multipart field '{}'", other),
        }
    }

    Ok(request)
}

async fn read_text(field: axum_extra::extract::multipart::Field, name: &str) -> Result<String, ApiError> {
    field.text().await.map_err(|e| ApiError::ValidationError {
        field: name.to_string(),
        message: e.to_string(),
    })
}
