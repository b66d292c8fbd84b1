// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::source::FetchError;
use crate::vision::ImageError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub error_type: String,
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    MissingInput(String),
    InvalidRequest(String),
    ValidationError { field: String, message: String },
    SourceFetchFailed(String),
    DecodeFailed(String),
    ModelUnavailable(String),
    DetectionFailed(String),
}

impl ApiError {
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::MissingInput(_) => "missing_input",
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::ValidationError { .. } => "validation_error",
            ApiError::SourceFetchFailed(_) => "source_fetch_failed",
            ApiError::DecodeFailed(_) => "decode_failed",
            ApiError::ModelUnavailable(_) => "model_unavailable",
            ApiError::DetectionFailed(_) => "detection_failed",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::MissingInput(msg)
            | ApiError::InvalidRequest(msg)
            | ApiError::SourceFetchFailed(msg)
            | ApiError::DecodeFailed(msg)
            | ApiError::ModelUnavailable(msg)
            | ApiError::DetectionFailed(msg) => msg.clone(),
            ApiError::ValidationError { field, message } => format!("{}: {}", field, message),
        }
    }

    pub fn to_response(&self, request_id: Option<String>) -> ErrorResponse {
        let details = match self {
            ApiError::ValidationError { field, .. } => {
                let mut details = HashMap::new();
                details.insert(
                    "field".to_string(),
                    serde_json::Value::String(field.clone()),
                );
                Some(details)
            }
            _ => None,
        };

        ErrorResponse {
            error: self.message(),
            error_type: self.error_type().to_string(),
            request_id,
            details,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingInput(_)
            | ApiError::InvalidRequest(_)
            | ApiError::ValidationError { .. }
            | ApiError::SourceFetchFailed(_)
            | ApiError::DecodeFailed(_) => StatusCode::BAD_REQUEST,
            ApiError::ModelUnavailable(_) | ApiError::DetectionFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the failure was caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::MissingInput(msg) => write!(f, "Missing input: {}", msg),
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::ValidationError { field, message } => {
                write!(f, "Validation error for {}: {}", field, message)
            }
            ApiError::SourceFetchFailed(msg) => write!(f, "Source fetch failed: {}", msg),
            ApiError::DecodeFailed(msg) => write!(f, "Decode failed: {}", msg),
            ApiError::ModelUnavailable(msg) => write!(f, "Model unavailable: {}", msg),
            ApiError::DetectionFailed(msg) => write!(f, "Detection failed: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<ImageError> for ApiError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::TooLarge(..) => ApiError::InvalidRequest(err.to_string()),
            ImageError::Io(_) => ApiError::DetectionFailed(err.to_string()),
            _ => ApiError::DecodeFailed(err.to_string()),
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        if err.is_source_error() {
            ApiError::SourceFetchFailed(err.to_string())
        } else {
            ApiError::DetectionFailed(err.to_string())
        }
    }
}

/// Error response wrapper carrying the request id into the body
#[derive(Debug)]
pub struct ApiErrorResponse {
    pub error: ApiError,
    pub request_id: String,
}

impl ApiErrorResponse {
    pub fn new(error: ApiError, request_id: impl Into<String>) -> Self {
        Self {
            error,
            request_id: request_id.into(),
        }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let body = self.error.to_response(Some(self.request_id));
        (status, Json(body)).into_response()
    }
}
