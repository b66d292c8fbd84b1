// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Predict request types and field parsing

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::errors::ApiError;
use crate::service::DetectionRequest;
use crate::source::ImageSource;

/// JSON body accepted by `POST /predict`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictJsonRequest {
    /// Base64-encoded image data
    #[serde(default)]
    pub image: Option<String>,

    /// Remote image to fetch
    #[serde(default, alias = "imageUrl")]
    pub image_url: Option<String>,

    /// Free-text label echoed back in the response
    #[serde(default, rename = "beachName", alias = "beach_name")]
    pub beach_name: Option<String>,

    #[serde(default)]
    pub t1: Option<i64>,
    #[serde(default)]
    pub t2: Option<i64>,
    #[serde(default)]
    pub t3: Option<i64>,

    /// Confidence threshold override
    #[serde(default)]
    pub conf: Option<f32>,
}

impl PredictJsonRequest {
    pub fn into_detection_request(self) -> DetectionRequest {
        let mut sources = Vec::new();
        if let Some(image) = non_empty(self.image) {
            sources.push(ImageSource::Inline(image));
        }
        if let Some(url) = non_empty(self.image_url) {
            sources.push(ImageSource::Remote(url));
        }

        DetectionRequest {
            sources,
            confidence: self.conf,
            label_name: self.beach_name,
            t1: self.t1,
            t2: self.t2,
            t3: self.t3,
        }
    }
}

/// Treat blank strings as absent
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse an optional form field; blank means absent
pub fn parse_field<T: FromStr>(field: &str, value: &str) -> Result<Option<T>, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|_| ApiError::ValidationError {
            field: field.to_string(),
            message: format!("invalid value '{}'", trimmed),
        })
}
