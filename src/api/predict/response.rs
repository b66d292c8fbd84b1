// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Predict response types

use serde::{Deserialize, Serialize};

use crate::congestion::CongestionLevel;
use crate::service::DetectionResult;

/// Response from `POST /predict`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PredictResponse {
    /// Completion time (RFC 3339, UTC)
    pub timestamp: String,
    /// `upload:<filename>`, `url:<url>` or `inline:base64`
    pub source: String,
    pub beach_name: Option<String>,
    pub person_count: usize,
    /// Present only when `t1`, `t2` and `t3` were all supplied
    pub congestion: Option<CongestionLevel>,
    /// Confidence threshold actually used
    pub conf: f32,
    /// Weights file name
    pub model: String,
}

impl From<DetectionResult> for PredictResponse {
    fn from(result: DetectionResult) -> Self {
        Self {
            timestamp: result.timestamp.to_rfc3339(),
            source: result.source,
            beach_name: result.label_name,
            person_count: result.person_count,
            congestion: result.congestion,
            conf: result.confidence,
            model: result.model,
        }
    }
}
