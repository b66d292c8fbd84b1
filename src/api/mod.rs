// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod analyze_crowd;
pub mod errors;
pub mod http_server;
pub mod predict;

pub use analyze_crowd::{analyze_crowd_handler, AnalyzeCrowdRequest, AnalyzeCrowdResponse};
pub use errors::{ApiError, ApiErrorResponse, ErrorResponse};
pub use http_server::{create_app, start_server, AppState, HealthResponse};
pub use predict::{predict_handler, PredictJsonRequest, PredictResponse};
