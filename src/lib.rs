// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod congestion;
pub mod service;
pub mod source;
pub mod version;
pub mod vision;

pub use api::{create_app, AppState, ApiError};
pub use config::NodeConfig;
pub use congestion::{CongestionLevel, CongestionThresholds};
pub use service::{CrowdService, DetectionRequest, DetectionResult};
pub use vision::{Detector, DetectorHandle};
