// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detector handle built once at startup

use std::sync::Arc;

use crate::config::NodeConfig;
use crate::vision::detection::{Detector, YoloConfig, YoloDetector};

/// Load outcome of the detector
#[derive(Clone)]
pub enum DetectorState {
    /// Weights loaded and validated
    Loaded(Arc<dyn Detector>),
    /// Loading failed; detection requests fail fast with the recorded reason
    LoadFailed(String),
}

impl std::fmt::Debug for DetectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorState::Loaded(detector) => f
                .debug_tuple("Loaded")
                .field(&detector.provider())
                .finish(),
            DetectorState::LoadFailed(reason) => f.debug_tuple("LoadFailed").field(reason).finish(),
        }
    }
}

/// Process-wide handle to the detector
///
/// Constructed once and never mutated afterwards. A failed load does not
/// stop the node: `/health` keeps answering and detection routes report
/// the model as unavailable.
#[derive(Debug, Clone)]
pub struct DetectorHandle {
    model_name: String,
    state: DetectorState,
}

impl DetectorHandle {
    /// Load the configured weights
    ///
    /// Never fails; a load error is logged and recorded in the handle.
    pub fn load(config: &NodeConfig) -> Self {
        let model_name = config.model_name();
        let yolo_config = YoloConfig {
            input_size: config.input_size,
            iou_threshold: config.iou_thresh,
            intra_threads: config.inference_threads,
        };

        match YoloDetector::load(&config.model_path, yolo_config) {
            Ok(detector) => {
                tracing::info!(
                    "✅ Detector loaded: {} (provider: {})",
                    model_name,
                    detector.provider()
                );
                Self::loaded(model_name, Arc::new(detector))
            }
            Err(e) => {
                tracing::error!(
                    "❌ Failed to load detector from {}: {:#}",
                    config.model_path.display(),
                    e
                );
                tracing::warn!("⚠️ Detection routes disabled, /health stays up");
                Self::failed(model_name, format!("{:#}", e))
            }
        }
    }

    /// Handle around an already constructed detector
    pub fn loaded(model_name: impl Into<String>, detector: Arc<dyn Detector>) -> Self {
        Self {
            model_name: model_name.into(),
            state: DetectorState::Loaded(detector),
        }
    }

    /// Handle recording a load failure
    pub fn failed(model_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            state: DetectorState::LoadFailed(reason.into()),
        }
    }

    pub fn detector(&self) -> Option<Arc<dyn Detector>> {
        match &self.state {
            DetectorState::Loaded(detector) => Some(Arc::clone(detector)),
            DetectorState::LoadFailed(_) => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, DetectorState::Loaded(_))
    }

    /// Reason recorded when loading failed
    pub fn load_error(&self) -> Option<&str> {
        match &self.state {
            DetectorState::Loaded(_) => None,
            DetectorState::LoadFailed(reason) => Some(reason),
        }
    }

    /// File name of the configured weights
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }
}
