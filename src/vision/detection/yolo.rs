// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX Runtime YOLO detector
//!
//! Runs an ONNX export of YOLOv8-family weights. The session is created once
//! (CUDA first, CPU fallback) and validated with a warm-up inference on a
//! blank frame, which also reveals the class count of the head.
//!
//! ONNX Runtime sessions need exclusive access to run, so concurrent
//! requests are serialized on a mutex around the session.

use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::postprocess::{class_count_from_shape, decode_output, preprocess};
use super::types::{DetectOptions, Detection, Detector};

/// Settings for building a [`YoloDetector`]
#[derive(Debug, Clone)]
pub struct YoloConfig {
    /// Square input size the model was exported with
    pub input_size: u32,
    /// IoU threshold for non-maximum suppression
    pub iou_threshold: f32,
    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,
}

impl Default for YoloConfig {
    fn default() -> Self {
        Self {
            input_size: 640,
            iou_threshold: 0.45,
            intra_threads: 4,
        }
    }
}

/// YOLO detector backed by an ONNX Runtime session
pub struct YoloDetector {
    session: Mutex<Session>,
    weights_path: PathBuf,
    provider: &'static str,
    num_classes: usize,
    config: YoloConfig,
}

impl std::fmt::Debug for YoloDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloDetector")
            .field("weights_path", &self.weights_path)
            .field("provider", &self.provider)
            .field("num_classes", &self.num_classes)
            .finish_non_exhaustive()
    }
}

impl YoloDetector {
    /// Load the detector from a weights path
    ///
    /// A `.pt` checkpoint cannot be executed by ONNX Runtime; when one is
    /// configured the sibling `.onnx` export is loaded instead.
    ///
    /// # Errors
    /// Returns error if:
    /// - No loadable ONNX file exists for the path
    /// - ONNX Runtime cannot build a session from it
    /// - The warm-up inference fails or yields an unexpected output shape
    pub fn load(weights_path: &Path, config: YoloConfig) -> Result<Self> {
        let weights_path = resolve_weights_path(weights_path)?;
        info!("Loading YOLO weights from {}", weights_path.display());

        let (mut session, provider) = build_session(&weights_path, &config)?;

        // Warm-up run on a blank frame validates the graph and reveals nc
        let num_classes = {
            let blank = DynamicImage::new_rgb8(config.input_size, config.input_size);
            let (input, _) = preprocess(&blank, config.input_size);
            let outputs = session
                .run(ort::inputs![Value::from_array(input)?])
                .context("Warm-up inference failed")?;
            let output = outputs[0]
                .try_extract_array::<f32>()
                .context("Failed to extract output tensor")?;
            class_count_from_shape(output.shape())?
        };

        info!(
            "YOLO detector ready: {} classes, input {}x{}, provider {}",
            num_classes, config.input_size, config.input_size, provider
        );

        Ok(Self {
            session: Mutex::new(session),
            weights_path,
            provider,
            num_classes,
            config,
        })
    }

    pub fn weights_path(&self) -> &Path {
        &self.weights_path
    }
}

impl Detector for YoloDetector {
    fn detect(&self, image: &DynamicImage, options: &DetectOptions) -> Result<Vec<Detection>> {
        let (input, letterbox) = preprocess(image, self.config.input_size);

        let output = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| anyhow!("Detector session lock poisoned"))?;
            let outputs = session.run(ort::inputs![Value::from_array(input)?])?;
            let view = outputs[0]
                .try_extract_array::<f32>()
                .context("Failed to extract output tensor")?;
            view.to_owned()
        };

        let detections = decode_output(
            output.view(),
            &letterbox,
            options,
            self.config.iou_threshold,
        )?;
        debug!(
            "YOLO produced {} detections (conf >= {})",
            detections.len(),
            options.confidence
        );
        Ok(detections)
    }

    fn provider(&self) -> &str {
        self.provider
    }

    fn class_count(&self) -> Option<usize> {
        Some(self.num_classes)
    }
}

/// Resolve the file ONNX Runtime should load for a configured weights path
pub fn resolve_weights_path(path: &Path) -> Result<PathBuf> {
    let is_onnx = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("onnx"))
        .unwrap_or(false);

    if is_onnx {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        anyhow::bail!("ONNX model file not found: {}", path.display());
    }

    let sibling = path.with_extension("onnx");
    if sibling.is_file() {
        debug!(
            "Using ONNX export {} for configured weights {}",
            sibling.display(),
            path.display()
        );
        return Ok(sibling);
    }

    anyhow::bail!(
        "No ONNX export found for weights {} (expected {})",
        path.display(),
        sibling.display()
    )
}

fn build_session(path: &Path, config: &YoloConfig) -> Result<(Session, &'static str)> {
    let threads = config.intra_threads.max(1);

    // Registration errors surface here instead of silently running on CPU
    info!("   Attempting CUDA execution provider...");
    let cuda_result = Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CUDAExecutionProvider::default()
            .build()
            .error_on_failure()])
        .context("Failed to set CUDA execution provider")
        .and_then(|builder| {
            builder
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .context("Failed to set optimization level")
        })
        .and_then(|builder| {
            builder
                .with_intra_threads(threads)
                .context("Failed to set intra threads")
        })
        .and_then(|builder| builder.commit_from_file(path).context("Failed to load model"));

    match cuda_result {
        Ok(session) => {
            info!("✅ CUDA is available. Using GPU.");
            return Ok((session, "cuda"));
        }
        Err(e) => {
            warn!("⚠️  CUDA execution provider failed: {:#}", e);
            warn!("   CUDA is not available. Using CPU.");
        }
    }

    let session = Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .context("Failed to set CPU execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(threads)
        .context("Failed to set intra threads")?
        .commit_from_file(path)
        .with_context(|| format!("Failed to load ONNX model from {}", path.display()))?;

    Ok((session, "cpu"))
}
