// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Node configuration
//!
//! All settings come from environment variables (a `.env` file is honoured
//! by the binaries). Unset or unparsable values fall back to the defaults.

use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Default weights location inside the container image
pub const DEFAULT_MODEL_PATH: &str = "/app/weights/best.pt";

/// Default detection confidence threshold
pub const DEFAULT_CONF_THRESH: f32 = 0.20;

/// Default IoU threshold for non-maximum suppression
pub const DEFAULT_IOU_THRESH: f32 = 0.45;

/// Default square model input size (YOLOv8 exports use 640)
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default remote image fetch timeout
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Maximum image size (10MB)
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Configuration for the crowd counting node
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Path to the detector weights (`MODEL_PATH`)
    pub model_path: PathBuf,
    /// Default confidence threshold when a request does not set one (`CONF_THRESH`)
    pub conf_thresh: f32,
    /// IoU threshold for non-maximum suppression (`IOU_THRESH`)
    pub iou_thresh: f32,
    /// Square letterbox size fed to the model (`MODEL_INPUT_SIZE`)
    pub input_size: u32,
    /// Bind host (`API_HOST`)
    pub api_host: String,
    /// Bind port (`API_PORT`)
    pub api_port: u16,
    /// Timeout for `image_url` fetches in seconds (`FETCH_TIMEOUT_SECS`)
    pub fetch_timeout_secs: u64,
    /// Cap on uploaded, fetched or inline image bytes (`MAX_IMAGE_BYTES`)
    pub max_image_bytes: usize,
    /// Parent directory for per-request staging dirs (`STAGING_DIR`)
    pub staging_dir: Option<PathBuf>,
    /// ONNX Runtime intra-op threads (`INFERENCE_THREADS`)
    pub inference_threads: usize,
}

impl NodeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model_path: env::var("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            conf_thresh: parse_env("CONF_THRESH").unwrap_or(defaults.conf_thresh),
            iou_thresh: parse_env("IOU_THRESH").unwrap_or(defaults.iou_thresh),
            input_size: parse_env("MODEL_INPUT_SIZE").unwrap_or(defaults.input_size),
            api_host: env::var("API_HOST").unwrap_or(defaults.api_host),
            api_port: parse_env("API_PORT").unwrap_or(defaults.api_port),
            fetch_timeout_secs: parse_env("FETCH_TIMEOUT_SECS")
                .unwrap_or(defaults.fetch_timeout_secs),
            max_image_bytes: parse_env("MAX_IMAGE_BYTES").unwrap_or(defaults.max_image_bytes),
            staging_dir: env::var("STAGING_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            inference_threads: parse_env("INFERENCE_THREADS")
                .unwrap_or(defaults.inference_threads)
                .max(1),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.conf_thresh) {
            return Err(format!(
                "conf_thresh must be within [0, 1], got {}",
                self.conf_thresh
            ));
        }
        if !(0.0..=1.0).contains(&self.iou_thresh) {
            return Err(format!(
                "iou_thresh must be within [0, 1], got {}",
                self.iou_thresh
            ));
        }
        if self.input_size == 0 || self.input_size % 32 != 0 {
            return Err(format!(
                "input_size must be a positive multiple of 32, got {}",
                self.input_size
            ));
        }
        if self.fetch_timeout_secs == 0 {
            return Err("fetch_timeout_secs must be at least 1".to_string());
        }
        if self.max_image_bytes == 0 {
            return Err("max_image_bytes must be at least 1".to_string());
        }
        Ok(())
    }

    /// File name of the configured weights, reported as the model identifier
    pub fn model_name(&self) -> String {
        model_file_name(&self.model_path)
    }

    /// Socket address the HTTP server binds to
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.api_host, self.api_port).parse()
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            conf_thresh: DEFAULT_CONF_THRESH,
            iou_thresh: DEFAULT_IOU_THRESH,
            input_size: DEFAULT_INPUT_SIZE,
            api_host: "0.0.0.0".to_string(),
            api_port: 8000,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            staging_dir: None,
            inference_threads: 4,
        }
    }
}

/// File name component of a weights path, falling back to the full path
pub fn model_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
