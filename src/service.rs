// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Crowd counting pipeline shared by the HTTP routes and the CLI
//!
//! A request carries its image sources and options; the service checks them,
//! materializes the image (staging uploads and remote fetches in a per-request
//! temp dir), runs detection on the blocking pool and assembles the result.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::config::NodeConfig;
use crate::congestion::{CongestionLevel, CongestionThresholds};
use crate::source::{ImageSource, RemoteImageFetcher, StagingArea};
use crate::vision::image_utils::format_to_extension;
use crate::vision::{
    count_people, decode_base64_image, decode_image_file, CountScope, Detector, DetectorHandle,
    PersonCount,
};

/// A detection request before validation
#[derive(Debug, Default)]
pub struct DetectionRequest {
    /// Every image source the caller supplied; exactly one is accepted
    pub sources: Vec<ImageSource>,
    pub confidence: Option<f32>,
    /// Free-text label echoed back as `beachName`
    pub label_name: Option<String>,
    pub t1: Option<i64>,
    pub t2: Option<i64>,
    pub t3: Option<i64>,
}

/// Outcome of a successful detection request
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub label_name: Option<String>,
    pub person_count: usize,
    pub congestion: Option<CongestionLevel>,
    pub confidence: f32,
    pub model: String,
}

/// Image ready to decode on the blocking pool
enum Materialized {
    Inline(String),
    File(PathBuf),
}

pub struct CrowdService {
    config: NodeConfig,
    handle: Arc<DetectorHandle>,
    fetcher: RemoteImageFetcher,
}

impl CrowdService {
    pub fn new(config: NodeConfig, handle: Arc<DetectorHandle>) -> anyhow::Result<Self> {
        let fetcher = RemoteImageFetcher::new(config.fetch_timeout_secs, config.max_image_bytes)?;
        Ok(Self {
            config,
            handle,
            fetcher,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn handle(&self) -> &DetectorHandle {
        &self.handle
    }

    /// Run the full detection pipeline for one request
    pub async fn detect(&self, mut request: DetectionRequest) -> Result<DetectionResult, ApiError> {
        let source = match request.sources.len() {
            0 => {
                return Err(ApiError::MissingInput(
                    "No image provided: supply file, image_url or image".to_string(),
                ))
            }
            1 => request.sources.remove(0),
            n => {
                return Err(ApiError::InvalidRequest(format!(
                    "Exactly one image source is allowed, got {}",
                    n
                )))
            }
        };

        let confidence = self.effective_confidence(request.confidence)?;
        let detector = self.detector()?;
        let descriptor = source.descriptor();
        debug!("Detection request: source={}, conf={}", descriptor, confidence);

        // Staging must outlive the blocking decode; it is dropped on return
        let (materialized, _staging) = self.materialize(source).await?;

        let max_bytes = self.config.max_image_bytes;
        let count = run_blocking(detector, move |detector| {
            let (image, info) = match &materialized {
                Materialized::Inline(payload) => decode_base64_image(payload, max_bytes)?,
                Materialized::File(path) => decode_image_file(path, max_bytes)?,
            };
            debug!(
                "Decoded {}x{} {} image ({} bytes)",
                info.width,
                info.height,
                format_to_extension(info.format),
                info.size_bytes
            );
            count_people(detector, &image, confidence, CountScope::PersonOnly)
                .map_err(|e| ApiError::DetectionFailed(format!("{:#}", e)))
        })
        .await?;

        let congestion = CongestionThresholds::from_parts(request.t1, request.t2, request.t3)
            .map(|thresholds| thresholds.classify(count.persons));

        info!(
            "Detected {} persons in {} (congestion: {})",
            count.persons,
            descriptor,
            congestion.map(|c| c.as_str()).unwrap_or("-")
        );

        Ok(DetectionResult {
            timestamp: Utc::now(),
            source: descriptor,
            label_name: request.label_name,
            person_count: count.persons,
            congestion,
            confidence,
            model: self.handle.model_name().to_string(),
        })
    }

    /// Count persons in a base64 image among all detected classes
    ///
    /// Serves the legacy `/analyze_crowd` route: the model is checked before
    /// the payload, and the configured confidence (`CONF_THRESH`) is always
    /// used in place of the model's own default.
    pub async fn analyze_inline(&self, image: Option<String>) -> Result<usize, ApiError> {
        let detector = self.detector()?;

        let payload = match image {
            Some(payload) if !payload.trim().is_empty() => payload,
            _ => return Err(ApiError::MissingInput("No image data provided".to_string())),
        };

        let confidence = self.config.conf_thresh;
        let max_bytes = self.config.max_image_bytes;
        let count = run_blocking(detector, move |detector| {
            let (image, _) = decode_base64_image(&payload, max_bytes)?;
            count_people(detector, &image, confidence, CountScope::AllClasses)
                .map_err(|e| ApiError::DetectionFailed(format!("{:#}", e)))
        })
        .await?;

        info!(
            "Legacy analysis: {} persons among {} detections",
            count.persons, count.total
        );
        Ok(count.persons)
    }

    fn detector(&self) -> Result<Arc<dyn Detector>, ApiError> {
        self.handle.detector().ok_or_else(|| {
            ApiError::ModelUnavailable(format!(
                "Model not loaded: {}",
                self.handle.load_error().unwrap_or("unknown error")
            ))
        })
    }

    fn effective_confidence(&self, requested: Option<f32>) -> Result<f32, ApiError> {
        match requested {
            None => Ok(self.config.conf_thresh),
            Some(conf) if (0.0..=1.0).contains(&conf) => Ok(conf),
            Some(conf) => Err(ApiError::ValidationError {
                field: "conf".to_string(),
                message: format!("must be within [0, 1], got {}", conf),
            }),
        }
    }

    async fn materialize(
        &self,
        source: ImageSource,
    ) -> Result<(Materialized, Option<StagingArea>), ApiError> {
        match source {
            ImageSource::Inline(payload) => Ok((Materialized::Inline(payload), None)),
            ImageSource::Upload(upload) => {
                Ok((Materialized::File(upload.path), Some(upload.staging)))
            }
            ImageSource::LocalFile(path) => Ok((Materialized::File(path), None)),
            ImageSource::Remote(url) => {
                let staging = self.new_staging_area()?;
                match self.fetcher.fetch_into(&url, &staging).await {
                    Ok(path) => Ok((Materialized::File(path), Some(staging))),
                    Err(e) => {
                        warn!("Image fetch failed for {}: {}", url, e);
                        Err(e.into())
                    }
                }
            }
        }
    }

    /// Fresh staging directory under the configured root
    pub fn new_staging_area(&self) -> Result<StagingArea, ApiError> {
        StagingArea::new(self.config.staging_dir.as_deref())
            .map_err(|e| ApiError::DetectionFailed(e.to_string()))
    }
}

async fn run_blocking<F>(detector: Arc<dyn Detector>, f: F) -> Result<PersonCount, ApiError>
where
    F: FnOnce(&dyn Detector) -> Result<PersonCount, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(detector.as_ref()))
        .await
        .map_err(|e| ApiError::DetectionFailed(format!("Detection task failed: {}", e)))?
}
