// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Remote image fetching
//!
//! Downloads `image_url` sources into a request's staging area with a
//! bounded timeout and a size cap enforced while streaming.

use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use super::staging::{StagingArea, StagingError};

/// Remote fetch error types
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL could not be parsed or uses a scheme other than http/https
    #[error("Invalid image URL: {0}")]
    InvalidUrl(String),

    /// Request timed out
    #[error("Timeout fetching: {0}")]
    Timeout(String),

    /// Connection or protocol failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-success status
    #[error("HTTP {0} for: {1}")]
    HttpStatus(u16, String),

    /// Body exceeded the size cap
    #[error("Image at {0} exceeds the {1} byte limit")]
    TooLarge(String, usize),

    /// Local staging failed
    #[error(transparent)]
    Staging(StagingError),
}

impl FetchError {
    /// Whether the failure is attributable to the remote source
    pub fn is_source_error(&self) -> bool {
        !matches!(self, FetchError::Staging(_))
    }
}

/// HTTP client for image URLs
#[derive(Debug, Clone)]
pub struct RemoteImageFetcher {
    client: Client,
    max_bytes: usize,
}

impl RemoteImageFetcher {
    pub fn new(timeout_secs: u64, max_bytes: usize) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("crowd-count-node/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::Http(e.to_string()))?;

        Ok(Self { client, max_bytes })
    }

    /// Validate that `url` is an absolute http(s) URL
    pub fn parse_url(url: &str) -> Result<Url, FetchError> {
        let parsed = Url::parse(url.trim()).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;
        if !["http", "https"].contains(&parsed.scheme()) {
            return Err(FetchError::InvalidUrl(format!(
                "{}: unsupported scheme '{}'",
                url,
                parsed.scheme()
            )));
        }
        Ok(parsed)
    }

    /// Download `url` into a new file inside `staging`
    pub async fn fetch_into(&self, url: &str, staging: &StagingArea) -> Result<PathBuf, FetchError> {
        let parsed = Self::parse_url(url)?;
        debug!("Fetching image from: {}", parsed);

        let response = self.client.get(parsed.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(url.to_string())
            } else {
                FetchError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16(), url.to_string()));
        }

        if let Some(len) = response.content_length() {
            if len > self.max_bytes as u64 {
                return Err(FetchError::TooLarge(url.to_string(), self.max_bytes));
            }
        }

        let name_hint = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string();

        let path = staging
            .stage_stream(&name_hint, response.bytes_stream(), self.max_bytes)
            .await
            .map_err(|e| match e {
                StagingError::TooLarge(limit) => FetchError::TooLarge(url.to_string(), limit),
                StagingError::Stream(msg) => FetchError::Http(msg),
                other => FetchError::Staging(other),
            })?;

        info!("Fetched image from: {}", url);
        Ok(path)
    }
}
