// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image sources for detection requests

pub mod fetcher;
pub mod staging;

pub use fetcher::{FetchError, RemoteImageFetcher};
pub use staging::{StagingArea, StagingError};

use std::path::PathBuf;

/// An upload already written to a request's staging area
///
/// Owns the staging directory so the file lives exactly as long as the
/// request that carries it.
#[derive(Debug)]
pub struct StagedUpload {
    pub filename: String,
    pub path: PathBuf,
    pub staging: StagingArea,
}

/// Where a request's image comes from
#[derive(Debug)]
pub enum ImageSource {
    /// Base64 payload from a JSON body
    Inline(String),
    /// Multipart file upload
    Upload(StagedUpload),
    /// `image_url` to fetch
    Remote(String),
    /// File on the local filesystem (CLI only)
    LocalFile(PathBuf),
}

impl ImageSource {
    /// Descriptor reported as `source` in results
    pub fn descriptor(&self) -> String {
        match self {
            ImageSource::Inline(_) => "inline:base64".to_string(),
            ImageSource::Upload(upload) => format!("upload:{}", upload.filename),
            ImageSource::Remote(url) => format!("url:{}", url),
            ImageSource::LocalFile(path) => format!("file:{}", path.display()),
        }
    }
}
