// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared helpers for integration tests

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use crowd_count_node::{
    api::http_server::AppState,
    config::NodeConfig,
    vision::{BoundingBox, DetectOptions, Detection, Detector, DetectorHandle},
};
use image::DynamicImage;
use std::path::Path;
use std::sync::Arc;

pub const BOUNDARY: &str = "crowd-test-boundary";

/// Returns a fixed number of persons plus some non-person detections
pub struct StubDetector {
    pub persons: usize,
    pub others: usize,
}

impl Detector for StubDetector {
    fn detect(&self, _image: &DynamicImage, options: &DetectOptions) -> anyhow::Result<Vec<Detection>> {
        Ok(stub_detections(self.persons, self.others, options))
    }
}

/// Reports one person per 10 pixels of image width
pub struct WidthDetector;

impl Detector for WidthDetector {
    fn detect(&self, image: &DynamicImage, options: &DetectOptions) -> anyhow::Result<Vec<Detection>> {
        Ok(stub_detections(image.width() as usize / 10, 1, options))
    }
}

/// Fails every inference with a fixed message
pub struct FailingDetector(pub &'static str);

impl Detector for FailingDetector {
    fn detect(&self, _image: &DynamicImage, _options: &DetectOptions) -> anyhow::Result<Vec<Detection>> {
        Err(anyhow::anyhow!(self.0))
    }
}

fn stub_detections(persons: usize, others: usize, options: &DetectOptions) -> Vec<Detection> {
    let person = Detection {
        class_id: 0,
        confidence: 0.9,
        bbox: BoundingBox::new(1.0, 1.0, 4.0, 8.0),
    };
    let other = Detection {
        class_id: 2,
        confidence: 0.8,
        bbox: BoundingBox::new(2.0, 2.0, 6.0, 3.0),
    };
    std::iter::repeat(person)
        .take(persons)
        .chain(std::iter::repeat(other).take(others))
        .filter(|d| options.allows(d.class_id) && d.confidence >= options.confidence)
        .collect()
}

pub fn test_config(staging_root: &Path) -> NodeConfig {
    NodeConfig {
        staging_dir: Some(staging_root.to_path_buf()),
        fetch_timeout_secs: 2,
        ..NodeConfig::default()
    }
}

pub fn state_with_detector(detector: Arc<dyn Detector>, staging_root: &Path) -> Arc<AppState> {
    let handle = DetectorHandle::loaded("best.pt", detector);
    Arc::new(AppState::new(test_config(staging_root), Arc::new(handle)).unwrap())
}

pub fn state_with_counts(persons: usize, others: usize, staging_root: &Path) -> Arc<AppState> {
    state_with_detector(Arc::new(StubDetector { persons, others }), staging_root)
}

pub fn state_without_model(staging_root: &Path) -> Arc<AppState> {
    let handle = DetectorHandle::failed("best.pt", "weights not found");
    Arc::new(AppState::new(test_config(staging_root), Arc::new(handle)).unwrap())
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

pub fn png_base64(width: u32, height: u32) -> String {
    STANDARD.encode(png_bytes(width, height))
}

/// Base64 split into 76-column CRLF lines, as MIME encoders emit it
pub fn png_base64_wrapped(width: u32, height: u32) -> String {
    png_base64(width, height)
        .as_bytes()
        .chunks(76)
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect::<Vec<_>>()
        .join("\r\n")
        + "\n"
}

/// Multipart form builder
#[derive(Default)]
pub struct Form {
    parts: Vec<(String, Option<String>, Vec<u8>)>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, filename: &str, content: &[u8]) -> Self {
        self.parts
            .push((name.to_string(), Some(filename.to_string()), content.to_vec()));
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.parts
            .push((name.to_string(), None, value.as_bytes().to_vec()));
        self
    }

    pub fn body(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, content) in &self.parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match filename {
                Some(filename) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                            name, filename
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
                }
                None => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    pub fn request(&self, uri: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(self.body()))
            .unwrap()
    }
}

pub fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Number of entries left under a staging root
pub fn staging_entries(root: &Path) -> usize {
    std::fs::read_dir(root).unwrap().count()
}
