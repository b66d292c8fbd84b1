// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection types and the `Detector` seam

use anyhow::Result;
use image::DynamicImage;

/// Class index of "person" in COCO-style label sets
pub const PERSON_CLASS_ID: usize = 0;

/// Axis-aligned box in source image pixels (top-left origin)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);
        (right - left).max(0.0) * (bottom - top).max(0.0)
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// One detected region
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn is_person(&self) -> bool {
        self.class_id == PERSON_CLASS_ID
    }
}

/// Per-call detection options
#[derive(Debug, Clone, PartialEq)]
pub struct DetectOptions {
    /// Minimum best-class score for a candidate to survive
    pub confidence: f32,
    /// Restrict results to these class ids (`None` keeps every class)
    pub classes: Option<Vec<usize>>,
}

impl DetectOptions {
    pub fn new(confidence: f32) -> Self {
        Self {
            confidence,
            classes: None,
        }
    }

    pub fn with_classes(mut self, classes: Vec<usize>) -> Self {
        self.classes = Some(classes);
        self
    }

    pub fn allows(&self, class_id: usize) -> bool {
        self.classes
            .as_ref()
            .map(|classes| classes.contains(&class_id))
            .unwrap_or(true)
    }
}

/// An object detector shared read-only across requests
///
/// Implementations must be callable from several threads at once, either by
/// being reentrant or by serializing internally.
pub trait Detector: Send + Sync {
    /// Run detection on a decoded image
    fn detect(&self, image: &DynamicImage, options: &DetectOptions) -> Result<Vec<Detection>>;

    /// Execution provider in use (e.g. "cuda", "cpu")
    fn provider(&self) -> &str {
        "cpu"
    }

    /// Number of classes the model predicts, when known
    fn class_count(&self) -> Option<usize> {
        None
    }
}
