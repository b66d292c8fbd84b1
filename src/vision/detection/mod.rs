// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Object detection
//!
//! - `types`: boxes, detections and the `Detector` trait
//! - `postprocess`: letterbox preprocessing and YOLO output decoding
//! - `yolo`: ONNX Runtime backed detector

pub mod postprocess;
pub mod types;
pub mod yolo;

pub use postprocess::{decode_output, non_max_suppression, preprocess, Letterbox};
pub use types::{BoundingBox, DetectOptions, Detection, Detector, PERSON_CLASS_ID};
pub use yolo::{resolve_weights_path, YoloConfig, YoloDetector};
