// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing for crowd counting
//!
//! This module provides:
//! - Image decoding with format sniffing and size caps
//! - YOLO person detection via ONNX Runtime (CUDA when available, else CPU)
//! - Person counting and the process-wide detector handle

pub mod counter;
pub mod detection;
pub mod image_utils;
pub mod model_manager;

pub use counter::{count_people, CountScope, PersonCount};
pub use detection::{BoundingBox, DetectOptions, Detection, Detector, PERSON_CLASS_ID};
pub use image_utils::{
    decode_base64_image, decode_image_bytes, decode_image_file, detect_format, ImageError,
    ImageInfo,
};
pub use model_manager::{DetectorHandle, DetectorState};
