// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLO pre- and post-processing
//!
//! Preprocessing letterboxes the image into a square `[1, 3, S, S]` tensor
//! (RGB, 0..1, grey 114 padding, centered). Post-processing decodes the raw
//! `[1, 4 + nc, anchors]` head output (cx, cy, w, h followed by per-class
//! scores), keeps candidates whose best class score clears the confidence
//! threshold, applies class-aware NMS and maps boxes back to source pixels.

use anyhow::{bail, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::{Array4, ArrayViewD, Axis, Ix2};

use super::types::{BoundingBox, DetectOptions, Detection};

const BOX_ATTRS: usize = 4;
const PAD_VALUE: f32 = 114.0 / 255.0;

/// Geometry of a letterbox transform, used to undo it on predicted boxes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub source_width: u32,
    pub source_height: u32,
}

impl Letterbox {
    pub fn for_image(source_width: u32, source_height: u32, input_size: u32) -> Self {
        let size = input_size as f32;
        let scale = (size / source_width.max(1) as f32).min(size / source_height.max(1) as f32);
        let new_w = (source_width as f32 * scale).round();
        let new_h = (source_height as f32 * scale).round();
        Self {
            scale,
            pad_x: ((size - new_w) / 2.0).floor(),
            pad_y: ((size - new_h) / 2.0).floor(),
            source_width,
            source_height,
        }
    }

    fn resized_dims(&self) -> (u32, u32) {
        (
            ((self.source_width as f32 * self.scale).round() as u32).max(1),
            ((self.source_height as f32 * self.scale).round() as u32).max(1),
        )
    }

    /// Map a model-space center box to a clamped source-space box
    pub fn unmap(&self, cx: f32, cy: f32, w: f32, h: f32) -> BoundingBox {
        let max_x = self.source_width as f32;
        let max_y = self.source_height as f32;
        let x1 = ((cx - w / 2.0 - self.pad_x) / self.scale).clamp(0.0, max_x);
        let y1 = ((cy - h / 2.0 - self.pad_y) / self.scale).clamp(0.0, max_y);
        let x2 = ((cx + w / 2.0 - self.pad_x) / self.scale).clamp(0.0, max_x);
        let y2 = ((cy + h / 2.0 - self.pad_y) / self.scale).clamp(0.0, max_y);
        BoundingBox::new(x1, y1, x2 - x1, y2 - y1)
    }
}

/// Letterbox an image into a normalized NCHW tensor
pub fn preprocess(image: &DynamicImage, input_size: u32) -> (Array4<f32>, Letterbox) {
    let (w0, h0) = image.dimensions();
    let letterbox = Letterbox::for_image(w0, h0, input_size);
    let (new_w, new_h) = letterbox.resized_dims();
    let resized = image.resize_exact(new_w, new_h, FilterType::Triangle).to_rgb8();

    let size = input_size as usize;
    let mut input = Array4::<f32>::from_elem((1, 3, size, size), PAD_VALUE);
    let (off_x, off_y) = (letterbox.pad_x as usize, letterbox.pad_y as usize);
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize + off_x, y as usize + off_y);
        if x >= size || y >= size {
            continue;
        }
        let [r, g, b] = pixel.0;
        input[[0, 0, y, x]] = r as f32 / 255.0;
        input[[0, 1, y, x]] = g as f32 / 255.0;
        input[[0, 2, y, x]] = b as f32 / 255.0;
    }

    (input, letterbox)
}

/// Number of classes encoded in a raw head output shape
pub fn class_count_from_shape(shape: &[usize]) -> Result<usize> {
    if shape.len() != 3 || shape[0] != 1 {
        bail!("unexpected detector output shape {:?} (expected [1, 4 + nc, anchors])", shape);
    }
    let attrs = shape[1].min(shape[2]);
    if attrs <= BOX_ATTRS {
        bail!("detector output shape {:?} carries no class scores", shape);
    }
    Ok(attrs - BOX_ATTRS)
}

/// Decode the raw head output into filtered, suppressed detections
pub fn decode_output(
    output: ArrayViewD<'_, f32>,
    letterbox: &Letterbox,
    options: &DetectOptions,
    iou_threshold: f32,
) -> Result<Vec<Detection>> {
    let shape = output.shape().to_vec();
    let num_classes = class_count_from_shape(&shape)?;

    // YOLOv8 exports are [1, attrs, anchors]; some exporters transpose to [1, anchors, attrs]
    let preds = output.index_axis(Axis(0), 0).into_dimensionality::<Ix2>()?;
    let preds = if shape[1] > shape[2] {
        preds.reversed_axes()
    } else {
        preds
    };

    let mut candidates = Vec::new();
    for anchor in preds.axis_iter(Axis(1)) {
        let mut class_id = 0;
        let mut confidence = f32::NEG_INFINITY;
        for c in 0..num_classes {
            let score = anchor[BOX_ATTRS + c];
            if score > confidence {
                confidence = score;
                class_id = c;
            }
        }

        if confidence < options.confidence || !options.allows(class_id) {
            continue;
        }

        let bbox = letterbox.unmap(anchor[0], anchor[1], anchor[2], anchor[3]);
        if bbox.area() <= 0.0 {
            continue;
        }
        candidates.push(Detection {
            class_id,
            confidence,
            bbox,
        });
    }

    non_max_suppression(&mut candidates, iou_threshold);
    Ok(candidates)
}

/// Class-aware greedy NMS, keeps survivors sorted by descending confidence
pub fn non_max_suppression(detections: &mut Vec<Detection>, iou_threshold: f32) {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept = 0;
    for index in 0..detections.len() {
        let suppressed = (0..kept).any(|prev| {
            detections[prev].class_id == detections[index].class_id
                && detections[prev].bbox.iou(&detections[index].bbox) > iou_threshold
        });
        if !suppressed {
            detections.swap(kept, index);
            kept += 1;
        }
    }
    detections.truncate(kept);
}
