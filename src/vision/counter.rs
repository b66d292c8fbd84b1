// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Person counting on top of a [`Detector`]

use anyhow::Result;
use image::DynamicImage;
use tracing::debug;

use super::detection::{DetectOptions, Detector, PERSON_CLASS_ID};

/// Which classes the detector is asked for before counting persons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountScope {
    /// Restrict detection to the person class (the `/predict` behaviour)
    PersonOnly,
    /// Detect every class and count the person hits afterwards (`/analyze_crowd`)
    AllClasses,
}

/// Outcome of a counting pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersonCount {
    /// Detections with the person class id
    pub persons: usize,
    /// All detections that survived filtering, persons included
    pub total: usize,
}

/// Count people in an image
///
/// Both scopes count only detections whose class id is the person class;
/// they differ in what the detector is asked to return, which can change
/// how non-maximum suppression interacts with other classes.
pub fn count_people(
    detector: &dyn Detector,
    image: &DynamicImage,
    confidence: f32,
    scope: CountScope,
) -> Result<PersonCount> {
    let options = match scope {
        CountScope::PersonOnly => DetectOptions::new(confidence).with_classes(vec![PERSON_CLASS_ID]),
        CountScope::AllClasses => DetectOptions::new(confidence),
    };

    let detections = detector.detect(image, &options)?;
    let persons = detections.iter().filter(|d| d.is_person()).count();

    debug!(
        "Counted {} persons among {} detections ({:?})",
        persons,
        detections.len(),
        scope
    );

    Ok(PersonCount {
        persons,
        total: detections.len(),
    })
}
