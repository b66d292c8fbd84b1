// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Detector handle tests
//!
//! Verifies that the handle:
//! - Records load failures without panicking
//! - Resolves `.pt` weights to the sibling `.onnx` export
//! - Serves a shared detector to counting calls

use crowd_count_node::{
    config::NodeConfig,
    vision::{count_people, CountScope, DetectorHandle, DetectorState},
};
use image::DynamicImage;
use std::sync::Arc;

use crate::common::StubDetector;

#[cfg(test)]
mod detector_handle_tests {
    use super::*;

    #[test]
    fn test_missing_weights_are_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig {
            model_path: dir.path().join("best.pt"),
            ..NodeConfig::default()
        };

        let handle = DetectorHandle::load(&config);

        assert!(!handle.is_loaded());
        assert!(handle.detector().is_none());
        assert!(matches!(handle.state(), DetectorState::LoadFailed(_)));
        assert_eq!(handle.model_name(), "best.pt");
    }

    #[test]
    fn test_corrupt_onnx_export_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("best.pt"), b"torch checkpoint").unwrap();
        std::fs::write(dir.path().join("best.onnx"), b"not a protobuf").unwrap();
        let config = NodeConfig {
            model_path: dir.path().join("best.pt"),
            ..NodeConfig::default()
        };

        let handle = DetectorHandle::load(&config);

        assert!(!handle.is_loaded());
        assert!(handle.load_error().is_some());
    }

    #[test]
    fn test_shared_detector_counts_persons() {
        let handle = DetectorHandle::loaded(
            "best.pt",
            Arc::new(StubDetector {
                persons: 5,
                others: 2,
            }),
        );
        let detector = handle.detector().unwrap();
        let image = DynamicImage::new_rgb8(10, 10);

        let person_only = count_people(detector.as_ref(), &image, 0.2, CountScope::PersonOnly).unwrap();
        assert_eq!(person_only.persons, 5);
        assert_eq!(person_only.total, 5);

        let all = count_people(detector.as_ref(), &image, 0.2, CountScope::AllClasses).unwrap();
        assert_eq!(all.persons, 5);
        assert_eq!(all.total, 7);
    }

    #[test]
    fn test_confidence_above_stub_scores_filters_everything() {
        let detector = StubDetector {
            persons: 3,
            others: 3,
        };
        let image = DynamicImage::new_rgb8(10, 10);

        let count = count_people(&detector, &image, 0.95, CountScope::AllClasses).unwrap();
        assert_eq!(count.persons, 0);
        assert_eq!(count.total, 0);
    }
}
