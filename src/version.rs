// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the crowd count node

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-person-count-2025-10-18";

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Build date
pub const BUILD_DATE: &str = "2025-10-18";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "person-count",
    "congestion-buckets",
    "multipart-upload",
    "image-url-fetch",
    "legacy-analyze-crowd",
    "cuda-fallback-cpu",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Crowd Count Node {} ({})", VERSION_NUMBER, BUILD_DATE)
}
