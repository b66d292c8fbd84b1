// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Congestion bucketing of person counts
//!
//! Thresholds come from the caller and are compared in order without any
//! monotonicity check: `count <= t1` is "low", then `count <= t2` is
//! "moderate", then `count <= t3` is "crowded", otherwise "very crowded".

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse congestion bucket derived from a person count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CongestionLevel {
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "moderate")]
    Moderate,
    #[serde(rename = "crowded")]
    Crowded,
    #[serde(rename = "very crowded")]
    VeryCrowded,
}

impl CongestionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CongestionLevel::Low => "low",
            CongestionLevel::Moderate => "moderate",
            CongestionLevel::Crowded => "crowded",
            CongestionLevel::VeryCrowded => "very crowded",
        }
    }
}

impl fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied `t1`, `t2`, `t3`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CongestionThresholds {
    pub t1: i64,
    pub t2: i64,
    pub t3: i64,
}

impl CongestionThresholds {
    pub fn new(t1: i64, t2: i64, t3: i64) -> Self {
        Self { t1, t2, t3 }
    }

    /// Build thresholds only when all three values were supplied
    pub fn from_parts(t1: Option<i64>, t2: Option<i64>, t3: Option<i64>) -> Option<Self> {
        match (t1, t2, t3) {
            (Some(t1), Some(t2), Some(t3)) => Some(Self { t1, t2, t3 }),
            _ => None,
        }
    }

    pub fn classify(&self, count: usize) -> CongestionLevel {
        let count = i64::try_from(count).unwrap_or(i64::MAX);
        if count <= self.t1 {
            CongestionLevel::Low
        } else if count <= self.t2 {
            CongestionLevel::Moderate
        } else if count <= self.t3 {
            CongestionLevel::Crowded
        } else {
            CongestionLevel::VeryCrowded
        }
    }
}
