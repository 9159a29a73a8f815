// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity record model shared by the fetcher, merger, ledger and aggregator.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One fitness session as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Activity type label ("Running", "Trail Running", ...)
    pub category: String,
    /// Local start time; unique within the ledger
    pub start_time: NaiveDateTime,
    /// Distance in kilometres
    pub distance_km: f64,
    /// Step count (0 when the service does not report steps)
    pub steps: u64,
    /// Moving time in minutes
    pub duration_min: f64,
    /// Average heart rate
    pub heartrate_bpm: Option<f64>,
    /// Total elevation gain in metres
    pub elevation_gain_m: Option<f64>,
}

impl ActivityRecord {
    /// Create a record with required fields; numeric fields start at their defaults.
    pub fn new(category: impl Into<String>, start_time: NaiveDateTime) -> Self {
        Self {
            category: category.into(),
            start_time,
            distance_km: 0.0,
            steps: 0,
            duration_min: 0.0,
            heartrate_bpm: None,
            elevation_gain_m: None,
        }
    }

    pub fn with_distance_km(mut self, km: f64) -> Self {
        self.distance_km = non_negative(km);
        self
    }

    pub fn with_steps(mut self, steps: u64) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_duration_min(mut self, minutes: f64) -> Self {
        self.duration_min = non_negative(minutes);
        self
    }

    pub fn with_heartrate_bpm(mut self, bpm: Option<f64>) -> Self {
        self.heartrate_bpm = bpm.filter(|v| v.is_finite() && *v >= 0.0);
        self
    }

    pub fn with_elevation_gain_m(mut self, metres: Option<f64>) -> Self {
        self.elevation_gain_m = metres.filter(|v| v.is_finite() && *v >= 0.0);
        self
    }
}

/// Clamp NaN, infinities and negatives to zero.
pub fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Format with exactly two decimals ("5.00").
pub fn format_fixed2(value: f64) -> String {
    format!("{:.2}", round2(value))
}

/// Format with up to two decimals and no trailing zeros ("30", "30.5", "30.25").
pub fn format_trimmed(value: f64) -> String {
    let fixed = format!("{:.2}", round2(value));
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
