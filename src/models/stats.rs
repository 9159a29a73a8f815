// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Summary statistics and display rows rendered from the ledger.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::activity::non_negative;
use crate::models::ActivityRecord;

/// Totals for one activity category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub count: u32,
    pub distance_km: f64,
    pub duration_min: f64,
}

/// Aggregate statistics over the whole ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub activity_count: u32,
    pub total_distance_km: f64,
    pub total_steps: u64,
    pub total_duration_min: f64,
    /// Per-category breakdown, keyed by category label
    #[serde(default)]
    pub by_category: BTreeMap<String, CategoryStats>,
}

impl Summary {
    /// Fold one record into the totals.
    ///
    /// Non-finite or negative values contribute zero.
    pub fn add(&mut self, record: &ActivityRecord) {
        let distance = non_negative(record.distance_km);
        let duration = non_negative(record.duration_min);

        self.activity_count += 1;
        self.total_distance_km += distance;
        self.total_steps = self.total_steps.saturating_add(record.steps);
        self.total_duration_min += duration;

        let entry = self
            .by_category
            .entry(record.category.clone())
            .or_default();
        entry.count += 1;
        entry.distance_km += distance;
        entry.duration_min += duration;
    }

    /// Total duration as whole hours and remaining minutes.
    ///
    /// Fractional minutes are truncated, never rounded up into the next hour.
    pub fn duration_hm(&self) -> (u64, u64) {
        let minutes = non_negative(self.total_duration_min).trunc() as u64;
        (minutes / 60, minutes % 60)
    }
}

/// One row of the detail view, with every cell pre-formatted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayRow {
    pub category: String,
    pub start_time: String,
    pub distance_km: String,
    pub steps: String,
    pub duration_min: String,
    /// Empty when unknown
    pub heartrate_bpm: String,
    /// Empty when unknown
    pub elevation_gain_m: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_utils::parse_start_time;

    fn make_record(category: &str, date: &str, km: f64, steps: u64, min: f64) -> ActivityRecord {
        ActivityRecord::new(category, parse_start_time(date).unwrap())
            .with_distance_km(km)
            .with_steps(steps)
            .with_duration_min(min)
    }

    #[test]
    fn test_add_basic() {
        let mut summary = Summary::default();
        summary.add(&make_record("Running", "2024-01-01T08:00:00", 5.0, 6000, 30.0));

        assert_eq!(summary.activity_count, 1);
        assert_eq!(summary.total_distance_km, 5.0);
        assert_eq!(summary.total_steps, 6000);
        assert_eq!(summary.by_category.get("Running").map(|c| c.count), Some(1));
    }

    #[test]
    fn test_add_ignores_invalid_numbers() {
        let mut summary = Summary::default();
        let mut record = make_record("Cycling", "2024-01-01T08:00:00", 0.0, 0, 0.0);
        record.distance_km = f64::NAN;
        record.duration_min = -10.0;
        summary.add(&record);

        assert_eq!(summary.activity_count, 1);
        assert_eq!(summary.total_distance_km, 0.0);
        assert_eq!(summary.total_duration_min, 0.0);
    }

    #[test]
    fn test_duration_hm() {
        let summary = Summary {
            total_duration_min: 85.0,
            ..Default::default()
        };
        assert_eq!(summary.duration_hm(), (1, 25));

        let summary = Summary {
            total_duration_min: 59.6,
            ..Default::default()
        };
        assert_eq!(summary.duration_hm(), (0, 59));

        let summary = Summary {
            total_duration_min: 120.99,
            ..Default::default()
        };
        assert_eq!(summary.duration_hm(), (2, 0));

        assert_eq!(Summary::default().duration_hm(), (0, 0));
    }

    #[test]
    fn test_by_category_breakdown() {
        let mut summary = Summary::default();
        summary.add(&make_record("Running", "2024-01-01T08:00:00", 5.0, 6000, 30.0));
        summary.add(&make_record("Running", "2024-01-02T08:00:00", 10.0, 12000, 55.0));
        summary.add(&make_record("Cycling", "2024-01-03T08:00:00", 40.0, 0, 90.0));

        let running = summary.by_category.get("Running").unwrap();
        assert_eq!(running.count, 2);
        assert_eq!(running.distance_km, 15.0);
        assert_eq!(summary.by_category.get("Cycling").unwrap().duration_min, 90.0);
    }
}
