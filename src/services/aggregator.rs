// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Read-side aggregation for the presentation layer.

use serde::Serialize;

use crate::models::activity::{format_fixed2, format_trimmed};
use crate::models::{ActivityRecord, DisplayRow, Summary};
use crate::time_utils::format_start_time;

/// Totals over all records. Never fails.
pub fn summarize(records: &[ActivityRecord]) -> Summary {
    let mut summary = Summary::default();
    for record in records {
        summary.add(record);
    }
    summary
}

/// Detail-view rows, newest first. Unknown values render as empty cells.
pub fn to_display_rows(records: &[ActivityRecord]) -> Vec<DisplayRow> {
    let mut rows: Vec<&ActivityRecord> = records.iter().collect();
    rows.sort_by(|a, b| b.start_time.cmp(&a.start_time));

    rows.into_iter()
        .map(|r| DisplayRow {
            category: r.category.clone(),
            start_time: format_start_time(r.start_time),
            distance_km: format_fixed2(r.distance_km),
            steps: r.steps.to_string(),
            duration_min: format_trimmed(r.duration_min),
            heartrate_bpm: r.heartrate_bpm.map(format_trimmed).unwrap_or_default(),
            elevation_gain_m: r.elevation_gain_m.map(format_trimmed).unwrap_or_default(),
        })
        .collect()
}

/// Total duration split for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DurationView {
    pub hours: u64,
    pub minutes: u64,
}

/// Everything the presenter needs, serialized as one JSON document.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerView {
    pub summary: Summary,
    pub duration: DurationView,
    pub rows: Vec<DisplayRow>,
}

/// Build the presenter view from ledger records.
pub fn render_view(records: &[ActivityRecord]) -> LedgerView {
    let summary = summarize(records);
    let (hours, minutes) = summary.duration_hm();
    LedgerView {
        duration: DurationView { hours, minutes },
        rows: to_display_rows(records),
        summary,
    }
}
