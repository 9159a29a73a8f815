// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Merge freshly fetched records into the committed ledger.
//!
//! Start time is the identity key. Committed records always win over
//! incoming ones with the same start time, which makes the merge idempotent.

use std::collections::HashSet;

use chrono::NaiveDateTime;

use crate::error::MergeError;
use crate::models::ActivityRecord;
use crate::time_utils::format_start_time;

/// Result of a merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// Merged records, sorted by start time
    pub records: Vec<ActivityRecord>,
    /// Number of incoming records that were new
    pub added: usize,
}

/// Newest start time in the ledger, if any.
pub fn watermark(records: &[ActivityRecord]) -> Option<NaiveDateTime> {
    records.iter().map(|r| r.start_time).max()
}

/// Check that no two records share a start time.
pub fn validate(records: &[ActivityRecord]) -> Result<(), MergeError> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.start_time) {
            return Err(MergeError::DuplicateStartTime(format_start_time(
                record.start_time,
            )));
        }
    }
    Ok(())
}

/// Merge `incoming` into `existing`.
///
/// Incoming records whose start time is already present are dropped (the
/// first occurrence wins inside the incoming batch too). The union is sorted
/// by start time; the sort is stable so the output is deterministic.
pub fn merge(
    existing: Vec<ActivityRecord>,
    incoming: Vec<ActivityRecord>,
) -> Result<MergeOutcome, MergeError> {
    validate(&existing)?;

    let mut seen: HashSet<NaiveDateTime> = existing.iter().map(|r| r.start_time).collect();
    let mut records = existing;
    let mut added = 0;

    for record in incoming {
        if record.category.trim().is_empty() {
            tracing::warn!(
                start_time = %format_start_time(record.start_time),
                "Rejecting incoming record without a category"
            );
            continue;
        }
        if !seen.insert(record.start_time) {
            tracing::debug!(
                start_time = %format_start_time(record.start_time),
                "Incoming record already in ledger (idempotent skip)"
            );
            continue;
        }
        records.push(record);
        added += 1;
    }

    records.sort_by_key(|r| r.start_time);

    Ok(MergeOutcome { records, added })
}
