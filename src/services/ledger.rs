// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! CSV ledger: the durable, ordered list of activity records.
//!
//! The file is never edited in place. Writers render the complete new
//! contents and swap them in atomically; readers parse each row on its own
//! so one damaged row cannot hide the rest.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use csv::StringRecord;

use crate::error::LedgerError;
use crate::fs_utils::write_atomic_with;
use crate::models::activity::{format_fixed2, format_trimmed, non_negative};
use crate::models::ActivityRecord;
use crate::time_utils::{format_start_time, parse_start_time};

pub const COL_CATEGORY: &str = "Category";
pub const COL_START_TIME: &str = "Start Time";
pub const COL_DISTANCE: &str = "Distance (km)";
pub const COL_STEPS: &str = "Steps";
pub const COL_DURATION: &str = "Duration (min)";
pub const COL_HEARTRATE: &str = "Heartrate (BPM)";
pub const COL_ELEVATION: &str = "Elevation Gain (m)";

/// Leading column of the exporter's original (v1) layout. Read and ignored.
pub const COL_LEGACY_ACTIVITY_ID: &str = "Activity ID";

/// Current (v2) header, written on every replace.
pub const HEADER: [&str; 7] = [
    COL_CATEGORY,
    COL_START_TIME,
    COL_DISTANCE,
    COL_STEPS,
    COL_DURATION,
    COL_HEARTRATE,
    COL_ELEVATION,
];

/// Placeholder the v1 exporter wrote for unknown values.
const NOT_AVAILABLE: &str = "N/A";

/// File mode for the ledger; it is meant to be published.
const LEDGER_MODE: u32 = 0o644;

/// Result of reading the ledger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerContents {
    pub records: Vec<ActivityRecord>,
    /// Rows dropped because they failed validation
    pub skipped_rows: usize,
}

/// The ledger file at an explicit path.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every valid record, in file order.
    pub fn read_all(&self) -> Result<Vec<ActivityRecord>, LedgerError> {
        Ok(self.read_with_report()?.records)
    }

    /// Read every valid record and report how many rows were skipped.
    ///
    /// A missing file is an empty ledger.
    pub fn read_with_report(&self) -> Result<LedgerContents, LedgerError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "Ledger does not exist yet");
                return Ok(LedgerContents::default());
            }
            Err(source) => {
                return Err(LedgerError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let contents = parse_ledger(&data)?;
        tracing::debug!(
            path = %self.path.display(),
            records = contents.records.len(),
            skipped = contents.skipped_rows,
            "Ledger read"
        );
        Ok(contents)
    }

    /// Replace the whole ledger with `records`, atomically.
    pub fn replace_all(&self, records: &[ActivityRecord]) -> Result<(), LedgerError> {
        write_atomic_with(&self.path, Some(LEDGER_MODE), |out| {
            write_ledger(out, records)
        })
        .map_err(|source| LedgerError::Io {
            path: self.path.clone(),
            source,
        })?;
        tracing::info!(
            path = %self.path.display(),
            records = records.len(),
            "Ledger written"
        );
        Ok(())
    }
}

/// Column positions resolved from a header row.
#[derive(Debug, Default)]
struct ColumnMap {
    width: usize,
    category: usize,
    start_time: usize,
    distance: Option<usize>,
    steps: Option<usize>,
    duration: Option<usize>,
    heartrate: Option<usize>,
    elevation: Option<usize>,
}

impl ColumnMap {
    fn from_header(header: &StringRecord) -> Result<Self, LedgerError> {
        let mut category = None;
        let mut start_time = None;
        let mut map = ColumnMap {
            width: header.len(),
            ..Default::default()
        };
        let mut seen: Vec<&str> = Vec::with_capacity(header.len());

        for (idx, raw) in header.iter().enumerate() {
            let name = raw.trim_start_matches('\u{feff}').trim();
            if seen.contains(&name) {
                return Err(LedgerError::Schema(format!("duplicate column {:?}", name)));
            }
            seen.push(name);

            let slot = match name {
                COL_CATEGORY => &mut category,
                COL_START_TIME => &mut start_time,
                COL_DISTANCE => &mut map.distance,
                COL_STEPS => &mut map.steps,
                COL_DURATION => &mut map.duration,
                COL_HEARTRATE => &mut map.heartrate,
                COL_ELEVATION => &mut map.elevation,
                COL_LEGACY_ACTIVITY_ID => continue,
                other => {
                    return Err(LedgerError::Schema(format!("unknown column {:?}", other)));
                }
            };
            *slot = Some(idx);
        }

        map.category = category
            .ok_or_else(|| LedgerError::Schema(format!("missing column {:?}", COL_CATEGORY)))?;
        map.start_time = start_time
            .ok_or_else(|| LedgerError::Schema(format!("missing column {:?}", COL_START_TIME)))?;
        Ok(map)
    }
}

/// Parse ledger bytes.
///
/// Header problems fail the whole read. Row problems skip the row.
pub fn parse_ledger(data: &[u8]) -> Result<LedgerContents, LedgerError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let header = reader.headers()?.clone();
    if header.is_empty() || header.iter().all(|h| h.trim().is_empty()) {
        return Ok(LedgerContents::default());
    }
    let columns = ColumnMap::from_header(&header)?;

    let mut contents = LedgerContents::default();
    for result in reader.records() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable ledger row");
                contents.skipped_rows += 1;
                continue;
            }
        };
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        match parse_row(&row, &columns, line) {
            Some(record) => contents.records.push(record),
            None => contents.skipped_rows += 1,
        }
    }

    Ok(contents)
}

fn parse_row(row: &StringRecord, columns: &ColumnMap, line: u64) -> Option<ActivityRecord> {
    if row.len() != columns.width {
        tracing::warn!(
            line,
            expected = columns.width,
            found = row.len(),
            "Skipping ledger row with wrong column count"
        );
        return None;
    }

    let category = row.get(columns.category).unwrap_or_default();
    if category.is_empty() {
        tracing::warn!(line, "Skipping ledger row without a category");
        return None;
    }

    let raw_start = row.get(columns.start_time).unwrap_or_default();
    let Some(start_time) = parse_start_time(raw_start) else {
        tracing::warn!(line, start_time = raw_start, "Skipping ledger row with bad start time");
        return None;
    };

    let number = |idx: Option<usize>, column: &'static str| -> Option<f64> {
        let cell = idx.and_then(|i| row.get(i)).unwrap_or_default();
        parse_number(cell, column, line)
    };

    let steps = number(columns.steps, COL_STEPS)
        .map(|s| non_negative(s).round() as u64)
        .unwrap_or(0);

    Some(
        ActivityRecord::new(category, start_time)
            .with_distance_km(number(columns.distance, COL_DISTANCE).unwrap_or(0.0))
            .with_steps(steps)
            .with_duration_min(number(columns.duration, COL_DURATION).unwrap_or(0.0))
            .with_heartrate_bpm(number(columns.heartrate, COL_HEARTRATE))
            .with_elevation_gain_m(number(columns.elevation, COL_ELEVATION)),
    )
}

/// Empty and "N/A" cells are unknown; anything else non-numeric is logged.
fn parse_number(cell: &str, column: &'static str, line: u64) -> Option<f64> {
    if cell.is_empty() || cell.eq_ignore_ascii_case(NOT_AVAILABLE) {
        return None;
    }
    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            tracing::warn!(line, column, value = cell, "Defaulting malformed numeric cell");
            None
        }
    }
}

/// Render records as ledger bytes (v2 header, `\n` line endings).
pub fn render_ledger(records: &[ActivityRecord]) -> Result<Vec<u8>, LedgerError> {
    let mut data = Vec::new();
    write_ledger(&mut data, records).map_err(|source| LedgerError::Io {
        path: PathBuf::new(),
        source,
    })?;
    Ok(data)
}

/// Stream the header and every record to `out` as CSV.
pub fn write_ledger<W: io::Write>(out: W, records: &[ActivityRecord]) -> io::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out);

    writer.write_record(HEADER)?;
    for record in records {
        writer.write_record(render_row(record))?;
    }
    writer.flush()
}

/// Cells of one row, in header order.
pub fn render_row(record: &ActivityRecord) -> [String; 7] {
    [
        record.category.clone(),
        format_start_time(record.start_time),
        format_fixed2(record.distance_km),
        record.steps.to_string(),
        format_trimmed(record.duration_min),
        record.heartrate_bpm.map(format_trimmed).unwrap_or_default(),
        record.elevation_gain_m.map(format_trimmed).unwrap_or_default(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const V2_HEADER: &str =
        "Category,Start Time,Distance (km),Steps,Duration (min),Heartrate (BPM),Elevation Gain (m)";

    fn parse(text: &str) -> LedgerContents {
        parse_ledger(text.as_bytes()).expect("ledger should parse")
    }

    #[test]
    fn test_parse_basic_row() {
        let contents = parse(&format!(
            "{}\nRun,2024-01-01T08:00:00,5.00,6000,30,140,20\n",
            V2_HEADER
        ));

        assert_eq!(contents.skipped_rows, 0);
        assert_eq!(contents.records.len(), 1);
        let r = &contents.records[0];
        assert_eq!(r.category, "Run");
        assert_eq!(r.distance_km, 5.0);
        assert_eq!(r.steps, 6000);
        assert_eq!(r.duration_min, 30.0);
        assert_eq!(r.heartrate_bpm, Some(140.0));
        assert_eq!(r.elevation_gain_m, Some(20.0));
    }

    #[test]
    fn test_render_matches_canonical_row() {
        let contents = parse(&format!(
            "{}\nRun,2024-01-01T08:00:00,5.00,6000,30,140,20\n",
            V2_HEADER
        ));
        let rendered = String::from_utf8(render_ledger(&contents.records).unwrap()).unwrap();
        assert_eq!(
            rendered,
            format!("{}\nRun,2024-01-01T08:00:00,5.00,6000,30,140,20\n", V2_HEADER)
        );
    }

    #[test]
    fn test_empty_optional_cells() {
        let contents = parse(&format!("{}\nWalk,2024-01-01T08:00:00,1.2,1500,15,,\n", V2_HEADER));
        let r = &contents.records[0];
        assert_eq!(r.heartrate_bpm, None);
        assert_eq!(r.elevation_gain_m, None);
    }

    #[test]
    fn test_non_numeric_steps_defaults_to_zero() {
        let contents = parse(&format!("{}\nRun,2024-01-01T08:00:00,5,lots,30,,\n", V2_HEADER));
        assert_eq!(contents.skipped_rows, 0);
        assert_eq!(contents.records[0].steps, 0);
        assert_eq!(contents.records[0].distance_km, 5.0);
    }

    #[test]
    fn test_rows_missing_identity_are_skipped() {
        let contents = parse(&format!(
            "{}\n,2024-01-01T08:00:00,5,1,30,,\nRun,,5,1,30,,\nRun,garbage,5,1,30,,\nRun,2024-01-02T08:00:00,5,1,30,,\n",
            V2_HEADER
        ));
        assert_eq!(contents.skipped_rows, 3);
        assert_eq!(contents.records.len(), 1);
    }

    #[test]
    fn test_row_with_wrong_width_is_skipped() {
        let contents = parse(&format!(
            "{}\nRun,2024-01-01T08:00:00,5\nRun,2024-01-02T08:00:00,5,1,30,,\n",
            V2_HEADER
        ));
        assert_eq!(contents.skipped_rows, 1);
        assert_eq!(contents.records.len(), 1);
    }

    #[test]
    fn test_unknown_column_rejected() {
        let text = format!("{},Notes\n", V2_HEADER);
        let err = parse_ledger(text.as_bytes()).unwrap_err();
        assert!(matches!(err, LedgerError::Schema(_)));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let err = parse_ledger(b"Category,Start Time,Steps,Steps\n").unwrap_err();
        assert!(matches!(err, LedgerError::Schema(_)));
    }

    #[test]
    fn test_missing_required_column_rejected() {
        let err = parse_ledger(b"Category,Distance (km)\nRun,5\n").unwrap_err();
        assert!(matches!(err, LedgerError::Schema(_)));
    }

    #[test]
    fn test_missing_optional_columns_default() {
        let contents = parse("Category,Start Time,Distance (km)\nRun,2024-01-01T08:00:00,5\n");
        let r = &contents.records[0];
        assert_eq!(r.distance_km, 5.0);
        assert_eq!(r.steps, 0);
        assert_eq!(r.duration_min, 0.0);
        assert_eq!(r.heartrate_bpm, None);
    }

    #[test]
    fn test_legacy_layout_with_activity_id() {
        let contents = parse(
            "Activity ID,Category,Start Time,Distance (km),Steps,Duration (min),Heartrate (BPM),Elevation Gain (m)\n\
             987,Running,2024-01-01 08:00:00,5.01,N/A,30.5,N/A,12.0\n",
        );
        let r = &contents.records[0];
        assert_eq!(r.category, "Running");
        assert_eq!(format_start_time(r.start_time), "2024-01-01T08:00:00");
        assert_eq!(r.steps, 0);
        assert_eq!(r.heartrate_bpm, None);
        assert_eq!(r.elevation_gain_m, Some(12.0));

        let rendered = String::from_utf8(render_ledger(&contents.records).unwrap()).unwrap();
        assert!(rendered.starts_with(V2_HEADER));
        assert!(rendered.contains("Running,2024-01-01T08:00:00,5.01,0,30.5,,12\n"));
    }

    #[test]
    fn test_empty_file_is_empty_ledger() {
        assert_eq!(parse(""), LedgerContents::default());
    }

    #[test]
    fn test_header_only_is_empty_ledger() {
        let contents = parse(&format!("{}\n", V2_HEADER));
        assert!(contents.records.is_empty());
        assert_eq!(contents.skipped_rows, 0);
    }

    #[test]
    fn test_bom_and_crlf_tolerated() {
        let contents = parse(&format!(
            "\u{feff}{}\r\nRun,2024-01-01T08:00:00,5.00,6000,30,140,20\r\n",
            V2_HEADER
        ));
        assert_eq!(contents.records.len(), 1);
    }

    #[test]
    fn test_category_with_comma_round_trips() {
        let record = ActivityRecord::new(
            "Strength, Upper",
            parse_start_time("2024-01-01T08:00:00").unwrap(),
        );
        let rendered = render_ledger(std::slice::from_ref(&record)).unwrap();
        let contents = parse_ledger(&rendered).unwrap();
        assert_eq!(contents.records, vec![record]);
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("activities.csv"));
        assert!(ledger.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_replace_all_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("activities.csv"));
        let records = vec![
            ActivityRecord::new("Run", parse_start_time("2024-01-01T08:00:00").unwrap())
                .with_distance_km(5.0)
                .with_heartrate_bpm(Some(140.0)),
            ActivityRecord::new("Ride", parse_start_time("2024-01-02T08:00:00").unwrap())
                .with_distance_km(40.0),
        ];

        ledger.replace_all(&records).unwrap();
        assert_eq!(ledger.read_all().unwrap(), records);
    }
}
