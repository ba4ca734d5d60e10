//! CSV ingest for rate panels and meeting calendars.
//!
//! Panel CSV: a `date` column plus one column per rate series (levels).
//! Calendar CSV: a `date` column (other columns are ignored).
//!
//! Bad rows are skipped and reported as `RowError`s; the schema itself
//! (missing `date` column, fewer than two series) is a hard error.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use clap::ValueEnum;
use csv::StringRecord;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{MeetingCalendar, TimeSeriesPanel};
use crate::error::AppError;

/// Units of the rate levels in a panel CSV. Everything downstream is in bps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RateUnit {
    /// Percentage points (`4.25` = 425 bps).
    #[default]
    Percent,
    Bps,
}

impl RateUnit {
    pub fn to_bps(self) -> f64 {
        match self {
            RateUnit::Percent => 100.0,
            RateUnit::Bps => 1.0,
        }
    }
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct IngestedPanel {
    /// Levels in bps, strictly increasing dates.
    pub panel: TimeSeriesPanel,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
    pub unit: RateUnit,
}

#[derive(Debug, Clone)]
pub struct IngestedCalendar {
    pub calendar: MeetingCalendar,
    pub row_errors: Vec<RowError>,
}

pub fn load_panel(path: &Path, unit: RateUnit) -> Result<IngestedPanel, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open panel CSV '{}': {e}", path.display())))?;
    read_panel(file, unit)
}

/// Parse a panel CSV from any reader.
pub fn read_panel<R: Read>(reader: R, unit: RateUnit) -> Result<IngestedPanel, AppError> {
    let mut reader = csv_reader(reader);
    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    let date_idx = *header_map
        .get("date")
        .ok_or_else(|| AppError::new(2, "Missing required column: `date`"))?;

    let series: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != date_idx)
        .map(|(idx, name)| (idx, normalize_header_name(name)))
        .filter(|(_, name)| !name.is_empty())
        .collect();
    if series.len() < 2 {
        return Err(AppError::new(
            2,
            format!("Panel CSV needs at least two rate columns besides `date`, found {}", series.len()),
        ));
    }

    let scale = unit.to_bps();
    let mut rows: Vec<(usize, NaiveDate, Vec<f64>)> = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_panel_row(&record, date_idx, &series, scale) {
            Ok((date, values)) => rows.push((line, date, values)),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    rows.sort_by_key(|(_, date, _)| *date);
    let mut kept: Vec<(NaiveDate, Vec<f64>)> = Vec::with_capacity(rows.len());
    for (line, date, values) in rows {
        if kept.last().is_some_and(|(prev, _)| *prev == date) {
            row_errors.push(RowError {
                line,
                message: format!("Duplicate date {date}; keeping the first row."),
            });
            continue;
        }
        kept.push((date, values));
    }
    row_errors.sort_by_key(|e| e.line);

    let rows_used = kept.len();
    if rows_used < 2 {
        return Err(AppError::new(
            3,
            format!("Need at least two valid panel rows, found {rows_used}."),
        ));
    }
    for e in &row_errors {
        warn!(line = e.line, message = %e.message, "skipped panel row");
    }

    let n = series.len();
    let values = DMatrix::from_fn(rows_used, n, |t, j| kept[t].1[j]);
    let periods = kept.iter().map(|(d, _)| *d).collect();
    let names = series.into_iter().map(|(_, name)| name).collect();
    let panel = TimeSeriesPanel::new(names, periods, values)?;
    debug!(rows_read, rows_used, variables = n, "panel ingested");

    Ok(IngestedPanel {
        panel,
        row_errors,
        rows_read,
        rows_used,
        unit,
    })
}

pub fn load_calendar(path: &Path) -> Result<IngestedCalendar, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open calendar CSV '{}': {e}", path.display())))?;
    read_calendar(file)
}

pub fn read_calendar<R: Read>(reader: R) -> Result<IngestedCalendar, AppError> {
    let mut reader = csv_reader(reader);
    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    let date_idx = *header_map
        .get("date")
        .ok_or_else(|| AppError::new(2, "Missing required column: `date`"))?;

    let mut dates = Vec::new();
    let mut row_errors = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let parsed = result
            .map_err(|e| format!("CSV parse error: {e}"))
            .and_then(|record| get_required(&record, date_idx, "date").and_then(parse_date));
        match parsed {
            Ok(date) => dates.push(date),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }
    for e in &row_errors {
        warn!(line = e.line, message = %e.message, "skipped calendar row");
    }

    Ok(IngestedCalendar {
        calendar: MeetingCalendar::new(dates),
        row_errors,
    })
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn parse_panel_row(
    record: &StringRecord,
    date_idx: usize,
    series: &[(usize, String)],
    scale: f64,
) -> Result<(NaiveDate, Vec<f64>), String> {
    let date = parse_date(get_required(record, date_idx, "date")?)?;
    let values = series
        .iter()
        .map(|(idx, name)| {
            let raw = get_required(record, *idx, name)?;
            parse_f64(raw)
                .map(|v| v * scale)
                .ok_or_else(|| format!("Invalid `{name}` value '{raw}'."))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((date, values))
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn get_required<'a>(record: &'a StringRecord, idx: usize, name: &str) -> Result<&'a str, String> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    const FMTS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    Err(format!(
        "Invalid date '{s}'. Expected one of: YYYY-MM-DD, DD/MM/YYYY, DD-MM-YYYY, YYYY/MM/DD."
    ))
}

fn parse_f64(s: &str) -> Option<f64> {
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
