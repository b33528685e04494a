use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::ReaderBuilder;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};

/// One validated daily vehicle count for one station. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub station_id: String,
    pub date: NaiveDate,
    pub vehicle_count: u32,
}

/// Counters describing what the loader accepted and rejected.
#[derive(Debug, Default, Clone)]
pub struct LoadReport {
    pub files_read: usize,
    pub files_skipped: usize,
    pub rows_read: usize,
    pub rows_kept: usize,
    pub rows_rejected: usize,
    pub duplicates_replaced: usize,
    pub stations_loaded: usize,
    /// Stations that appeared in the raw data but kept zero valid rows.
    pub stations_dropped: usize,
    pub reject_reasons: HashMap<String, usize>,
}

#[derive(Debug)]
pub struct LoadedObservations {
    /// Per-station observations, date-sorted with duplicates already
    /// resolved (last-seen record wins).
    pub by_station: BTreeMap<String, Vec<Observation>>,
    pub report: LoadReport,
}

const REASON_MISSING_STATION_ID: &str = "missing_station_id";
const REASON_INVALID_DATE: &str = "invalid_date";
const REASON_INVALID_VEHICLE_COUNT: &str = "invalid_vehicle_count";
const REASON_FLAGGED_INVALID: &str = "flagged_invalid";
const REASON_UNREADABLE_ROW: &str = "unreadable_row";
const REASON_FILE_MISSING_COLUMN: &str = "file_missing_column";

/// Expands the observations input into a deterministic list of CSV files:
/// a file path is taken as-is, a directory is walked recursively and the
/// matches sorted.
pub fn discover_observation_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(PipelineError::Config(format!(
            "observations path '{}' is neither a file nor a directory",
            path.display()
        )));
    }

    let pattern = path.join("**/*.csv");
    let pattern = pattern.to_str().ok_or_else(|| {
        PipelineError::Config(format!(
            "observations path '{}' is not valid UTF-8",
            path.display()
        ))
    })?;

    let mut files = Vec::new();
    for entry in glob::glob(pattern)? {
        match entry {
            Ok(p) if p.is_file() => files.push(p),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "skipping unreadable path during input discovery"),
        }
    }
    files.sort();
    Ok(files)
}

struct ColumnMap {
    station_id: usize,
    date: usize,
    vehicle_count: usize,
    quality: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> std::result::Result<Self, &'static str> {
        let find = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        Ok(Self {
            station_id: find("station_id").ok_or("station_id")?,
            date: find("date").ok_or("date")?,
            vehicle_count: find("vehicle_count").ok_or("vehicle_count")?,
            quality: find("quality"),
        })
    }
}

/// Loads and validates every observation file, resolving duplicate
/// (station, date) pairs by keeping the last-seen record. Row failures are
/// rejected and reason-counted, never fatal; a file with a broken header is
/// skipped whole. Zero valid rows across all inputs aborts the run.
pub fn load_observations(paths: &[PathBuf]) -> Result<LoadedObservations> {
    let mut by_station: BTreeMap<String, BTreeMap<NaiveDate, u32>> = BTreeMap::new();
    let mut stations_seen: HashSet<String> = HashSet::new();
    let mut report = LoadReport::default();

    for path in paths {
        load_file(path, &mut by_station, &mut stations_seen, &mut report)?;
    }

    if report.rows_kept == 0 {
        return Err(PipelineError::NoValidObservations);
    }

    report.stations_loaded = by_station.len();
    report.stations_dropped = stations_seen
        .iter()
        .filter(|id| !by_station.contains_key(*id))
        .count();
    if report.stations_dropped > 0 {
        warn!(
            dropped = report.stations_dropped,
            "stations present in raw data kept zero valid rows"
        );
    }

    let by_station = by_station
        .into_iter()
        .map(|(station_id, days)| {
            let observations = days
                .into_iter()
                .map(|(date, vehicle_count)| Observation {
                    station_id: station_id.clone(),
                    date,
                    vehicle_count,
                })
                .collect();
            (station_id, observations)
        })
        .collect();

    Ok(LoadedObservations { by_station, report })
}

fn load_file(
    path: &Path,
    by_station: &mut BTreeMap<String, BTreeMap<NaiveDate, u32>>,
    stations_seen: &mut HashSet<String>,
    report: &mut LoadReport,
) -> Result<()> {
    let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let headers = reader.headers()?.clone();

    let columns = match ColumnMap::from_headers(&headers) {
        Ok(columns) => columns,
        Err(missing) => {
            warn!(
                file = %path.display(),
                column = missing,
                "observation file missing required column, skipping file"
            );
            report.files_skipped += 1;
            for _record in reader.records() {
                report.rows_read += 1;
                report.rows_rejected += 1;
                bump(&mut report.reject_reasons, REASON_FILE_MISSING_COLUMN);
            }
            return Ok(());
        }
    };

    report.files_read += 1;

    for (row_index, record) in reader.records().enumerate() {
        let row = row_index + 1;
        report.rows_read += 1;

        let record = match record {
            Ok(record) => record,
            Err(err) => {
                debug!(file = %path.display(), row, error = %err, "row unreadable, rejected");
                report.rows_rejected += 1;
                bump(&mut report.reject_reasons, REASON_UNREADABLE_ROW);
                continue;
            }
        };

        let station_id = record.get(columns.station_id).unwrap_or("").trim();
        if station_id.is_empty() {
            debug!(file = %path.display(), row, "row missing station_id, rejected");
            report.rows_rejected += 1;
            bump(&mut report.reject_reasons, REASON_MISSING_STATION_ID);
            continue;
        }
        stations_seen.insert(station_id.to_string());

        if let Some(quality_col) = columns.quality {
            let quality = record.get(quality_col).unwrap_or("").trim();
            if quality.eq_ignore_ascii_case("invalid") {
                debug!(file = %path.display(), row, station_id, "row flagged invalid at source");
                report.rows_rejected += 1;
                bump(&mut report.reject_reasons, REASON_FLAGGED_INVALID);
                continue;
            }
        }

        let raw_date = record.get(columns.date).unwrap_or("");
        let date = match parse_date(raw_date) {
            Some(date) => date,
            None => {
                debug!(
                    file = %path.display(),
                    row,
                    station_id,
                    value = raw_date,
                    "row has unparseable date, rejected"
                );
                report.rows_rejected += 1;
                bump(&mut report.reject_reasons, REASON_INVALID_DATE);
                continue;
            }
        };

        let raw_count = record.get(columns.vehicle_count).unwrap_or("");
        let vehicle_count = match parse_vehicle_count(raw_count) {
            Some(count) => count,
            None => {
                debug!(
                    file = %path.display(),
                    row,
                    station_id,
                    value = raw_count,
                    "row has invalid vehicle_count, rejected"
                );
                report.rows_rejected += 1;
                bump(&mut report.reject_reasons, REASON_INVALID_VEHICLE_COUNT);
                continue;
            }
        };

        let days = by_station.entry(station_id.to_string()).or_default();
        if days.insert(date, vehicle_count).is_some() {
            report.duplicates_replaced += 1;
        }
        report.rows_kept += 1;
    }

    Ok(())
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

fn parse_vehicle_count(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}

fn bump(reasons: &mut HashMap<String, usize>, reason: &str) {
    *reasons.entry(reason.to_string()).or_insert(0) += 1;
}
