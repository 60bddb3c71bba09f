use std::cmp::Reverse;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime};
use quakefeed_core::error::AppError;
use quakefeed_core::models::EarthquakeRecord;
use quakefeed_core::traits::RecordSink;
use serde::Serialize;

pub const DEFAULT_RAW_STEM: &str = "phivolcs_earthquake_data_raw";
pub const DEFAULT_CLEANED_STEM: &str = "earthquake_data_cleaned";

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Serialize)]
struct RawRow<'a> {
    identity_key: &'a str,
    raw_text: &'a str,
    magnitude: Option<f64>,
    depth_km: Option<f64>,
    datetime_text: Option<&'a str>,
    datetime_parsed: Option<String>,
    location_text: Option<&'a str>,
    intensity_text: Option<&'a str>,
    permalink: Option<&'a str>,
    posted_at: Option<&'a str>,
    scrape_datetime: &'a str,
}

#[derive(Serialize)]
struct CleanedRow<'a> {
    magnitude: Option<f64>,
    depth_km: Option<f64>,
    datetime_parsed: Option<String>,
    location_text: Option<&'a str>,
    intensity_text: Option<&'a str>,
}

fn format_datetime(dt: Option<NaiveDateTime>) -> Option<String> {
    dt.map(|d| d.format(DATETIME_FORMAT).to_string())
}

/// Records ordered by post time, most recent first. Records without a
/// readable post time go last, in acceptance order.
fn newest_first(records: &[EarthquakeRecord]) -> Vec<EarthquakeRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|r| {
        Reverse(
            r.posted_at
                .as_deref()
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok()),
        )
    });
    sorted
}

fn sink_error(path: &Path, e: impl std::fmt::Display) -> AppError {
    AppError::SinkError(format!("{}: {e}", path.display()))
}

/// Writes each run as a comma-separated raw file and a semicolon-separated
/// cleaned file, both suffixed with the capture timestamp.
///
/// Missing values are written as empty fields.
#[derive(Debug, Clone)]
pub struct CsvSink {
    output_dir: PathBuf,
    raw_stem: String,
    cleaned_stem: String,
}

impl CsvSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            raw_stem: DEFAULT_RAW_STEM.to_string(),
            cleaned_stem: DEFAULT_CLEANED_STEM.to_string(),
        }
    }

    pub fn with_stems(mut self, raw: impl Into<String>, cleaned: impl Into<String>) -> Self {
        self.raw_stem = raw.into();
        self.cleaned_stem = cleaned.into();
        self
    }

    /// Output paths for a run captured at `captured_at`: `(raw, cleaned)`.
    pub fn paths_for(&self, captured_at: DateTime<Local>) -> (PathBuf, PathBuf) {
        let ts = captured_at.format("%Y%m%d_%H%M%S");
        (
            self.output_dir.join(format!("{}_{ts}.csv", self.raw_stem)),
            self.output_dir.join(format!("{}_{ts}.csv", self.cleaned_stem)),
        )
    }

    /// Identity keys recorded in earlier raw files of this output directory.
    ///
    /// A missing directory yields no keys. Files without an `identity_key`
    /// column are skipped.
    pub fn known_identity_keys(&self) -> Result<Vec<String>, AppError> {
        let entries = match std::fs::read_dir(&self.output_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(sink_error(&self.output_dir, e)),
        };

        let prefix = format!("{}_", self.raw_stem);
        let mut keys = Vec::new();
        for path in entries.filter_map(|e| e.ok().map(|e| e.path())) {
            let is_raw = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(".csv"));
            if !is_raw {
                continue;
            }

            let mut reader = csv::Reader::from_path(&path).map_err(|e| sink_error(&path, e))?;
            let headers = reader.headers().map_err(|e| sink_error(&path, e))?;
            let Some(column) = headers.iter().position(|h| h == "identity_key") else {
                tracing::warn!(path = %path.display(), "Raw file has no identity_key column");
                continue;
            };
            for row in reader.records() {
                let row = row.map_err(|e| sink_error(&path, e))?;
                if let Some(key) = row.get(column).filter(|k| !k.is_empty()) {
                    keys.push(key.to_string());
                }
            }
        }

        Ok(keys)
    }

    fn write_raw(
        &self,
        path: &Path,
        records: &[EarthquakeRecord],
        scrape_datetime: &str,
    ) -> Result<(), AppError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b',')
            .from_path(path)
            .map_err(|e| sink_error(path, e))?;

        for r in records {
            writer
                .serialize(RawRow {
                    identity_key: &r.identity_key,
                    raw_text: &r.raw_text,
                    magnitude: r.magnitude,
                    depth_km: r.depth_km,
                    datetime_text: r.datetime_text.as_deref(),
                    datetime_parsed: format_datetime(r.datetime_parsed),
                    location_text: r.location_text.as_deref(),
                    intensity_text: r.intensity_text.as_deref(),
                    permalink: r.permalink.as_deref(),
                    posted_at: r.posted_at.as_deref(),
                    scrape_datetime,
                })
                .map_err(|e| sink_error(path, e))?;
        }

        writer.flush().map_err(|e| sink_error(path, e))
    }

    fn write_cleaned(&self, path: &Path, records: &[EarthquakeRecord]) -> Result<(), AppError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .from_path(path)
            .map_err(|e| sink_error(path, e))?;

        for r in records {
            writer
                .serialize(CleanedRow {
                    magnitude: r.magnitude,
                    depth_km: r.depth_km,
                    datetime_parsed: format_datetime(r.datetime_parsed),
                    location_text: r.location_text.as_deref(),
                    intensity_text: r.intensity_text.as_deref(),
                })
                .map_err(|e| sink_error(path, e))?;
        }

        writer.flush().map_err(|e| sink_error(path, e))
    }
}

impl RecordSink for CsvSink {
    fn write(
        &self,
        records: &[EarthquakeRecord],
        captured_at: DateTime<Local>,
    ) -> Result<(), AppError> {
        if records.is_empty() {
            tracing::info!("No earthquake records to save");
            return Ok(());
        }

        std::fs::create_dir_all(&self.output_dir).map_err(|e| sink_error(&self.output_dir, e))?;

        let (raw_path, cleaned_path) = self.paths_for(captured_at);
        let scrape_datetime = captured_at.format("%Y-%m-%d %H:%M:%S").to_string();
        let records = newest_first(records);

        self.write_raw(&raw_path, &records, &scrape_datetime)?;
        tracing::info!(path = %raw_path.display(), rows = records.len(), "Raw data saved");

        self.write_cleaned(&cleaned_path, &records)?;
        tracing::info!(path = %cleaned_path.display(), rows = records.len(), "Cleaned data saved");

        Ok(())
    }
}
