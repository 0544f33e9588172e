//! CSV / JSON ingest of raw listing rows.
//!
//! This module only turns bytes into [`RawRecord`]s. It does not interpret any
//! cell: typing, coercion and imputation belong to the transformer.
//!
//! Design goals:
//! - **Row-level resilience** (skip malformed rows, but report what happened)
//! - **Header hygiene** (BOM stripping, case-insensitive column names)
//! - **Hard failure** only when the source is unreadable or yields no rows

use std::fs::{self, File};
use std::path::Path;

use csv::StringRecord;
use serde_json::Value;
use tracing::{info, warn};

use crate::domain::{Dataset, RawRecord};
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: the dataset plus what was skipped on the way.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub dataset: Dataset,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Read a listing CSV into a [`Dataset`].
pub fn load_dataset(path: &Path) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::Ingestion(format!("Failed to open CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::Ingestion(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let columns: Vec<String> = headers.iter().map(normalize_header_name).collect();

    let mut records = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        match result {
            Ok(record) => records.push(to_raw_record(&columns, &record)),
            Err(e) => row_errors.push(RowError {
                line,
                message: format!("CSV parse error: {e}"),
            }),
        }
    }

    if !row_errors.is_empty() {
        warn!(
            skipped = row_errors.len(),
            first_line = row_errors[0].line,
            "skipped malformed CSV rows"
        );
    }
    if records.is_empty() {
        return Err(AppError::Ingestion(format!(
            "No usable rows in '{}'.",
            path.display()
        )));
    }

    info!(path = %path.display(), rows = records.len(), columns = columns.len(), "read dataset");
    Ok(IngestedData {
        dataset: Dataset::new(columns, records),
        row_errors,
        rows_read,
    })
}

/// Write a dataset back out as CSV, creating parent directories.
pub fn write_dataset_csv(path: &Path, dataset: &Dataset) -> Result<(), AppError> {
    let fail = |e: &dyn std::fmt::Display| AppError::persistence(path, e.to_string());

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| fail(&e))?;
    }
    let mut writer = csv::Writer::from_path(path).map_err(|e| fail(&e))?;

    writer.write_record(&dataset.columns).map_err(|e| fail(&e))?;
    for record in &dataset.records {
        let row = dataset
            .columns
            .iter()
            .map(|c| record.raw(c).unwrap_or_default());
        writer.write_record(row).map_err(|e| fail(&e))?;
    }
    writer.flush().map_err(|e| fail(&e))?;
    Ok(())
}

/// Parse one record from a JSON object such as `{"city": "NYC", "beds": 2}`.
///
/// Numbers and booleans are kept as their text form; `null` is a missing cell.
pub fn record_from_json(text: &str) -> Result<RawRecord, AppError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| AppError::Ingestion(format!("Invalid JSON record: {e}")))?;
    let Value::Object(map) = value else {
        return Err(AppError::Ingestion("JSON record must be an object.".into()));
    };

    let mut record = RawRecord::new();
    for (key, v) in map {
        let cell = match v {
            Value::Null => continue,
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => {
                return Err(AppError::Ingestion(format!(
                    "Field `{key}` has unsupported JSON value {other}."
                )));
            }
        };
        record.set(normalize_header_name(&key), cell);
    }
    Ok(record)
}

fn to_raw_record(columns: &[String], record: &StringRecord) -> RawRecord {
    // Short rows leave trailing columns missing; extra cells are ignored.
    RawRecord::from_pairs(
        columns
            .iter()
            .zip(record.iter())
            .map(|(c, v)| (c.clone(), v.to_string())),
    )
}

fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header. If we don't strip it, the first column is never found.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_rows_and_normalizes_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listings.csv");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "\u{feff}City,log_price,amenities").unwrap();
        writeln!(f, "NYC,5.0,\"TV,Wifi\"").unwrap();
        writeln!(f, "SF,4.5,").unwrap();
        drop(f);

        let ingest = load_dataset(&path).unwrap();
        assert_eq!(ingest.dataset.columns, ["city", "log_price", "amenities"]);
        assert_eq!(ingest.dataset.len(), 2);
        assert_eq!(ingest.dataset.records[0].get("amenities"), Some("TV,Wifi"));
        assert_eq!(ingest.dataset.records[1].get("amenities"), None);
        assert_eq!(ingest.rows_read, 2);
    }

    #[test]
    fn header_only_file_is_an_ingestion_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "city,log_price\n").unwrap();

        let err = load_dataset(&path).unwrap_err();
        assert!(matches!(err, AppError::Ingestion(_)));
    }

    #[test]
    fn missing_file_is_an_ingestion_error() {
        let err = load_dataset(Path::new("/nonexistent/listings.csv")).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn written_csv_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.csv");
        let ds = Dataset::new(
            vec!["city".into(), "amenities".into()],
            vec![RawRecord::from_pairs([("city", "LA"), ("amenities", "TV,Pool")])],
        );
        write_dataset_csv(&path, &ds).unwrap();

        let back = load_dataset(&path).unwrap();
        assert_eq!(back.dataset, ds);
    }

    #[test]
    fn json_record_keeps_text_forms() {
        let rec = record_from_json(r#"{"City": "NYC", "beds": 2, "cleaning_fee": true, "zipcode": null}"#)
            .unwrap();
        assert_eq!(rec.get("city"), Some("NYC"));
        assert_eq!(rec.get("beds"), Some("2"));
        assert_eq!(rec.get("cleaning_fee"), Some("true"));
        assert!(!rec.contains("zipcode"));

        assert!(record_from_json("[1, 2]").is_err());
    }
}
