//! Prediction history.
//!
//! Every served prediction can be appended to a store; `lp history` lists the
//! most recent ones. The store is a trait so the prediction path does not care
//! where entries go. The default implementation is an append-only JSON-lines
//! file, one entry per line.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::RawRecord;
use crate::error::AppError;

pub const HISTORY_FILE: &str = "history.jsonl";

/// One served prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub city: Option<String>,
    pub property_type: Option<String>,
    pub room_type: Option<String>,
    pub accommodates: Option<u32>,
    /// Nightly price, already exponentiated.
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn from_record(record: &RawRecord, price: f64, timestamp: DateTime<Utc>) -> Self {
        let text = |c: &str| record.get(c).map(str::to_string);
        Self {
            city: text("city"),
            property_type: text("property_type"),
            room_type: text("room_type"),
            accommodates: record
                .get("accommodates")
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v.round() as u32),
            price,
            timestamp,
        }
    }
}

pub trait HistoryStore: Send + Sync {
    fn append(&self, entry: &HistoryEntry) -> Result<(), AppError>;

    /// Up to `n` entries, newest first.
    fn recent(&self, n: usize) -> Result<Vec<HistoryEntry>, AppError>;
}

/// Append-only JSON-lines file.
#[derive(Debug, Clone)]
pub struct JsonlHistoryStore {
    path: PathBuf,
}

impl JsonlHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl HistoryStore for JsonlHistoryStore {
    fn append(&self, entry: &HistoryEntry) -> Result<(), AppError> {
        let fail = |what: &str, e: &dyn std::fmt::Display| {
            AppError::History(format!("{what} '{}': {e}", self.path.display()))
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| fail("Failed to create directory for", &e))?;
        }
        let line = serde_json::to_string(entry).map_err(|e| fail("Failed to encode entry for", &e))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| fail("Failed to open", &e))?;
        writeln!(file, "{line}").map_err(|e| fail("Failed to append to", &e))?;

        debug!(path = %self.path.display(), "appended history entry");
        Ok(())
    }

    fn recent(&self, n: usize) -> Result<Vec<HistoryEntry>, AppError> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::History(format!(
                    "Failed to open '{}': {e}",
                    self.path.display()
                )));
            }
        };

        let mut entries = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                AppError::History(format!("Failed to read '{}': {e}", self.path.display()))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(line = idx + 1, error = %e, "skipping unreadable history line"),
            }
        }

        Ok(entries.into_iter().rev().take(n).collect())
    }
}

/// In-process store, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn append(&self, entry: &HistoryEntry) -> Result<(), AppError> {
        self.entries
            .lock()
            .map_err(|_| AppError::History("history lock poisoned".into()))?
            .push(entry.clone());
        Ok(())
    }

    fn recent(&self, n: usize) -> Result<Vec<HistoryEntry>, AppError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| AppError::History("history lock poisoned".into()))?;
        Ok(entries.iter().rev().take(n).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(city: &str, price: f64, minute: u32) -> HistoryEntry {
        HistoryEntry {
            city: Some(city.to_string()),
            property_type: Some("Apartment".into()),
            room_type: Some("Private room".into()),
            accommodates: Some(2),
            price,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
        }
    }

    #[test]
    fn jsonl_store_returns_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlHistoryStore::new(dir.path().join("logs").join(HISTORY_FILE));

        assert!(store.recent(5).unwrap().is_empty());
        store.append(&entry("NYC", 120.0, 0)).unwrap();
        store.append(&entry("LA", 95.5, 1)).unwrap();
        store.append(&entry("SF", 210.25, 2)).unwrap();

        let recent = store.recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0], entry("SF", 210.25, 2));
        assert_eq!(recent[1].city.as_deref(), Some("LA"));
    }

    #[test]
    fn corrupt_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(HISTORY_FILE);
        let store = JsonlHistoryStore::new(&path);
        store.append(&entry("NYC", 1.0, 0)).unwrap();
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "{{not json").unwrap();
        drop(f);
        store.append(&entry("DC", 2.0, 1)).unwrap();

        let all = store.recent(10).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].city.as_deref(), Some("DC"));
    }

    #[test]
    fn timestamp_is_rfc3339_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(HISTORY_FILE);
        JsonlHistoryStore::new(&path).append(&entry("NYC", 1.0, 5)).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"2024-05-01T12:05:00Z\""), "{text}");
    }

    #[test]
    fn entry_from_record_parses_accommodates() {
        let rec = RawRecord::from_pairs([("city", "Boston"), ("accommodates", "3.0")]);
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let e = HistoryEntry::from_record(&rec, 80.0, ts);
        assert_eq!(e.accommodates, Some(3));
        assert_eq!(e.room_type, None);
    }

    #[test]
    fn memory_store_behaves_like_a_stack() {
        let store = MemoryHistoryStore::new();
        store.append(&entry("A", 1.0, 0)).unwrap();
        store.append(&entry("B", 2.0, 1)).unwrap();
        let names: Vec<_> = store
            .recent(5)
            .unwrap()
            .into_iter()
            .map(|e| e.city.unwrap())
            .collect();
        assert_eq!(names, ["B", "A"]);
    }
}
