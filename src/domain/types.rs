//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - produced by CSV/JSON ingest
//! - carried through split and transformation
//! - converted from CLI arguments without the library depending on clap parsing

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// One listing row as raw cell text, keyed by column name.
///
/// An empty (or whitespace-only) cell is a missing value. A column that is not
/// present at all is indistinguishable from a missing cell at this level; the
/// dataset header records which columns the source actually had.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    cells: BTreeMap<String, String>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            cells: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Trimmed cell value; `None` when absent or blank.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .get(column)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Raw cell text without trimming, for round-tripping to CSV.
    pub fn raw(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.cells.insert(column.into(), value.into());
    }

    pub fn contains(&self, column: &str) -> bool {
        self.cells.contains_key(column)
    }
}

/// A header plus its rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub records: Vec<RawRecord>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, records: Vec<RawRecord>) -> Self {
        Self { columns, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Same header, different rows.
    pub fn with_records(&self, records: Vec<RawRecord>) -> Self {
        Self {
            columns: self.columns.clone(),
            records,
        }
    }
}

/// Train / validation / test fractions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitRatios {
    pub train: f64,
    pub validation: f64,
    pub test: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.6,
            validation: 0.2,
            test: 0.2,
        }
    }
}

impl SplitRatios {
    pub fn validate(&self) -> Result<(), AppError> {
        let parts = [self.train, self.validation, self.test];
        if parts.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(AppError::Config(format!(
                "Split ratios must be positive, got {:?}.",
                parts
            )));
        }
        let total: f64 = parts.iter().sum();
        if (total - 1.0).abs() > 1e-9 {
            return Err(AppError::Config(format!(
                "Split ratios must sum to 1, got {total}."
            )));
        }
        Ok(())
    }
}

/// Which model catalog to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    /// Full grids for every model family.
    Standard,
    /// Small grids and ensembles, for smoke runs.
    Quick,
}

/// Resolved options for `lp train`.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub data_path: PathBuf,
    pub artifact_dir: PathBuf,
    pub schema_path: Option<PathBuf>,
    pub seed: u64,
    pub ratios: SplitRatios,
    pub catalog: CatalogKind,
    /// Train rows with a target above this quantile are dropped.
    pub outlier_quantile: f64,
    /// Also write raw/train/val/test CSVs next to the artifacts.
    pub write_splits: bool,
}

/// Resolved options for `lp predict`.
#[derive(Debug, Clone)]
pub struct PredictConfig {
    pub artifact_dir: PathBuf,
    pub record_json: Option<String>,
    pub input_csv: Option<PathBuf>,
    pub history_path: PathBuf,
    pub record_history: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_record_treats_blank_as_missing() {
        let rec = RawRecord::from_pairs([("city", " NYC "), ("beds", "  ")]);
        assert_eq!(rec.get("city"), Some("NYC"));
        assert_eq!(rec.get("beds"), None);
        assert_eq!(rec.raw("beds"), Some("  "));
        assert_eq!(rec.get("bedrooms"), None);
        assert!(rec.contains("beds"));
    }

    #[test]
    fn default_ratios_are_valid() {
        SplitRatios::default().validate().unwrap();
        let bad = SplitRatios {
            train: 0.7,
            validation: 0.2,
            test: 0.2,
        };
        assert!(bad.validate().is_err());
        let negative = SplitRatios {
            train: 1.2,
            validation: -0.1,
            test: -0.1,
        };
        assert!(negative.validate().is_err());
    }
}
