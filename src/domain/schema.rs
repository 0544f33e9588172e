//! The fixed listing schema and its closed vocabularies.
//!
//! The schema is data, not code: it is read from a versioned JSON file so a
//! vocabulary change does not need a rebuild. A copy of `config/schema.json`
//! is embedded at build time and used unless a path is supplied.
//!
//! Column order here is the feature order of every transformed vector:
//! numeric columns first, then categorical columns, each in file order.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

const BUILTIN_SCHEMA: &str = include_str!("../../config/schema.json");

/// Ordinal code for a value outside the closed vocabulary.
pub const UNKNOWN_CODE: f64 = -1.0;

/// How the raw text of a numeric column becomes a number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericParse {
    /// Plain decimal text.
    #[default]
    Plain,
    /// Percentage text such as `"95%"`.
    Percent,
    /// Comma-joined list; the value is the number of entries.
    Count,
}

/// Canonical spelling for boolean-like categorical columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoolStyle {
    /// `True` / `False`
    Title,
    /// `t` / `f`
    Letter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericColumn {
    pub name: String,
    #[serde(default)]
    pub parse: NumericParse,
    /// Backfill value when the column is absent from a dataset.
    /// `None` backfills a missing value, which the imputer then fills.
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub name: String,
    pub vocabulary: Vec<String>,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub boolean: Option<BoolStyle>,
}

impl CategoricalColumn {
    /// Position of `value` in the vocabulary, or [`UNKNOWN_CODE`].
    pub fn encode(&self, value: &str) -> f64 {
        self.vocabulary
            .iter()
            .position(|v| v == value)
            .map_or(UNKNOWN_CODE, |i| i as f64)
    }
}

/// Partition of the input columns plus the closed vocabularies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub version: String,
    pub target: String,
    pub numeric: Vec<NumericColumn>,
    pub categorical: Vec<CategoricalColumn>,
}

impl FeatureSpec {
    /// The schema embedded at build time.
    pub fn builtin() -> Result<Self, AppError> {
        Self::from_json_str(BUILTIN_SCHEMA)
    }

    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let text = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read schema '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Load from `path` when given, otherwise fall back to the embedded schema.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        match path {
            Some(p) => Self::from_path(p),
            None => Self::builtin(),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, AppError> {
        let spec: FeatureSpec = serde_json::from_str(text)
            .map_err(|e| AppError::Config(format!("Invalid schema JSON: {e}")))?;
        spec.validate()?;
        Ok(spec)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.numeric.is_empty() && self.categorical.is_empty() {
            return Err(AppError::Config("Schema declares no feature columns.".into()));
        }

        let mut seen = HashSet::new();
        let names = self
            .numeric
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.categorical.iter().map(|c| c.name.as_str()))
            .chain(std::iter::once(self.target.as_str()));
        for name in names {
            if !seen.insert(name) {
                return Err(AppError::Config(format!("Schema column `{name}` is declared twice.")));
            }
        }

        for col in &self.categorical {
            if col.vocabulary.is_empty() {
                return Err(AppError::Config(format!(
                    "Categorical column `{}` has an empty vocabulary.",
                    col.name
                )));
            }
            let unique: HashSet<&str> = col.vocabulary.iter().map(String::as_str).collect();
            if unique.len() != col.vocabulary.len() {
                return Err(AppError::Config(format!(
                    "Categorical column `{}` repeats a vocabulary value.",
                    col.name
                )));
            }
        }
        Ok(())
    }

    /// Number of slots in a transformed vector.
    pub fn width(&self) -> usize {
        self.numeric.len() + self.categorical.len()
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.numeric
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.categorical.iter().map(|c| c.name.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_schema_matches_listing_layout() {
        let spec = FeatureSpec::builtin().unwrap();
        assert_eq!(spec.target, "log_price");
        assert_eq!(spec.numeric.len(), 10);
        assert_eq!(spec.categorical.len(), 9);
        assert_eq!(spec.width(), 19);

        let names = spec.feature_names();
        assert_eq!(names[0], "amenities");
        assert_eq!(names[10], "property_type");
        assert_eq!(names[18], "host_has_profile_pic");

        let city = spec.categorical.iter().find(|c| c.name == "city").unwrap();
        assert_eq!(city.vocabulary, ["NYC", "SF", "DC", "LA", "Chicago", "Boston"]);

        let property = &spec.categorical[0];
        assert_eq!(property.vocabulary.len(), 88);
    }

    #[test]
    fn encode_uses_declared_order_and_sentinel() {
        let spec = FeatureSpec::builtin().unwrap();
        let bed = spec.categorical.iter().find(|c| c.name == "bed_type").unwrap();
        assert_eq!(bed.encode("Real Bed"), 0.0);
        assert_eq!(bed.encode("Couch"), 4.0);
        assert_eq!(bed.encode("Hammock"), UNKNOWN_CODE);
        assert_eq!(bed.encode("real bed"), UNKNOWN_CODE);
    }

    #[test]
    fn rejects_duplicate_vocabulary_entries() {
        let text = r#"{
            "version": "t",
            "target": "y",
            "numeric": [],
            "categorical": [{ "name": "c", "vocabulary": ["a", "a"] }]
        }"#;
        let err = FeatureSpec::from_json_str(text).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn rejects_duplicate_columns() {
        let text = r#"{
            "version": "t",
            "target": "x",
            "numeric": [{ "name": "x" }],
            "categorical": []
        }"#;
        assert!(FeatureSpec::from_json_str(text).is_err());
    }
}
