//! Row coercion applied identically to every subset before any statistic is
//! computed.
//!
//! - percent text (`"95%"`) becomes a number
//! - the amenities list becomes an entry count
//! - columns absent from the source are backfilled from the schema default
//! - boolean-like categoricals get one canonical spelling
//!
//! The output keeps missing values as `None`; imputation happens later with
//! frozen train statistics.

use crate::domain::{BoolStyle, CategoricalColumn, Dataset, FeatureSpec, NumericColumn, NumericParse, RawRecord};
use crate::error::AppError;

/// Cell text that means "no value" in listing exports.
const MISSING_MARKERS: [&str; 6] = ["nan", "n/a", "na", "null", "none", "-"];

/// One row after coercion, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRow {
    pub numeric: Vec<Option<f64>>,
    pub categorical: Vec<Option<String>>,
    pub target: Option<f64>,
}

/// Coerce every record of `dataset`.
///
/// With `require_target`, a missing or non-numeric target is an error; the
/// target column must then exist in the header.
pub fn prepare_dataset(
    spec: &FeatureSpec,
    dataset: &Dataset,
    require_target: bool,
) -> Result<Vec<PreparedRow>, AppError> {
    if require_target && !dataset.has_column(&spec.target) {
        return Err(AppError::column(&spec.target, "target column is absent from the dataset"));
    }

    dataset
        .records
        .iter()
        .enumerate()
        .map(|(row, record)| {
            let prepared = prepare_record(spec, record, |c| dataset.has_column(c))
                .map_err(|e| with_row(e, row))?;
            if require_target && prepared.target.is_none() {
                return Err(AppError::column(
                    &spec.target,
                    format!("row {row}: missing target value"),
                ));
            }
            Ok(prepared)
        })
        .collect()
}

/// Coerce one record. `present` says whether the source had a column at all;
/// absent columns take the schema default instead of the cell.
pub fn prepare_record<F>(spec: &FeatureSpec, record: &RawRecord, present: F) -> Result<PreparedRow, AppError>
where
    F: Fn(&str) -> bool,
{
    let numeric = spec
        .numeric
        .iter()
        .map(|col| {
            let cell = cell_or_default(record, &col.name, col.default.as_deref(), &present);
            parse_numeric(col, cell)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let categorical = spec
        .categorical
        .iter()
        .map(|col| {
            let cell = cell_or_default(record, &col.name, col.default.as_deref(), &present);
            coerce_categorical(col, cell)
        })
        .collect();

    let target = match record.get(&spec.target) {
        Some(text) if !is_missing(text) => Some(parse_number(&spec.target, text)?),
        _ => None,
    };

    Ok(PreparedRow {
        numeric,
        categorical,
        target,
    })
}

/// Number of entries in an amenities cell.
///
/// A missing, blank or `{}` cell has no amenities and counts 0. Anything else
/// counts its comma-separated tokens, so a non-empty string counts at least 1.
pub fn count_entries(cell: Option<&str>) -> f64 {
    let Some(text) = cell.map(str::trim) else {
        return 0.0;
    };
    if text.is_empty() || text == "{}" {
        return 0.0;
    }
    text.split(',').count() as f64
}

fn cell_or_default<'a, F>(record: &'a RawRecord, name: &str, default: Option<&'a str>, present: &F) -> Option<&'a str>
where
    F: Fn(&str) -> bool,
{
    if present(name) { record.get(name) } else { default }
}

fn parse_numeric(col: &NumericColumn, cell: Option<&str>) -> Result<Option<f64>, AppError> {
    match col.parse {
        NumericParse::Count => Ok(Some(count_entries(cell))),
        NumericParse::Percent => {
            let Some(text) = cell else { return Ok(None) };
            let stripped = text.trim_end_matches('%').trim();
            if stripped.is_empty() || is_missing(stripped) {
                return Ok(None);
            }
            parse_number(&col.name, stripped).map(Some)
        }
        NumericParse::Plain => match cell {
            Some(text) if !is_missing(text) => parse_number(&col.name, text).map(Some),
            _ => Ok(None),
        },
    }
}

fn parse_number(column: &str, text: &str) -> Result<f64, AppError> {
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(AppError::column(column, format!("value '{text}' is not numeric"))),
    }
}

fn coerce_categorical(col: &CategoricalColumn, cell: Option<&str>) -> Option<String> {
    let text = cell.filter(|t| !is_missing(t))?;
    let Some(style) = col.boolean else {
        return Some(text.to_string());
    };

    let lower = text.to_ascii_lowercase();
    let canonical = match (lower.as_str(), style) {
        ("true" | "t" | "yes", BoolStyle::Title) => "True",
        ("false" | "f" | "no", BoolStyle::Title) => "False",
        ("true" | "t" | "yes", BoolStyle::Letter) => "t",
        ("false" | "f" | "no", BoolStyle::Letter) => "f",
        ("1" | "1.0", _) => "1",
        ("0" | "0.0", _) => "0",
        _ => return Some(text.to_string()),
    };
    Some(canonical.to_string())
}

fn is_missing(text: &str) -> bool {
    MISSING_MARKERS
        .iter()
        .any(|m| text.eq_ignore_ascii_case(m))
}

fn with_row(err: AppError, row: usize) -> AppError {
    match err {
        AppError::Transformation { column, message } => AppError::Transformation {
            column,
            message: format!("row {row}: {message}"),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> FeatureSpec {
        FeatureSpec::builtin().unwrap()
    }

    fn slot(spec: &FeatureSpec, name: &str) -> usize {
        spec.numeric.iter().position(|c| c.name == name).unwrap()
    }

    fn cat_slot(spec: &FeatureSpec, name: &str) -> usize {
        spec.categorical.iter().position(|c| c.name == name).unwrap()
    }

    #[test]
    fn amenities_count_policy() {
        assert_eq!(count_entries(Some("TV,Wifi,Kitchen")), 3.0);
        assert_eq!(count_entries(Some("{TV,Wifi}")), 2.0);
        assert_eq!(count_entries(Some("TV")), 1.0);
        assert_eq!(count_entries(Some("")), 0.0);
        assert_eq!(count_entries(Some("{}")), 0.0);
        assert_eq!(count_entries(None), 0.0);
    }

    #[test]
    fn numeric_amenities_from_json_is_one_entry() {
        let spec = spec();
        let rec = crate::io::record_from_json(r#"{"amenities": 5}"#).unwrap();
        let row = prepare_record(&spec, &rec, |_| true).unwrap();
        assert_eq!(row.numeric[slot(&spec, "amenities")], Some(1.0));

        let rec = crate::io::record_from_json(r#"{"amenities": "TV,Wifi,Kitchen,Heating,Washer"}"#).unwrap();
        let row = prepare_record(&spec, &rec, |_| true).unwrap();
        assert_eq!(row.numeric[slot(&spec, "amenities")], Some(5.0));
    }

    #[test]
    fn percent_is_stripped_and_parsed() {
        let spec = spec();
        let rec = RawRecord::from_pairs([("host_response_rate", "95%")]);
        let row = prepare_record(&spec, &rec, |_| true).unwrap();
        assert_eq!(row.numeric[slot(&spec, "host_response_rate")], Some(95.0));

        let rec = RawRecord::from_pairs([("host_response_rate", "N/A")]);
        let row = prepare_record(&spec, &rec, |_| true).unwrap();
        assert_eq!(row.numeric[slot(&spec, "host_response_rate")], None);
    }

    #[test]
    fn garbage_in_numeric_column_is_a_transformation_error() {
        let spec = spec();
        let rec = RawRecord::from_pairs([("host_response_rate", "fast%")]);
        let err = prepare_record(&spec, &rec, |_| true).unwrap_err();
        match err {
            AppError::Transformation { column, .. } => {
                assert_eq!(column.as_deref(), Some("host_response_rate"));
            }
            other => panic!("unexpected error {other:?}"),
        }

        let rec = RawRecord::from_pairs([("beds", "two")]);
        assert!(prepare_record(&spec, &rec, |_| true).is_err());
    }

    #[test]
    fn absent_columns_take_schema_defaults() {
        let spec = spec();
        let rec = RawRecord::from_pairs([("city", "SF")]);
        let row = prepare_record(&spec, &rec, |c| c == "city").unwrap();

        assert_eq!(row.categorical[cat_slot(&spec, "cleaning_fee")].as_deref(), Some("0"));
        assert_eq!(row.categorical[cat_slot(&spec, "bed_type")].as_deref(), Some("Real Bed"));
        assert_eq!(
            row.categorical[cat_slot(&spec, "cancellation_policy")].as_deref(),
            Some("flexible")
        );
        assert_eq!(row.categorical[cat_slot(&spec, "room_type")], None);
        assert_eq!(row.numeric[slot(&spec, "beds")], None);
    }

    #[test]
    fn present_but_blank_column_is_missing_not_defaulted() {
        let spec = spec();
        let rec = RawRecord::from_pairs([("bed_type", "")]);
        let row = prepare_record(&spec, &rec, |_| true).unwrap();
        assert_eq!(row.categorical[cat_slot(&spec, "bed_type")], None);
    }

    #[test]
    fn booleans_are_canonicalized() {
        let spec = spec();
        let rec = RawRecord::from_pairs([
            ("cleaning_fee", "true"),
            ("instant_bookable", "FALSE"),
            ("host_identity_verified", "t"),
            ("host_has_profile_pic", "1.0"),
        ]);
        let row = prepare_record(&spec, &rec, |_| true).unwrap();
        assert_eq!(row.categorical[cat_slot(&spec, "cleaning_fee")].as_deref(), Some("True"));
        assert_eq!(row.categorical[cat_slot(&spec, "instant_bookable")].as_deref(), Some("f"));
        assert_eq!(row.categorical[cat_slot(&spec, "host_identity_verified")].as_deref(), Some("t"));
        assert_eq!(row.categorical[cat_slot(&spec, "host_has_profile_pic")].as_deref(), Some("1"));
    }

    #[test]
    fn dataset_requires_target_column() {
        let spec = spec();
        let ds = Dataset::new(vec!["city".into()], vec![RawRecord::from_pairs([("city", "LA")])]);
        let err = prepare_dataset(&spec, &ds, true).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(prepare_dataset(&spec, &ds, false).is_ok());
    }

    #[test]
    fn row_index_is_reported() {
        let spec = spec();
        let ds = Dataset::new(
            vec!["beds".into(), "log_price".into()],
            vec![
                RawRecord::from_pairs([("beds", "1"), ("log_price", "4.0")]),
                RawRecord::from_pairs([("beds", "x"), ("log_price", "4.0")]),
            ],
        );
        let err = prepare_dataset(&spec, &ds, true).unwrap_err();
        assert!(err.to_string().contains("row 1"), "{err}");
    }
}
