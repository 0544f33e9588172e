//! Fit-once feature transformation.
//!
//! The transformer learns, from the train subset only:
//! - the target cap (train rows above it are dropped before anything else)
//! - per numeric column: median (imputation), mean and scale
//! - per categorical column: mode (imputation), mean and scale of the ordinal code
//!
//! After `fit` the parameters are frozen; `apply` and `transform_record` only
//! read them.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{Dataset, FeatureSpec, RawRecord};
use crate::error::AppError;
use crate::math::{mean, median, mode, quantile, std_dev};
use crate::transform::prepare::{PreparedRow, prepare_dataset, prepare_record};

/// Default quantile above which train targets are treated as outliers.
pub const DEFAULT_OUTLIER_QUANTILE: f64 = 0.99;

/// Statistics learned from the train subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedParams {
    pub numeric_medians: Vec<f64>,
    pub numeric_means: Vec<f64>,
    pub numeric_scales: Vec<f64>,
    pub categorical_modes: Vec<String>,
    pub categorical_means: Vec<f64>,
    pub categorical_scales: Vec<f64>,
    /// Train targets strictly above this value were dropped.
    pub target_cap: f64,
    /// Train rows that survived the cap.
    pub train_rows: usize,
}

/// Which subset is being transformed. Only `Train` is outlier-filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subset {
    Train,
    Validation,
    Test,
}

/// Numeric arrays for one subset.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedSet {
    pub features: DMatrix<f64>,
    pub target: DVector<f64>,
}

impl TransformedSet {
    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Rows at `indices`, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.select_rows(indices),
            target: self.target.select_rows(indices),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTransformer {
    spec: FeatureSpec,
    outlier_quantile: f64,
    fitted: Option<FittedParams>,
}

impl FeatureTransformer {
    pub fn new(spec: FeatureSpec) -> Self {
        Self {
            spec,
            outlier_quantile: DEFAULT_OUTLIER_QUANTILE,
            fitted: None,
        }
    }

    pub fn with_outlier_quantile(mut self, q: f64) -> Self {
        self.outlier_quantile = q;
        self
    }

    pub fn spec(&self) -> &FeatureSpec {
        &self.spec
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Frozen statistics, once fitted.
    pub fn params(&self) -> Option<&FittedParams> {
        self.fitted.as_ref()
    }

    /// Forget fitted statistics so `fit` may run again.
    pub fn reset(&mut self) {
        self.fitted = None;
    }

    /// Learn all statistics from `train`.
    pub fn fit(&mut self, train: &Dataset) -> Result<(), AppError> {
        if self.fitted.is_some() {
            return Err(AppError::transformation(
                "transformer is already fitted; call reset() before fitting again",
            ));
        }
        if !(self.outlier_quantile > 0.0 && self.outlier_quantile <= 1.0) {
            return Err(AppError::Config(format!(
                "Outlier quantile must be in (0, 1], got {}.",
                self.outlier_quantile
            )));
        }

        let rows = prepare_dataset(&self.spec, train, true)?;
        let targets: Vec<f64> = rows.iter().filter_map(|r| r.target).collect();
        let target_cap = quantile(&targets, self.outlier_quantile)
            .ok_or_else(|| AppError::transformation("cannot fit on an empty train subset"))?;

        let kept: Vec<&PreparedRow> = rows
            .iter()
            .filter(|r| r.target.is_some_and(|t| t <= target_cap))
            .collect();
        info!(
            cap = target_cap,
            dropped = rows.len() - kept.len(),
            kept = kept.len(),
            "capped train target"
        );

        let mut params = FittedParams {
            numeric_medians: Vec::with_capacity(self.spec.numeric.len()),
            numeric_means: Vec::with_capacity(self.spec.numeric.len()),
            numeric_scales: Vec::with_capacity(self.spec.numeric.len()),
            categorical_modes: Vec::with_capacity(self.spec.categorical.len()),
            categorical_means: Vec::with_capacity(self.spec.categorical.len()),
            categorical_scales: Vec::with_capacity(self.spec.categorical.len()),
            target_cap,
            train_rows: kept.len(),
        };

        for (j, col) in self.spec.numeric.iter().enumerate() {
            let observed: Vec<f64> = kept.iter().filter_map(|r| r.numeric[j]).collect();
            let fill = median(&observed).unwrap_or_else(|| {
                warn!(column = %col.name, "no observed train values; imputing 0");
                0.0
            });
            let imputed: Vec<f64> = kept.iter().map(|r| r.numeric[j].unwrap_or(fill)).collect();
            let (m, s) = location_scale(&imputed);
            params.numeric_medians.push(fill);
            params.numeric_means.push(m);
            params.numeric_scales.push(s);
        }

        for (j, col) in self.spec.categorical.iter().enumerate() {
            let fill = match mode(kept.iter().filter_map(|r| r.categorical[j].as_deref())) {
                Some(m) => m,
                None => {
                    warn!(column = %col.name, "no observed train values; imputing first vocabulary entry");
                    col.vocabulary.first().cloned().unwrap_or_default()
                }
            };
            let codes: Vec<f64> = kept
                .iter()
                .map(|r| col.encode(r.categorical[j].as_deref().unwrap_or(&fill)))
                .collect();
            let (m, s) = location_scale(&codes);
            params.categorical_modes.push(fill);
            params.categorical_means.push(m);
            params.categorical_scales.push(s);
        }

        debug!(width = self.spec.width(), "fitted feature transformer");
        self.fitted = Some(params);
        Ok(())
    }

    /// Transform a subset with the frozen statistics.
    pub fn apply(&self, dataset: &Dataset, subset: Subset) -> Result<TransformedSet, AppError> {
        let params = self.fitted()?;
        let rows = prepare_dataset(&self.spec, dataset, true)?;

        let rows: Vec<PreparedRow> = match subset {
            Subset::Train => rows
                .into_iter()
                .filter(|r| r.target.is_some_and(|t| t <= params.target_cap))
                .collect(),
            Subset::Validation | Subset::Test => rows,
        };

        let width = self.spec.width();
        let mut features = DMatrix::<f64>::zeros(rows.len(), width);
        let mut target = DVector::<f64>::zeros(rows.len());
        for (i, row) in rows.iter().enumerate() {
            for (j, v) in self.encode(params, row).into_iter().enumerate() {
                features[(i, j)] = v;
            }
            target[i] = row.target.unwrap_or_default();
        }

        debug!(?subset, rows = rows.len(), "transformed subset");
        Ok(TransformedSet { features, target })
    }

    /// Fit on `train` and transform it in one step.
    pub fn fit_transform(&mut self, train: &Dataset) -> Result<TransformedSet, AppError> {
        self.fit(train)?;
        self.apply(train, Subset::Train)
    }

    /// Feature vector for a single record, e.g. one listing to price.
    pub fn transform_record(&self, record: &RawRecord) -> Result<Vec<f64>, AppError> {
        let params = self.fitted()?;
        let row = prepare_record(&self.spec, record, |c| record.contains(c))?;
        Ok(self.encode(params, &row))
    }

    fn fitted(&self) -> Result<&FittedParams, AppError> {
        self.fitted
            .as_ref()
            .ok_or_else(|| AppError::transformation("transformer is not fitted"))
    }

    fn encode(&self, params: &FittedParams, row: &PreparedRow) -> Vec<f64> {
        let numeric = row.numeric.iter().enumerate().map(|(j, v)| {
            let v = v.unwrap_or(params.numeric_medians[j]);
            (v - params.numeric_means[j]) / params.numeric_scales[j]
        });
        let categorical = self.spec.categorical.iter().enumerate().map(|(j, col)| {
            let value = row.categorical[j]
                .as_deref()
                .unwrap_or(&params.categorical_modes[j]);
            (col.encode(value) - params.categorical_means[j]) / params.categorical_scales[j]
        });
        numeric.chain(categorical).collect()
    }
}

/// Mean and population std; a zero or undefined spread scales by 1.
fn location_scale(values: &[f64]) -> (f64, f64) {
    let m = mean(values).unwrap_or(0.0);
    let s = std_dev(values).filter(|s| s.is_finite() && *s > 0.0).unwrap_or(1.0);
    (m, s)
}
