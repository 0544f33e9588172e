//! Regression estimators behind one tagged-variant interface.
//!
//! `Hyperparams` says what to train, [`fit`] trains it and `FittedModel`
//! predicts. Adding an estimator means one more variant in each enum.

use std::fmt;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

pub mod ensemble;
pub mod linear;
pub mod tree;

pub use ensemble::{BoostingModel, ForestModel};
pub use linear::LinearModel;
pub use tree::{Tree, TreeParams};

/// Estimator families in catalog order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    LinearRegression,
    Lasso,
    Ridge,
    ElasticNet,
    RandomForestRegressor,
    GradientBoostingRegressor,
}

impl ModelKind {
    pub const ALL: [ModelKind; 6] = [
        ModelKind::LinearRegression,
        ModelKind::Lasso,
        ModelKind::Ridge,
        ModelKind::ElasticNet,
        ModelKind::RandomForestRegressor,
        ModelKind::GradientBoostingRegressor,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::LinearRegression => "LinearRegression",
            ModelKind::Lasso => "Lasso",
            ModelKind::Ridge => "Ridge",
            ModelKind::ElasticNet => "ElasticNet",
            ModelKind::RandomForestRegressor => "RandomForestRegressor",
            ModelKind::GradientBoostingRegressor => "GradientBoostingRegressor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenaltyParams {
    pub alpha: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElasticNetParams {
    pub alpha: f64,
    pub l1_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    /// `None` grows trees until leaves are pure.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
}

/// One concrete hyperparameter assignment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Hyperparams {
    LinearRegression,
    Lasso(PenaltyParams),
    Ridge(PenaltyParams),
    ElasticNet(ElasticNetParams),
    RandomForest(ForestParams),
    GradientBoosting(BoostingParams),
}

impl Hyperparams {
    /// Library defaults for `kind`.
    pub fn defaults(kind: ModelKind) -> Self {
        match kind {
            ModelKind::LinearRegression => Hyperparams::LinearRegression,
            ModelKind::Lasso => Hyperparams::Lasso(PenaltyParams { alpha: 1.0 }),
            ModelKind::Ridge => Hyperparams::Ridge(PenaltyParams { alpha: 1.0 }),
            ModelKind::ElasticNet => Hyperparams::ElasticNet(ElasticNetParams {
                alpha: 1.0,
                l1_ratio: 0.5,
            }),
            ModelKind::RandomForestRegressor => Hyperparams::RandomForest(ForestParams {
                n_estimators: 100,
                max_depth: None,
                min_samples_split: 2,
            }),
            ModelKind::GradientBoostingRegressor => Hyperparams::GradientBoosting(BoostingParams {
                n_estimators: 100,
                learning_rate: 0.1,
                max_depth: 3,
            }),
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Hyperparams::LinearRegression => ModelKind::LinearRegression,
            Hyperparams::Lasso(_) => ModelKind::Lasso,
            Hyperparams::Ridge(_) => ModelKind::Ridge,
            Hyperparams::ElasticNet(_) => ModelKind::ElasticNet,
            Hyperparams::RandomForest(_) => ModelKind::RandomForestRegressor,
            Hyperparams::GradientBoosting(_) => ModelKind::GradientBoostingRegressor,
        }
    }
}

impl fmt::Display for Hyperparams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hyperparams::LinearRegression => write!(f, "-"),
            Hyperparams::Lasso(p) | Hyperparams::Ridge(p) => write!(f, "alpha={}", p.alpha),
            Hyperparams::ElasticNet(p) => write!(f, "alpha={}, l1_ratio={}", p.alpha, p.l1_ratio),
            Hyperparams::RandomForest(p) => {
                let depth = p.max_depth.map_or("None".to_string(), |d| d.to_string());
                write!(
                    f,
                    "n_estimators={}, max_depth={depth}, min_samples_split={}",
                    p.n_estimators, p.min_samples_split
                )
            }
            Hyperparams::GradientBoosting(p) => write!(
                f,
                "n_estimators={}, learning_rate={}, max_depth={}",
                p.n_estimators, p.learning_rate, p.max_depth
            ),
        }
    }
}

/// A trained estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedModel {
    Linear(LinearModel),
    RandomForest(ForestModel),
    GradientBoosting(BoostingModel),
}

impl FittedModel {
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        match self {
            FittedModel::Linear(m) => m.predict_row(row),
            FittedModel::RandomForest(m) => m.predict_row(row),
            FittedModel::GradientBoosting(m) => m.predict_row(row),
        }
    }

    pub fn predict(&self, x: &DMatrix<f64>) -> DVector<f64> {
        match self {
            FittedModel::Linear(m) => m.predict(x),
            FittedModel::RandomForest(m) => m.predict(x),
            FittedModel::GradientBoosting(m) => m.predict(x),
        }
    }

    /// Check a deserialized model against the feature width it will be fed.
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        match self {
            FittedModel::Linear(m) => {
                if m.coefficients.len() != n_features {
                    return Err(format!(
                        "model has {} coefficients, transformer produces {n_features} features",
                        m.coefficients.len()
                    ));
                }
                if !m.intercept.is_finite() || m.coefficients.iter().any(|w| !w.is_finite()) {
                    return Err("model has non-finite coefficients".into());
                }
                Ok(())
            }
            FittedModel::RandomForest(m) => validate_trees(&m.trees, n_features),
            FittedModel::GradientBoosting(m) => {
                if !(m.init.is_finite() && m.learning_rate.is_finite()) {
                    return Err("boosting scalars are not finite".into());
                }
                validate_trees(&m.trees, n_features)
            }
        }
    }
}

fn validate_trees(trees: &[Tree], n_features: usize) -> Result<(), String> {
    if trees.is_empty() {
        return Err("ensemble has no trees".into());
    }
    for (i, t) in trees.iter().enumerate() {
        t.validate(n_features).map_err(|e| format!("tree {i}: {e}"))?;
    }
    Ok(())
}

/// Train the estimator described by `params`.
///
/// `seed` only affects the forest's bootstrap samples.
pub fn fit(
    params: &Hyperparams,
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    seed: u64,
) -> Result<FittedModel, String> {
    let model = match *params {
        Hyperparams::LinearRegression => FittedModel::Linear(linear::fit_ols(x, y)?),
        Hyperparams::Lasso(p) => FittedModel::Linear(linear::fit_lasso(x, y, p.alpha)?),
        Hyperparams::Ridge(p) => FittedModel::Linear(linear::fit_ridge(x, y, p.alpha)?),
        Hyperparams::ElasticNet(p) => {
            FittedModel::Linear(linear::fit_elastic_net(x, y, p.alpha, p.l1_ratio)?)
        }
        Hyperparams::RandomForest(p) => FittedModel::RandomForest(ForestModel::fit(
            x,
            y,
            p.n_estimators,
            TreeParams {
                max_depth: p.max_depth,
                min_samples_split: p.min_samples_split,
            },
            seed,
        )?),
        Hyperparams::GradientBoosting(p) => FittedModel::GradientBoosting(BoostingModel::fit(
            x,
            y,
            p.n_estimators,
            p.learning_rate,
            p.max_depth,
        )?),
    };
    Ok(model)
}
