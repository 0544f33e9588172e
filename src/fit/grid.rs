//! Typed hyperparameter grids.
//!
//! A grid holds candidate value lists for one model kind and expands them into
//! concrete [`Hyperparams`]. Expansion order is fixed: parameters are nested in
//! alphabetical order of their names, the last one varying fastest. Grid search
//! breaks score ties by this order, so it is part of the contract.

use crate::models::{
    BoostingParams, ElasticNetParams, ForestParams, Hyperparams, ModelKind, PenaltyParams,
};

#[derive(Debug, Clone, PartialEq)]
pub enum HyperGrid {
    /// No search; the candidate trains with its defaults.
    Empty,
    Lasso {
        alpha: Vec<f64>,
    },
    Ridge {
        alpha: Vec<f64>,
    },
    ElasticNet {
        alpha: Vec<f64>,
        l1_ratio: Vec<f64>,
    },
    RandomForest {
        max_depth: Vec<Option<usize>>,
        min_samples_split: Vec<usize>,
        n_estimators: Vec<usize>,
    },
    GradientBoosting {
        learning_rate: Vec<f64>,
        max_depth: Vec<usize>,
        n_estimators: Vec<usize>,
    },
}

impl HyperGrid {
    /// Model kind the grid belongs to; `None` for [`HyperGrid::Empty`].
    pub fn kind(&self) -> Option<ModelKind> {
        match self {
            HyperGrid::Empty => None,
            HyperGrid::Lasso { .. } => Some(ModelKind::Lasso),
            HyperGrid::Ridge { .. } => Some(ModelKind::Ridge),
            HyperGrid::ElasticNet { .. } => Some(ModelKind::ElasticNet),
            HyperGrid::RandomForest { .. } => Some(ModelKind::RandomForestRegressor),
            HyperGrid::GradientBoosting { .. } => Some(ModelKind::GradientBoostingRegressor),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            HyperGrid::Empty => 0,
            HyperGrid::Lasso { alpha } | HyperGrid::Ridge { alpha } => alpha.len(),
            HyperGrid::ElasticNet { alpha, l1_ratio } => alpha.len() * l1_ratio.len(),
            HyperGrid::RandomForest {
                max_depth,
                min_samples_split,
                n_estimators,
            } => max_depth.len() * min_samples_split.len() * n_estimators.len(),
            HyperGrid::GradientBoosting {
                learning_rate,
                max_depth,
                n_estimators,
            } => learning_rate.len() * max_depth.len() * n_estimators.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cartesian product of the value lists.
    pub fn combinations(&self) -> Vec<Hyperparams> {
        let mut out = Vec::with_capacity(self.len());
        match self {
            HyperGrid::Empty => {}
            HyperGrid::Lasso { alpha } => {
                out.extend(alpha.iter().map(|&a| Hyperparams::Lasso(PenaltyParams { alpha: a })));
            }
            HyperGrid::Ridge { alpha } => {
                out.extend(alpha.iter().map(|&a| Hyperparams::Ridge(PenaltyParams { alpha: a })));
            }
            HyperGrid::ElasticNet { alpha, l1_ratio } => {
                for &a in alpha {
                    for &r in l1_ratio {
                        out.push(Hyperparams::ElasticNet(ElasticNetParams {
                            alpha: a,
                            l1_ratio: r,
                        }));
                    }
                }
            }
            HyperGrid::RandomForest {
                max_depth,
                min_samples_split,
                n_estimators,
            } => {
                for &d in max_depth {
                    for &s in min_samples_split {
                        for &n in n_estimators {
                            out.push(Hyperparams::RandomForest(ForestParams {
                                n_estimators: n,
                                max_depth: d,
                                min_samples_split: s,
                            }));
                        }
                    }
                }
            }
            HyperGrid::GradientBoosting {
                learning_rate,
                max_depth,
                n_estimators,
            } => {
                for &lr in learning_rate {
                    for &d in max_depth {
                        for &n in n_estimators {
                            out.push(Hyperparams::GradientBoosting(BoostingParams {
                                n_estimators: n,
                                learning_rate: lr,
                                max_depth: d,
                            }));
                        }
                    }
                }
            }
        }
        out
    }
}
