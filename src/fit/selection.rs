//! Model selection over a fixed catalog of candidates.
//!
//! Per candidate:
//! 1. grid search with 3-fold CV on train (skipped when the grid is empty)
//! 2. fit the chosen hyperparameters on the full train subset
//! 3. 5-fold CV R² on train; this is the selection score
//! 4. validation / test R² and test RMSE, for diagnostics only
//!
//! Selection rules:
//! 1. A candidate that fails, or scores non-finite, is recorded and excluded
//! 2. Choose the maximum selection score
//! 3. Ties go to the candidate listed first in the catalog

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::CatalogKind;
use crate::error::AppError;
use crate::fit::cv::cross_val_score;
use crate::fit::grid::HyperGrid;
use crate::math::{r2_score, rmse};
use crate::models::{FittedModel, Hyperparams, ModelKind, fit};
use crate::transform::TransformedSet;

/// Folds used while searching a grid.
pub const SEARCH_FOLDS: usize = 3;
/// Folds used for the selection score.
pub const SCORE_FOLDS: usize = 5;

/// An untrained catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCandidate {
    pub name: String,
    pub defaults: Hyperparams,
    pub grid: HyperGrid,
}

impl ModelCandidate {
    pub fn new(defaults: Hyperparams, grid: HyperGrid) -> Self {
        Self {
            name: defaults.kind().display_name().to_string(),
            defaults,
            grid,
        }
    }

    fn check(&self) -> Result<(), String> {
        match self.grid.kind() {
            Some(kind) if kind != self.defaults.kind() => Err(format!(
                "grid for {} attached to a {} candidate",
                kind.display_name(),
                self.defaults.kind().display_name()
            )),
            _ => Ok(()),
        }
    }
}

/// Ordered list of candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub candidates: Vec<ModelCandidate>,
}

impl Catalog {
    pub fn for_kind(kind: CatalogKind) -> Self {
        match kind {
            CatalogKind::Standard => Self::standard(),
            CatalogKind::Quick => Self::quick(),
        }
    }

    /// The full catalog with its search grids.
    pub fn standard() -> Self {
        let alphas = vec![0.1, 1.0, 10.0];
        Self {
            candidates: vec![
                ModelCandidate::new(
                    Hyperparams::defaults(ModelKind::LinearRegression),
                    HyperGrid::Empty,
                ),
                ModelCandidate::new(
                    Hyperparams::defaults(ModelKind::Lasso),
                    HyperGrid::Lasso {
                        alpha: alphas.clone(),
                    },
                ),
                ModelCandidate::new(
                    Hyperparams::defaults(ModelKind::Ridge),
                    HyperGrid::Ridge {
                        alpha: alphas.clone(),
                    },
                ),
                ModelCandidate::new(
                    Hyperparams::defaults(ModelKind::ElasticNet),
                    HyperGrid::ElasticNet {
                        alpha: alphas,
                        l1_ratio: vec![0.1, 0.5, 0.9],
                    },
                ),
                ModelCandidate::new(
                    Hyperparams::defaults(ModelKind::RandomForestRegressor),
                    HyperGrid::RandomForest {
                        max_depth: vec![Some(10), Some(20), None],
                        min_samples_split: vec![2, 5],
                        n_estimators: vec![50, 100, 200],
                    },
                ),
                ModelCandidate::new(
                    Hyperparams::defaults(ModelKind::GradientBoostingRegressor),
                    HyperGrid::GradientBoosting {
                        learning_rate: vec![0.05, 0.1, 0.2],
                        max_depth: vec![3, 5, 8],
                        n_estimators: vec![50, 100, 200],
                    },
                ),
            ],
        }
    }

    /// Same families with small grids and ensembles.
    pub fn quick() -> Self {
        Self {
            candidates: vec![
                ModelCandidate::new(
                    Hyperparams::defaults(ModelKind::LinearRegression),
                    HyperGrid::Empty,
                ),
                ModelCandidate::new(
                    Hyperparams::defaults(ModelKind::Lasso),
                    HyperGrid::Lasso {
                        alpha: vec![0.01, 0.1],
                    },
                ),
                ModelCandidate::new(
                    Hyperparams::defaults(ModelKind::Ridge),
                    HyperGrid::Ridge {
                        alpha: vec![0.1, 1.0],
                    },
                ),
                ModelCandidate::new(
                    Hyperparams::defaults(ModelKind::ElasticNet),
                    HyperGrid::ElasticNet {
                        alpha: vec![0.01, 0.1],
                        l1_ratio: vec![0.5],
                    },
                ),
                ModelCandidate::new(
                    Hyperparams::defaults(ModelKind::RandomForestRegressor),
                    HyperGrid::RandomForest {
                        max_depth: vec![Some(6), None],
                        min_samples_split: vec![2],
                        n_estimators: vec![10],
                    },
                ),
                ModelCandidate::new(
                    Hyperparams::defaults(ModelKind::GradientBoostingRegressor),
                    HyperGrid::GradientBoosting {
                        learning_rate: vec![0.1],
                        max_depth: vec![3],
                        n_estimators: vec![30],
                    },
                ),
            ],
        }
    }
}

/// Candidate name to selection score, in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationReport {
    entries: Vec<(String, f64)>,
}

impl EvaluationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a score; re-recording a name replaces its score in place.
    pub fn insert(&mut self, name: impl Into<String>, score: f64) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = score,
            None => self.entries.push((name, score)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, s)| *s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(n, s)| (n.as_str(), *s))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest score; the earliest entry wins ties.
    pub fn select_best(&self) -> Result<(&str, f64), AppError> {
        let mut best: Option<(&str, f64)> = None;
        for (name, score) in self.iter() {
            if best.is_none_or(|(_, b)| score > b) {
                best = Some((name, score));
            }
        }
        best.ok_or_else(|| AppError::training("no candidate scores to select from"))
    }
}

/// Everything measured for one successfully trained candidate.
#[derive(Debug, Clone)]
pub struct CandidateOutcome {
    pub name: String,
    pub params: Hyperparams,
    /// Mean 5-fold CV R² on train.
    pub cv_score: f64,
    pub validation_r2: Option<f64>,
    pub test_r2: Option<f64>,
    pub test_rmse: Option<f64>,
    pub model: FittedModel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFailure {
    pub name: String,
    pub reason: String,
}

/// Output of [`select`].
#[derive(Debug, Clone)]
pub struct Selection {
    pub best: CandidateOutcome,
    pub report: EvaluationReport,
    /// Successful candidates in catalog order.
    pub outcomes: Vec<CandidateOutcome>,
    pub failures: Vec<CandidateFailure>,
}

/// Train every candidate and return the best one.
///
/// Candidates and grid trials run in parallel; aggregation waits for all of
/// them, so the result does not depend on scheduling.
pub fn select(
    catalog: &Catalog,
    train: &TransformedSet,
    validation: &TransformedSet,
    test: &TransformedSet,
    seed: u64,
) -> Result<Selection, AppError> {
    if catalog.candidates.is_empty() {
        return Err(AppError::training("model catalog is empty"));
    }
    if train.n_rows() < SCORE_FOLDS {
        return Err(AppError::training(format!(
            "need at least {SCORE_FOLDS} train rows, got {}",
            train.n_rows()
        )));
    }

    let results: Vec<Result<CandidateOutcome, String>> = catalog
        .candidates
        .par_iter()
        .map(|c| evaluate_candidate(c, train, validation, test, seed))
        .collect();

    let mut report = EvaluationReport::new();
    let mut outcomes = Vec::new();
    let mut failures = Vec::new();
    for (candidate, result) in catalog.candidates.iter().zip(results) {
        match result {
            Ok(outcome) => {
                info!(
                    candidate = %outcome.name,
                    params = %outcome.params,
                    cv_r2 = outcome.cv_score,
                    "candidate scored"
                );
                report.insert(outcome.name.clone(), outcome.cv_score);
                outcomes.push(outcome);
            }
            Err(reason) => {
                warn!(candidate = %candidate.name, %reason, "candidate failed");
                failures.push(CandidateFailure {
                    name: candidate.name.clone(),
                    reason,
                });
            }
        }
    }

    if report.is_empty() {
        let reasons: Vec<String> = failures
            .iter()
            .map(|f| format!("{}: {}", f.name, f.reason))
            .collect();
        return Err(AppError::training(format!(
            "every candidate failed ({})",
            reasons.join("; ")
        )));
    }

    let (best_name, best_score) = report.select_best()?;
    let best = outcomes
        .iter()
        .find(|o| o.name == best_name)
        .cloned()
        .ok_or_else(|| AppError::candidate(best_name, "selected candidate has no trained model"))?;
    info!(model = %best.name, cv_r2 = best_score, "selected model");

    Ok(Selection {
        best,
        report,
        outcomes,
        failures,
    })
}

fn evaluate_candidate(
    candidate: &ModelCandidate,
    train: &TransformedSet,
    validation: &TransformedSet,
    test: &TransformedSet,
    seed: u64,
) -> Result<CandidateOutcome, String> {
    candidate.check()?;

    let params = if candidate.grid.is_empty() {
        candidate.defaults
    } else {
        grid_search(&candidate.grid, train, seed)?
    };
    debug!(candidate = %candidate.name, %params, "hyperparameters fixed");

    let model = fit(&params, &train.features, &train.target, seed)?;
    let cv_score = cross_val_score(&params, train, SCORE_FOLDS, seed)?;

    let score_on = |set: &TransformedSet| {
        (set.n_rows() > 0).then(|| {
            let pred = model.predict(&set.features);
            (
                r2_score(set.target.as_slice(), pred.as_slice()),
                rmse(set.target.as_slice(), pred.as_slice()),
            )
        })
    };
    let validation_r2 = score_on(validation).map(|(r2, _)| r2);
    let test_scores = score_on(test);

    Ok(CandidateOutcome {
        name: candidate.name.clone(),
        params,
        cv_score,
        validation_r2,
        test_r2: test_scores.map(|(r2, _)| r2),
        test_rmse: test_scores.map(|(_, e)| e),
        model,
    })
}

/// Exhaustive search; the first combination wins ties and failing
/// combinations are skipped.
fn grid_search(grid: &HyperGrid, train: &TransformedSet, seed: u64) -> Result<Hyperparams, String> {
    let combos = grid.combinations();
    let scores: Vec<Result<f64, String>> = combos
        .par_iter()
        .map(|p| cross_val_score(p, train, SEARCH_FOLDS, seed))
        .collect();

    let mut best: Option<(usize, f64)> = None;
    let mut last_error = None;
    for (i, score) in scores.into_iter().enumerate() {
        match score {
            Ok(s) if best.is_none_or(|(_, b)| s > b) => best = Some((i, s)),
            Ok(_) => {}
            Err(e) => last_error = Some(e),
        }
    }

    match best {
        Some((i, _)) => Ok(combos[i]),
        None => Err(last_error.unwrap_or_else(|| "grid search produced no scores".into())),
    }
}
