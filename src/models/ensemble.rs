//! Tree ensembles: bagged random forest and squared-error gradient boosting.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::tree::{Tree, TreeParams};

/// Mean of bootstrapped CART trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    pub trees: Vec<Tree>,
}

/// `init + learning_rate * Σ tree(x)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingModel {
    pub init: f64,
    pub learning_rate: f64,
    pub trees: Vec<Tree>,
}

impl ForestModel {
    /// Grow `n_estimators` trees, each on its own bootstrap sample.
    ///
    /// Tree `i` draws its sample from a generator seeded with `seed + i`, so the
    /// forest does not depend on how rayon schedules the work.
    pub fn fit(
        x: &DMatrix<f64>,
        y: &DVector<f64>,
        n_estimators: usize,
        params: TreeParams,
        seed: u64,
    ) -> Result<Self, String> {
        check_shape(x, y)?;
        if n_estimators == 0 {
            return Err("n_estimators must be at least 1".into());
        }

        let n = x.nrows();
        let y = y.as_slice();
        let trees = (0..n_estimators)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                Tree::fit(x, y, &sample, &params)
            })
            .collect::<Vec<_>>();

        debug!(trees = trees.len(), "grew random forest");
        Ok(Self { trees })
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / self.trees.len() as f64
    }

    pub fn predict(&self, x: &DMatrix<f64>) -> DVector<f64> {
        let k = self.trees.len() as f64;
        DVector::from_fn(x.nrows(), |r, _| {
            self.trees.iter().map(|t| t.predict_at(x, r)).sum::<f64>() / k
        })
    }
}

impl BoostingModel {
    /// Stage-wise fit of squared-error residuals, starting from the target mean.
    pub fn fit(
        x: &DMatrix<f64>,
        y: &DVector<f64>,
        n_estimators: usize,
        learning_rate: f64,
        max_depth: usize,
    ) -> Result<Self, String> {
        check_shape(x, y)?;
        if n_estimators == 0 {
            return Err("n_estimators must be at least 1".into());
        }
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(format!("learning_rate must be positive, got {learning_rate}"));
        }

        let n = x.nrows();
        let rows: Vec<usize> = (0..n).collect();
        let params = TreeParams {
            max_depth: Some(max_depth),
            min_samples_split: 2,
        };

        let init = y.mean();
        let mut current = vec![init; n];
        let mut trees = Vec::with_capacity(n_estimators);
        for _ in 0..n_estimators {
            let residual: Vec<f64> = y.iter().zip(&current).map(|(t, p)| t - p).collect();
            let tree = Tree::fit(x, &residual, &rows, &params);
            current
                .par_iter_mut()
                .enumerate()
                .for_each(|(r, p)| *p += learning_rate * tree.predict_at(x, r));
            trees.push(tree);
        }

        debug!(stages = trees.len(), learning_rate, "fit gradient boosting");
        Ok(Self {
            init,
            learning_rate,
            trees,
        })
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.init
            + self.learning_rate * self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }

    pub fn predict(&self, x: &DMatrix<f64>) -> DVector<f64> {
        DVector::from_fn(x.nrows(), |r, _| {
            self.init
                + self.learning_rate * self.trees.iter().map(|t| t.predict_at(x, r)).sum::<f64>()
        })
    }
}

fn check_shape(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<(), String> {
    if x.nrows() == 0 {
        return Err("cannot fit on zero rows".into());
    }
    if x.nrows() != y.len() {
        return Err(format!("{} feature rows but {} targets", x.nrows(), y.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::r2_score;

    fn wave() -> (DMatrix<f64>, DVector<f64>) {
        let x = DMatrix::from_fn(120, 2, |r, c| if c == 0 { r as f64 / 12.0 } else { (r % 7) as f64 });
        let y = DVector::from_fn(120, |r, _| (r as f64 / 12.0).sin() * 3.0);
        (x, y)
    }

    #[test]
    fn forest_is_reproducible_for_a_seed() {
        let (x, y) = wave();
        let params = TreeParams {
            max_depth: Some(6),
            min_samples_split: 2,
        };
        let a = ForestModel::fit(&x, &y, 8, params, 11).unwrap();
        let b = ForestModel::fit(&x, &y, 8, params, 11).unwrap();
        let c = ForestModel::fit(&x, &y, 8, params, 12).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn forest_fits_a_smooth_signal() {
        let (x, y) = wave();
        let forest = ForestModel::fit(&x, &y, 20, TreeParams::default(), 3).unwrap();
        let pred = forest.predict(&x);
        assert!(r2_score(y.as_slice(), pred.as_slice()) > 0.9);

        let row = [x[(5, 0)], x[(5, 1)]];
        assert!((forest.predict_row(&row) - pred[5]).abs() < 1e-12);
    }

    #[test]
    fn boosting_improves_on_the_mean() {
        let (x, y) = wave();
        let model = BoostingModel::fit(&x, &y, 50, 0.1, 3).unwrap();
        assert_eq!(model.trees.len(), 50);
        let pred = model.predict(&x);
        assert!(r2_score(y.as_slice(), pred.as_slice()) > 0.9);
    }

    #[test]
    fn boosting_rejects_bad_learning_rate() {
        let (x, y) = wave();
        assert!(BoostingModel::fit(&x, &y, 10, 0.0, 3).is_err());
        assert!(ForestModel::fit(&x, &y, 0, TreeParams::default(), 1).is_err());
    }
}
