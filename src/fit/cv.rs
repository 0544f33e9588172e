//! K-fold cross-validation.
//!
//! Folds are contiguous and unshuffled; the rows were already shuffled by the
//! splitter. With `n` rows and `k` folds the first `n % k` folds hold one extra
//! row.

use crate::math::r2_score;
use crate::models::{Hyperparams, fit};
use crate::transform::TransformedSet;

/// One fold: rows to train on and rows to score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

pub fn kfold(n: usize, k: usize) -> Result<Vec<Fold>, String> {
    if k < 2 {
        return Err(format!("need at least 2 folds, got {k}"));
    }
    if n < k {
        return Err(format!("cannot make {k} folds from {n} rows"));
    }

    let base = n / k;
    let extra = n % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for i in 0..k {
        let size = base + usize::from(i < extra);
        let end = start + size;
        folds.push(Fold {
            train: (0..start).chain(end..n).collect(),
            test: (start..end).collect(),
        });
        start = end;
    }
    Ok(folds)
}

/// Mean out-of-fold R² of `params` on `data`.
pub fn cross_val_score(
    params: &Hyperparams,
    data: &TransformedSet,
    k: usize,
    seed: u64,
) -> Result<f64, String> {
    let folds = kfold(data.n_rows(), k)?;
    let mut total = 0.0;
    for fold in &folds {
        let train = data.select_rows(&fold.train);
        let held_out = data.select_rows(&fold.test);
        let model = fit(params, &train.features, &train.target, seed)?;
        let pred = model.predict(&held_out.features);
        total += r2_score(held_out.target.as_slice(), pred.as_slice());
    }

    let score = total / folds.len() as f64;
    if score.is_finite() {
        Ok(score)
    } else {
        Err(format!("cross-validated score is not finite ({score})"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, DVector};

    #[test]
    fn folds_cover_every_row_once() {
        let folds = kfold(11, 3).unwrap();
        let sizes: Vec<usize> = folds.iter().map(|f| f.test.len()).collect();
        assert_eq!(sizes, [4, 4, 3]);
        assert_eq!(folds[1].test, [4, 5, 6, 7]);

        let mut seen: Vec<usize> = folds.iter().flat_map(|f| f.test.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..11).collect::<Vec<_>>());
        for f in &folds {
            assert_eq!(f.train.len() + f.test.len(), 11);
        }
    }

    #[test]
    fn too_few_rows_is_an_error() {
        assert!(kfold(2, 3).is_err());
        assert!(kfold(10, 1).is_err());
    }

    #[test]
    fn linear_data_scores_near_one() {
        let x = DMatrix::from_fn(40, 1, |r, _| ((r * 13) % 40) as f64);
        let y = DVector::from_fn(40, |r, _| 3.0 * x[(r, 0)] - 2.0);
        let data = TransformedSet {
            features: x,
            target: y,
        };
        let score = cross_val_score(&Hyperparams::LinearRegression, &data, 5, 0).unwrap();
        assert!((score - 1.0).abs() < 1e-9);
    }
}
