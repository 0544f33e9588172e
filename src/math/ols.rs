//! Least squares and ridge solvers.
//!
//! Both solvers work on already-centered design matrices; the caller
//! reconstructs the intercept from the column means.
//!
//! - Ordinary least squares goes through SVD so rank-deficient designs
//!   (e.g. a constant standardized column) still produce the minimum-norm
//!   solution instead of failing.
//! - Ridge solves the normal equations `(XᵀX + αI) w = Xᵀy` with a Cholesky
//!   factorization; `α > 0` keeps the system positive definite.

use nalgebra::{DMatrix, DVector};

/// Minimum-norm least squares via SVD.
///
/// Singular values below `ε · max(n, p) · σ_max` count as zero, the same
/// cutoff LAPACK-style `lstsq` uses. `None` means the result was not finite.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);
    let sigma_max = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
    let cutoff = f64::EPSILON * x.nrows().max(x.ncols()) as f64 * sigma_max;

    let beta = svd.solve(y, cutoff).ok()?;
    beta.iter().all(|v| v.is_finite()).then_some(beta)
}

/// Solve `(XᵀX + αI) w = Xᵀy`.
pub fn solve_ridge(x: &DMatrix<f64>, y: &DVector<f64>, alpha: f64) -> Option<DVector<f64>> {
    let p = x.ncols();
    let xt = x.transpose();
    let gram = &xt * x + DMatrix::<f64>::identity(p, p) * alpha;
    let rhs = &xt * y;

    let beta = match gram.clone().cholesky() {
        Some(chol) => chol.solve(&rhs),
        // Only reachable for alpha == 0 on a singular design.
        None => solve_least_squares(&gram, &rhs)?,
    };

    beta.iter().all(|v| v.is_finite()).then_some(beta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_fit_recovers_intercept() {
        // y = 1.5 + 2a - b, solved on centered columns.
        let rows = [[0.0, 1.0], [1.0, 0.0], [2.0, 3.0], [3.0, 1.0], [4.0, 2.0]];
        let y_raw: Vec<f64> = rows.iter().map(|r| 1.5 + 2.0 * r[0] - r[1]).collect();

        let x_raw = DMatrix::from_fn(rows.len(), 2, |i, j| rows[i][j]);
        let means = x_raw.row_mean();
        let x = DMatrix::from_fn(rows.len(), 2, |i, j| x_raw[(i, j)] - means[j]);
        let y_mean = y_raw.iter().sum::<f64>() / y_raw.len() as f64;
        let y = DVector::from_iterator(y_raw.len(), y_raw.iter().map(|v| v - y_mean));

        let w = solve_least_squares(&x, &y).unwrap();
        assert!((w[0] - 2.0).abs() < 1e-10);
        assert!((w[1] + 1.0).abs() < 1e-10);
        let intercept = y_mean - (means[0] * w[0] + means[1] * w[1]);
        assert!((intercept - 1.5).abs() < 1e-10);
    }

    #[test]
    fn all_zero_design_gives_zero_weights() {
        let x = DMatrix::<f64>::zeros(3, 2);
        let y = DVector::from_row_slice(&[1.0, -1.0, 0.0]);
        let w = solve_least_squares(&x, &y).unwrap();
        assert!(w.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn least_squares_handles_duplicate_columns() {
        let x = DMatrix::from_row_slice(3, 2, &[-1.0, -1.0, 0.0, 0.0, 1.0, 1.0]);
        let y = DVector::from_row_slice(&[-2.0, 0.0, 2.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        // Minimum-norm solution splits the weight evenly.
        assert!((beta[0] - 1.0).abs() < 1e-9);
        assert!((beta[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ridge_shrinks_towards_zero() {
        let x = DMatrix::from_row_slice(4, 1, &[-1.5, -0.5, 0.5, 1.5]);
        let y = DVector::from_row_slice(&[-3.0, -1.0, 1.0, 3.0]);

        let ols = solve_ridge(&x, &y, 0.0).unwrap();
        let ridge = solve_ridge(&x, &y, 5.0).unwrap();
        assert!((ols[0] - 2.0).abs() < 1e-10);
        // xᵀx = 5, xᵀy = 10 => w = 10 / (5 + 5)
        assert!((ridge[0] - 1.0).abs() < 1e-10);
    }
}
