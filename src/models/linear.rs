//! Linear estimators: ordinary least squares, ridge, lasso and elastic net.
//!
//! All four fit on centered data and recover the intercept from the column
//! means, so the intercept is never penalized.
//!
//! Lasso and elastic net minimise
//!
//! ```text
//! 1/(2n) * ||y - Xw||² + α·ρ·||w||₁ + α(1-ρ)/2 * ||w||²
//! ```
//!
//! by cyclic coordinate descent; lasso is the `ρ = 1` case.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::math::{solve_least_squares, solve_ridge};

/// Sweep limit for coordinate descent.
pub const MAX_SWEEPS: usize = 1000;
/// Stop once no coefficient moves by more than this in a sweep.
pub const TOLERANCE: f64 = 1e-4;

/// A fitted linear model `y = intercept + coefficients · x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }

    pub fn predict(&self, x: &DMatrix<f64>) -> DVector<f64> {
        let w = DVector::from_column_slice(&self.coefficients);
        (x * w).add_scalar(self.intercept)
    }
}

/// Ordinary least squares.
pub fn fit_ols(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<LinearModel, String> {
    let c = Centered::new(x, y)?;
    let w = solve_least_squares(&c.x, &c.y).ok_or("least squares system is ill-conditioned")?;
    Ok(c.finish(w))
}

/// Ridge regression, minimising `||y - Xw||² + α||w||²`.
pub fn fit_ridge(x: &DMatrix<f64>, y: &DVector<f64>, alpha: f64) -> Result<LinearModel, String> {
    check_alpha(alpha)?;
    let c = Centered::new(x, y)?;
    let w = solve_ridge(&c.x, &c.y, alpha).ok_or("ridge system is singular")?;
    Ok(c.finish(w))
}

pub fn fit_lasso(x: &DMatrix<f64>, y: &DVector<f64>, alpha: f64) -> Result<LinearModel, String> {
    fit_elastic_net(x, y, alpha, 1.0)
}

/// Elastic net via cyclic coordinate descent.
pub fn fit_elastic_net(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    alpha: f64,
    l1_ratio: f64,
) -> Result<LinearModel, String> {
    check_alpha(alpha)?;
    if !(0.0..=1.0).contains(&l1_ratio) {
        return Err(format!("l1_ratio must be in [0, 1], got {l1_ratio}"));
    }

    let c = Centered::new(x, y)?;
    let n = c.x.nrows() as f64;
    let p = c.x.ncols();
    let l1 = alpha * l1_ratio * n;
    let l2 = alpha * (1.0 - l1_ratio) * n;

    let col_sq: Vec<f64> = c.x.column_iter().map(|col| col.norm_squared()).collect();
    let mut w = DVector::<f64>::zeros(p);
    let mut residual = c.y.clone();

    let mut sweeps = 0;
    while sweeps < MAX_SWEEPS {
        sweeps += 1;
        let mut max_delta = 0.0_f64;

        for j in 0..p {
            if col_sq[j] == 0.0 {
                continue;
            }
            let col = c.x.column(j);
            let w_old = w[j];
            // Correlation of column j with the partial residual that excludes it.
            let rho = col.dot(&residual) + col_sq[j] * w_old;
            let w_new = soft_threshold(rho, l1) / (col_sq[j] + l2);

            if w_new != w_old {
                residual.axpy(w_old - w_new, &col, 1.0);
                w[j] = w_new;
                max_delta = max_delta.max((w_new - w_old).abs());
            }
        }

        if max_delta < TOLERANCE {
            break;
        }
    }
    debug!(alpha, l1_ratio, sweeps, "coordinate descent finished");

    if w.iter().any(|v| !v.is_finite()) {
        return Err("coordinate descent diverged".into());
    }
    Ok(c.finish(w))
}

fn soft_threshold(z: f64, gamma: f64) -> f64 {
    if z > gamma {
        z - gamma
    } else if z < -gamma {
        z + gamma
    } else {
        0.0
    }
}

fn check_alpha(alpha: f64) -> Result<(), String> {
    if alpha.is_finite() && alpha >= 0.0 {
        Ok(())
    } else {
        Err(format!("alpha must be finite and non-negative, got {alpha}"))
    }
}

/// Design and target with column means removed.
struct Centered {
    x: DMatrix<f64>,
    y: DVector<f64>,
    x_mean: DVector<f64>,
    y_mean: f64,
}

impl Centered {
    fn new(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<Self, String> {
        if x.nrows() == 0 {
            return Err("cannot fit on zero rows".into());
        }
        if x.nrows() != y.len() {
            return Err(format!("{} feature rows but {} targets", x.nrows(), y.len()));
        }

        let x_mean = x.row_mean().transpose();
        let y_mean = y.mean();
        let mut xc = x.clone();
        for (j, mut col) in xc.column_iter_mut().enumerate() {
            col.add_scalar_mut(-x_mean[j]);
        }
        Ok(Self {
            x: xc,
            y: y.add_scalar(-y_mean),
            x_mean,
            y_mean,
        })
    }

    fn finish(self, w: DVector<f64>) -> LinearModel {
        let intercept = self.y_mean - self.x_mean.dot(&w);
        LinearModel {
            coefficients: w.iter().copied().collect(),
            intercept,
        }
    }
}
