//! Model search and selection.
//!
//! Responsibilities:
//!
//! - expand typed hyperparameter grids
//! - score hyperparameters with k-fold cross-validation (parallel)
//! - pick the best catalog candidate by cross-validated R²

pub mod cv;
pub mod grid;
pub mod selection;

pub use cv::*;
pub use grid::*;
pub use selection::*;
