//! Raw records to fixed-width numeric features.
//!
//! Two layers:
//!
//! - `prepare`: per-row coercion that needs no statistics
//! - `transformer`: imputation, ordinal encoding and scaling fitted on train

pub mod prepare;
pub mod transformer;

pub use prepare::{PreparedRow, count_entries};
pub use transformer::*;
