//! Reproducible train / validation / test partitioning.
//!
//! The split is two sequential seeded shuffles:
//!
//! 1. shuffle all row indices and carve off the test fraction
//! 2. shuffle the remainder and carve off the validation share of it
//!
//! Subset sizes round to the nearest row, which keeps every subset within one
//! row of its nominal size. Rows are moved, never duplicated or dropped.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::domain::{Dataset, SplitRatios};
use crate::error::AppError;

/// The three subsets produced by [`split`].
#[derive(Debug, Clone, PartialEq)]
pub struct Partition<S> {
    pub train: S,
    pub validation: S,
    pub test: S,
}

/// Partition `rows` according to `ratios`, deterministically for a given `seed`.
pub fn split<T: Clone>(rows: &[T], ratios: SplitRatios, seed: u64) -> Result<Partition<Vec<T>>, AppError> {
    ratios.validate()?;
    if rows.is_empty() {
        return Err(AppError::Ingestion("Cannot split an empty dataset.".into()));
    }

    let all: Vec<usize> = (0..rows.len()).collect();
    let (test_idx, remainder) = carve(all, ratios.test, seed);

    let val_share = ratios.validation / (ratios.train + ratios.validation);
    let (val_idx, train_idx) = carve(remainder, val_share, seed);

    debug!(
        train = train_idx.len(),
        validation = val_idx.len(),
        test = test_idx.len(),
        "partitioned rows"
    );

    let pick = |idx: &[usize]| idx.iter().map(|&i| rows[i].clone()).collect::<Vec<T>>();
    Ok(Partition {
        train: pick(&train_idx),
        validation: pick(&val_idx),
        test: pick(&test_idx),
    })
}

/// Split a dataset's records; every subset keeps the source header.
pub fn split_dataset(
    dataset: &Dataset,
    ratios: SplitRatios,
    seed: u64,
) -> Result<Partition<Dataset>, AppError> {
    let parts = split(&dataset.records, ratios, seed)?;
    Ok(Partition {
        train: dataset.with_records(parts.train),
        validation: dataset.with_records(parts.validation),
        test: dataset.with_records(parts.test),
    })
}

/// Shuffle `indices` and return `(carved, rest)` where `carved` holds
/// `round(fraction * len)` entries.
fn carve(mut indices: Vec<usize>, fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_carve = ((indices.len() as f64) * fraction).round() as usize;
    let rest = indices.split_off(n_carve.min(indices.len()));
    (indices, rest)
}
