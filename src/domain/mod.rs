//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - raw listing rows and datasets (`RawRecord`, `Dataset`)
//! - the fixed feature schema with its closed vocabularies (`FeatureSpec`)
//! - run configuration (`TrainConfig`, `PredictConfig`, `SplitRatios`)

pub mod schema;
pub mod types;

pub use schema::*;
pub use types::*;
