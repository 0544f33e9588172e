//! Dataset partitioning.

pub mod split;

pub use split::*;
