//! Input/output helpers.
//!
//! - CSV / JSON ingest and split export (`ingest`)
//! - trained artifact read/write (`artifact`)
//! - prediction history (`history`)

pub mod artifact;
pub mod history;
pub mod ingest;

pub use artifact::*;
pub use history::*;
pub use ingest::*;
