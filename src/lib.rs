//! `listing-price` library crate.
//!
//! The binary (`lp`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the trained artifacts can be served from other front-ends
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod logging;
pub mod math;
pub mod models;
pub mod report;
pub mod transform;
