//! Subscriber setup for the binary.
//!
//! Library code only emits `tracing` events; nothing is printed unless the
//! binary installs a subscriber here. Logs go to stderr so stdout carries the
//! report alone.

use tracing::Level;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

/// Level for `-v` repetitions: none is info, one is debug, more is trace.
pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `verbosity`.
///
/// A second call is a no-op, so tests may call it freely.
pub fn init_logging(verbosity: u8, json_output: bool) {
    let level = level_for(verbosity);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("listing_price={level},warn")));

    let result = if json_output {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true);
        Registry::default().with(env_filter).with(fmt_layer).try_init()
    } else {
        let fmt_layer = fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false);
        Registry::default().with(env_filter).with(fmt_layer).try_init()
    };

    // Already installed: keep the first subscriber.
    let _ = result;
}
