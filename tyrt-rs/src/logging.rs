//! Diagnostic logging.
//!
//! The interpreter emits `tracing` events (block open/close, calls, try
//! outcomes, operator dispatch).  Nothing is printed unless a subscriber is
//! installed: `RUST_LOG=tyrt=debug` or `RUST_LOG=tyrt=trace`, or `-d` on the
//! command line.  Logs go to stderr so script output stays clean.

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Filter used by `-d`.
pub const DEBUG_FILTER: &str = "tyrt=debug";

/// Install the tracing subscriber.  Safe to call more than once; only the
/// first call has an effect.
pub fn init_tracing(debug: bool) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = if debug {
            EnvFilter::new(DEBUG_FILTER)
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };
        // Another subscriber may already be installed by an embedding host.
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true).with_level(true))
            .with(filter)
            .try_init();
    });
}
