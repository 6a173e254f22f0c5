//! Tracing subscriber set-up for the replay binary
//!
//! Logs go to stderr because stdout carries the account CSV.

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber
///
/// `RUST_LOG` wins when set; otherwise `level` (e.g. `"warn"`,
/// `"sharded_cashier=debug"`) is used. Calling this twice is harmless, the
/// second installation is ignored.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
