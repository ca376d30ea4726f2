//! Tracing subscriber setup for the binaries.
//!
//! Diagnostics go to stderr; report output stays on stdout.  Verbosity is
//! controlled by `RUST_LOG` and defaults to `info`.

use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber.  Later calls are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
