//! Logging setup for tidyctl
//!
//! `RUST_LOG` wins; otherwise the config level, or `debug` with `--verbose`.
//! Logs go to stderr so `--json` output stays clean.

use tracing_subscriber::EnvFilter;

pub fn init(level: &str, verbose: bool) {
    let default = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
