//! `tracing` subscriber setup for the `dslx` binary.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "warn";

/// Picks the filter directive: `RUST_LOG` wins, then the config file, then `warn`.
pub fn filter_directive(env: Option<&str>, configured: Option<&str>) -> String {
    env.filter(|s| !s.trim().is_empty())
        .or(configured)
        .unwrap_or(DEFAULT_FILTER)
        .to_string()
}

/// Installs a stderr `fmt` subscriber. Calling it twice is harmless; the
/// second install is ignored.
pub fn init(configured: Option<&str>) {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directive = filter_directive(env.as_deref(), configured);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
