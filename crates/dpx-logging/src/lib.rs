use tracing_subscriber::EnvFilter;

/// Environment variable consulted for filter directives, e.g.
/// `DPX_LOG=dpx_peer=debug,dpx_core=info`.
pub const FILTER_ENV: &str = "DPX_LOG";

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Structured JSON logging for a deployed peer endpoint.
///
/// Connection notices arrive as `peer`-tagged events emitted by the
/// notifier; span context is suppressed since the engine logs flat
/// events.
pub fn init(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_level))
        .json()
        .with_current_span(false)
        .init();
}

/// Human-readable logging for interactive runs.
pub fn init_pretty(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_level))
        .with_target(false)
        .init();
}

/// Logging for tests: captured per test, everything the dpx crates emit.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("dpx_core=debug,dpx_peer=debug"))
        .with_test_writer()
        .try_init();
}
