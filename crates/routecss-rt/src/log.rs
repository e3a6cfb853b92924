use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "ROUTECSS_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Installs the stderr subscriber. `ROUTECSS_LOG` takes an `EnvFilter`
/// directive (`info`, `routecssc=debug`, ...); unset or invalid falls back to
/// warnings only. Calling it twice is harmless.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
