use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `scriptcache=debug`.
pub const LOG_ENV: &str = "SCRIPTCACHE_LOG";

/// Installs a `fmt` subscriber filtered by [`LOG_ENV`]. Later calls, or a
/// subscriber installed elsewhere, leave the existing one in place.
pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    });
}
