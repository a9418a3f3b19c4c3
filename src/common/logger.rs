use tracing_subscriber::EnvFilter;

use crate::config::EngineConfig;

/// Install the global tracing subscriber.
///
/// The filter directive comes from the configured logging level
/// (defaulting to `info`); `RUST_LOG` wins when set. Calling this more
/// than once is harmless — later calls are ignored, which keeps per-test
/// initialization simple.
pub fn init(config: &EngineConfig) {
    let level = config
        .logging
        .as_ref()
        .and_then(|l| l.level.as_deref())
        .unwrap_or("info");

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();
}
