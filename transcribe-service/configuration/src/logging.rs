use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::TranscribeConfig;

/// Installs the global subscriber. `RUST_LOG` wins over `LOG_LEVEL` when set.
/// A second call is a no-op.
pub fn setup_logging(config: &TranscribeConfig) {
    let logging = &config.logging;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let installed = if logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_target(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true))
            .try_init()
    };

    match installed {
        Ok(()) => tracing::info!(
            level = %logging.level,
            json = logging.json,
            "logging initialized"
        ),
        Err(err) => tracing::debug!(error = %err, "logging already initialized"),
    }
}
