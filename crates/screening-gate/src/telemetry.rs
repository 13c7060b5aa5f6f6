use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{ConfigError, LoggingConfig};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| ConfigError::Invalid(format!("log level `{}`: {e}", config.level)))?,
    };

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if config.json {
        let fmt_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true);
        subscriber
            .with(fmt_layer)
            .try_init()
            .map_err(|e| ConfigError::Telemetry(e.to_string()))
    } else {
        let fmt_layer = fmt::layer().with_target(true);
        subscriber
            .with(fmt_layer)
            .try_init()
            .map_err(|e| ConfigError::Telemetry(e.to_string()))
    }
}
