//! Tracing subscriber initialization.

use sluice_core::{ConfigError, LogFormat, SluiceResult, TelemetryConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// Call once at startup. Fails if the filter directive does not parse or a
/// global subscriber is already installed.
pub fn init_tracing(config: &TelemetryConfig) -> SluiceResult<()> {
    let env_filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = match config.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Plain => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    installed.map_err(|e| ConfigError::Telemetry {
        reason: format!("Failed to init subscriber: {}", e),
    })?;

    tracing::info!(
        filter = %config.filter,
        format = ?config.format,
        "Telemetry initialized"
    );
    Ok(())
}

fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, ConfigError> {
    EnvFilter::try_new(&config.filter).map_err(|e| ConfigError::Telemetry {
        reason: format!("Invalid log filter '{}': {}", config.filter, e),
    })
}
