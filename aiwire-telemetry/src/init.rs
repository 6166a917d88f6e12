//! Telemetry initialization and configuration

use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Error returned when the global subscriber could not be installed.
pub type InitError = Box<dyn std::error::Error + Send + Sync>;

static INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Default filter directive used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Output format of the console layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable, one line per event.
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Initialize console logging for a service.
///
/// Reads the filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
/// Only the first call installs a subscriber; later calls return the outcome of the first.
///
/// # Example
/// ```
/// use aiwire_telemetry::init_telemetry;
/// let _ = init_telemetry("voice-gateway");
/// ```
pub fn init_telemetry(service_name: &str) -> Result<(), InitError> {
    init_with_format(service_name, LogFormat::Pretty)
}

/// Initialize JSON logging for a service (one object per line, suitable for log shippers).
pub fn init_json_telemetry(service_name: &str) -> Result<(), InitError> {
    init_with_format(service_name, LogFormat::Json)
}

/// Initialize logging with an explicit output format.
pub fn init_with_format(service_name: &str, format: LogFormat) -> Result<(), InitError> {
    let outcome = INIT.get_or_init(|| install(service_name, format));
    outcome.clone().map_err(Into::into)
}

/// Returns true once a subscriber has been installed by this crate.
pub fn is_initialized() -> bool {
    matches!(INIT.get(), Some(Ok(())))
}

fn env_filter() -> Result<EnvFilter, String> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .map_err(|e| format!("Failed to create env filter: {e}"))
}

fn install(service_name: &str, format: LogFormat) -> Result<(), String> {
    let filter = env_filter()?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_thread_ids(true),
            )
            .try_init(),
    };
    installed.map_err(|e| format!("Failed to install subscriber: {e}"))?;

    tracing::info!(service.name = service_name, ?format, "Telemetry initialized");
    Ok(())
}
