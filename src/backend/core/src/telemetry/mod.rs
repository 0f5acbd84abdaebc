//! Telemetry: logging and metrics.
//!
//! - **Logging**: Structured JSON/pretty logging through `tracing-subscriber`
//! - **Metrics**: Counters and histograms through the `metrics` facade
//!
//! # Example
//!
//! ```rust,no_run
//! use tollgate_core::telemetry::{TelemetryConfig, init_telemetry};
//!
//! let config = TelemetryConfig::default();
//! init_telemetry(&config).expect("Failed to initialize telemetry");
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{build_filter, init_logging, redact_token, LogFormat, LoggingConfig};
pub use metrics::{describe_metrics, AbilityMetrics, BuildTimer, MetricsConfig};

use serde::Deserialize;

/// Unified telemetry configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetryConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl From<&crate::config::Config> for TelemetryConfig {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            logging: config.logging.clone(),
            metrics: config.metrics.clone(),
        }
    }
}

/// Initialize logging and register metric descriptions.
///
/// Call once at startup, after the host has installed its metrics recorder.
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    init_logging(&config.logging)?;
    describe_metrics(&config.metrics);

    ::tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Tollgate telemetry initialized"
    );
    Ok(())
}
