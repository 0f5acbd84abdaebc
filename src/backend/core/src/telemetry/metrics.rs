//! Metrics for ability builds, contributor failures and authorization checks.
//!
//! Metrics go through the `metrics` facade. Tollgate installs no exporter;
//! the host application installs whichever recorder it uses, and calls
//! [`describe_metrics`] once after doing so.
//!
//! # Example
//!
//! ```rust,no_run
//! use tollgate_core::telemetry::metrics::AbilityMetrics;
//!
//! AbilityMetrics::record_check(true);
//! AbilityMetrics::record_contributor_failure("extension", "gift_cards");
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use serde::Deserialize;
use std::time::{Duration, Instant};

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Whether metric descriptions are registered at startup
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

/// Register all metric descriptions with the installed recorder.
pub fn describe_metrics(config: &MetricsConfig) {
    if !config.enabled {
        return;
    }

    describe_counter!(
        "tollgate_ability_builds_total",
        "Total number of abilities built"
    );
    describe_histogram!(
        "tollgate_ability_rules",
        "Number of rules in each built ability"
    );
    describe_histogram!(
        "tollgate_ability_build_seconds",
        "Time spent building an ability"
    );
    describe_counter!(
        "tollgate_contributor_failures_total",
        "Permission sets and extension abilities skipped because they failed"
    );
    describe_counter!(
        "tollgate_checks_total",
        "Authorization checks by outcome"
    );
    describe_counter!("tollgate_errors_total", "Total number of errors by code");
}

/// Ability-level metric helpers.
pub struct AbilityMetrics;

impl AbilityMetrics {
    /// Record a finished build.
    pub fn record_build(rule_count: usize, skipped: usize) {
        counter!(
            "tollgate_ability_builds_total",
            "degraded" => (skipped > 0).to_string(),
        )
        .increment(1);
        histogram!("tollgate_ability_rules").record(rule_count as f64);
    }

    /// Record a contributor that was skipped.
    pub fn record_contributor_failure(kind: &'static str, name: &str) {
        counter!(
            "tollgate_contributor_failures_total",
            "kind" => kind,
            "name" => name.to_string(),
        )
        .increment(1);
    }

    /// Record one authorization decision.
    pub fn record_check(allowed: bool) {
        let outcome = if allowed { "allow" } else { "deny" };
        counter!("tollgate_checks_total", "outcome" => outcome).increment(1);
    }
}

/// Times an ability build and records it on completion.
pub struct BuildTimer {
    start: Instant,
}

impl BuildTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Record to the build histogram.
    pub fn finish(self) -> Duration {
        let duration = self.start.elapsed();
        histogram!("tollgate_ability_build_seconds").record(duration.as_secs_f64());
        duration
    }
}
