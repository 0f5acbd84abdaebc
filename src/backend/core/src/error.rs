//! Error handling for Tollgate Core.
//!
//! This module provides:
//! - A single crate error type carrying a machine-readable code
//! - User-facing vs internal messages
//! - Severity-driven logging with tracing integration
//! - Metrics integration for error tracking
//!
//! Authorization checks themselves never fail: a query that cannot be
//! answered is a deny. Errors surface from configuration loading, from
//! contributor activation (where they are logged and the contributor is
//! skipped), and from [`Ability::authorize`](crate::ability::Ability::authorize).

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for Tollgate operations.
pub type Result<T> = std::result::Result<T, TollgateError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authorization (4000-4099)
    AccessDenied,

    // Contributors (4100-4199)
    PermissionSetFailed,
    ExtensionFailed,
    UnknownPermissionSet,
    InvalidCondition,

    // Configuration (5000-5099)
    InvalidConfiguration,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::AccessDenied => 4000,

            Self::PermissionSetFailed => 4100,
            Self::ExtensionFailed => 4101,
            Self::UnknownPermissionSet => 4102,
            Self::InvalidCondition => 4103,

            Self::InvalidConfiguration => 5000,
        }
    }

    /// Get the error category for grouping.
    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            4000..=4099 => "authorization",
            4100..=4199 => "contributor",
            5000..=5099 => "configuration",
            _ => "unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Expected outcomes such as a denied request
    Low,
    /// A contributor was skipped; the ability is narrower than configured
    Medium,
    /// Startup configuration is wrong
    High,
}

impl ErrorSeverity {
    /// Get severity based on error code.
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::AccessDenied => Self::Low,

            ErrorCode::PermissionSetFailed
            | ErrorCode::ExtensionFailed
            | ErrorCode::InvalidCondition => Self::Medium,

            ErrorCode::UnknownPermissionSet | ErrorCode::InvalidConfiguration => Self::High,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for Tollgate Core.
#[derive(Error, Debug)]
pub struct TollgateError {
    /// Machine-readable error code
    code: ErrorCode,

    /// Message safe to show to the end user
    user_message: Cow<'static, str>,

    /// Detailed internal message (for logging only)
    internal_message: Option<String>,

    /// Structured context (action, subject, contributor name)
    context: HashMap<String, serde_json::Value>,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for TollgateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl TollgateError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and user message.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            context: HashMap::new(),
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both user and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// The request was not authorized.
    pub fn access_denied(action: impl fmt::Display, subject: impl fmt::Display) -> Self {
        let action = action.to_string();
        let subject = subject.to_string();
        Self::new(
            ErrorCode::AccessDenied,
            "You are not authorized to access this page.",
        )
        .with_internal_message(format!("cannot {} {}", action, subject))
        .with_context("action", &action)
        .with_context("subject", &subject)
    }

    /// A permission set failed to decide or activate.
    pub fn permission_set(name: impl Into<String>, message: impl Into<String>) -> Self {
        let name = name.into();
        Self::with_internal(
            ErrorCode::PermissionSetFailed,
            format!("Permission set '{}' failed", name),
            message,
        )
        .with_context("permission_set", &name)
    }

    /// An extension ability failed to build its rules.
    pub fn extension(name: impl Into<String>, message: impl Into<String>) -> Self {
        let name = name.into();
        Self::with_internal(
            ErrorCode::ExtensionFailed,
            format!("Extension ability '{}' failed", name),
            message,
        )
        .with_context("extension", &name)
    }

    /// Configuration names a permission set that is not registered.
    pub fn unknown_permission_set(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(
            ErrorCode::UnknownPermissionSet,
            format!("Unknown permission set: {}", name),
        )
        .with_context("permission_set", &name)
    }

    /// A rule condition could not be built.
    pub fn invalid_condition(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidCondition, message.into())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Add internal message.
    pub fn with_internal_message(mut self, message: impl Into<String>) -> Self {
        self.internal_message = Some(message.into());
        self
    }

    /// Add a context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    pub fn context(&self) -> &HashMap<String, serde_json::Value> {
        &self.context
    }

    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();

        match self.severity() {
            ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    context = ?self.context,
                    source = ?self.source,
                    "Tollgate error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    "Contributor skipped"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = %code,
                    category = category,
                    internal_message = ?self.internal_message,
                    "Request denied"
                );
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Metrics
    // ─────────────────────────────────────────────────────────────────────────

    fn record_metrics(&self) {
        counter!(
            "tollgate_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category().to_string(),
            "severity" => format!("{:?}", self.severity()),
        )
        .increment(1);
    }
}

impl From<config::ConfigError> for TollgateError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_internal(
            ErrorCode::InvalidConfiguration,
            "Invalid configuration",
            err.to_string(),
        )
        .with_source(err)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_categories() {
        assert_eq!(ErrorCode::AccessDenied.category(), "authorization");
        assert_eq!(ErrorCode::ExtensionFailed.category(), "contributor");
        assert_eq!(ErrorCode::InvalidConfiguration.category(), "configuration");
        assert_eq!(ErrorCode::UnknownPermissionSet.category(), "contributor");
    }

    #[test]
    fn test_access_denied_context() {
        let error = TollgateError::access_denied("destroy", "product");
        assert_eq!(error.code(), ErrorCode::AccessDenied);
        assert_eq!(error.internal_message(), Some("cannot destroy product"));
        assert_eq!(error.context().get("action"), Some(&serde_json::json!("destroy")));
        assert_eq!(error.severity(), ErrorSeverity::Low);
    }

    #[test]
    fn test_contributor_errors_are_medium() {
        let error = TollgateError::permission_set("order_management", "boom");
        assert_eq!(error.severity(), ErrorSeverity::Medium);
        assert!(error.to_string().contains("order_management"));
        assert!(error.to_string().contains("boom"));
    }

    #[test]
    fn test_error_display() {
        let error = TollgateError::with_internal(
            ErrorCode::InvalidConfiguration,
            "Bad config",
            "missing [ability] section",
        );

        let display = format!("{}", error);
        assert!(display.contains("InvalidConfiguration"));
        assert!(display.contains("Bad config"));
        assert!(display.contains("missing [ability] section"));
    }

    #[test]
    fn test_config_error_conversion() {
        let err = TollgateError::from(config::ConfigError::Message("bad roles".to_string()));
        assert_eq!(err.code(), ErrorCode::InvalidConfiguration);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert_eq!(err.internal_message(), Some("bad roles"));
    }

    #[test]
    fn test_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::UnknownPermissionSet).unwrap();
        assert_eq!(json, "\"UNKNOWN_PERMISSION_SET\"");
    }
}
