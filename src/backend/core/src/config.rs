//! Configuration management.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::telemetry::{LoggingConfig, MetricsConfig};

/// Main configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Ability configuration
    #[serde(default)]
    pub ability: AbilityConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// How abilities are built.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AbilityConfig {
    /// Users holding this role get `manage` on `all`
    #[serde(default = "default_privileged_role")]
    pub privileged_role: String,

    /// Resource type name of user accounts
    #[serde(default = "default_user_type")]
    pub user_type: String,

    /// Role implicitly held by every user, including guests
    #[serde(default = "default_role")]
    pub default_role: String,

    /// Role name → permission set names, activated in registration order
    #[serde(default)]
    pub roles: BTreeMap<String, Vec<String>>,
}

impl Default for AbilityConfig {
    fn default() -> Self {
        Self {
            privileged_role: default_privileged_role(),
            user_type: default_user_type(),
            default_role: default_role(),
            roles: BTreeMap::new(),
        }
    }
}

// Default value functions
fn default_privileged_role() -> String {
    "admin".to_string()
}

fn default_user_type() -> String {
    "user".to_string()
}

fn default_role() -> String {
    "default".to_string()
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("TOLLGATE").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with environment overrides.
    pub fn from_file(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("TOLLGATE").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.ability.privileged_role, "admin");
        assert_eq!(cfg.ability.user_type, "user");
        assert_eq!(cfg.ability.default_role, "default");
        assert!(cfg.ability.roles.is_empty());
    }

    #[test]
    fn test_from_toml_str() {
        let cfg = Config::from_toml_str(
            r#"
            [ability]
            privileged_role = "superuser"

            [ability.roles]
            order_clerk = ["order_management", "product_display"]
            "#,
        )
        .unwrap();

        assert_eq!(cfg.ability.privileged_role, "superuser");
        assert_eq!(cfg.ability.user_type, "user");
        assert_eq!(
            cfg.ability.roles.get("order_clerk"),
            Some(&vec!["order_management".to_string(), "product_display".to_string()])
        );
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[ability]\nuser_type = \"account\"").unwrap();

        let cfg = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.ability.user_type, "account");
        assert_eq!(cfg.ability.privileged_role, "admin");
    }

    #[test]
    fn test_invalid_document_is_configuration_error() {
        let err = Config::from_toml_str("[ability\nroles = 3").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfiguration);

        let err = Config::from_toml_str("[ability]\nroles = \"clerk\"").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfiguration);
    }
}
