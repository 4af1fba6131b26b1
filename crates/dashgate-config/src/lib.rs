//! Configuration management for dashgate
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (DASHGATE_* prefix, `__` between sections)
//! 2. dashgate.local.toml (gitignored, local overrides)
//! 3. dashgate.toml (git-tracked, project config)
//! 4. ~/.config/dashgate/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use dashgate_policy::{Policy, PolicyConfig};
use serde::{Deserialize, Serialize};

mod credentials;
mod error;
mod loader;
mod paths;

pub use credentials::{CredentialProvider, DatabaseCredentials, StaticCredentialProvider};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main dashgate configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashgateConfig {
    pub project: ProjectConfig,
    pub dashboards: DashboardsConfig,
    pub database: DatabaseConfig,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "dashgate-project".to_string(),
        }
    }
}

/// Where dashboard documents live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardsConfig {
    pub directory: PathBuf,
    /// File extension of dashboard documents, without the dot.
    pub extension: String,
}

impl Default for DashboardsConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("dashboards"),
            extension: "rdash".to_string(),
        }
    }
}

/// The SQL data source the BI SDK queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Name the SDK uses to refer to this data source.
    pub data_source: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_source: "northwind".to_string(),
            host: "localhost".to_string(),
            port: 1433,
            database: "Northwind".to_string(),
            username: "dev".to_string(),
            password: "dev".to_string(),
        }
    }
}

impl DashgateConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Validate the policy section into the immutable rule set.
    pub fn policy(&self) -> Result<Arc<Policy>, ConfigError> {
        Ok(self.policy.validate()?)
    }

    /// Check every section, then validate the policy rule set.
    pub fn validate(&self) -> Result<Arc<Policy>, ConfigError> {
        let extension = &self.dashboards.extension;
        if extension.is_empty() || extension.contains(['.', '/', '\\']) {
            return Err(ConfigError::ValidationError(format!(
                "dashboards.extension must be a bare extension, got {extension:?}"
            )));
        }
        if self.database.data_source.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.data_source must not be empty".to_string(),
            ));
        }
        self.policy()
    }

    /// Static credentials for the configured data source.
    pub fn credential_provider(&self) -> StaticCredentialProvider {
        StaticCredentialProvider::from_config(&self.database)
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        if self.dashboards.directory.is_relative() {
            self.dashboards.directory = base.join(&self.dashboards.directory);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashgate_policy::Role;

    #[test]
    fn test_default_config() {
        let config = DashgateConfig::default();
        assert_eq!(config.dashboards.directory, PathBuf::from("dashboards"));
        assert_eq!(config.dashboards.extension, "rdash");
        assert_eq!(config.database.port, 1433);
        assert_eq!(config.policy.default_identity, "ALFKI");
    }

    #[test]
    fn test_default_policy_validates() {
        let policy = DashgateConfig::default().policy().unwrap();
        assert_eq!(policy.resolver().resolve("AROUT"), Role::Admin);
    }

    #[test]
    fn test_invalid_policy_is_config_error() {
        let mut config = DashgateConfig::default();
        config.policy.rules.clear();

        let err = config.policy().unwrap_err();
        assert!(matches!(err, ConfigError::Policy(_)));
        assert!(err.to_string().contains("no rule for the default role"));
    }

    #[test]
    fn test_validate_rejects_dotted_extension() {
        let mut config = DashgateConfig::default();
        config.dashboards.extension = ".rdash".to_string();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(DashgateConfig::default().validate().is_ok());
    }

    #[test]
    fn test_path_resolution() {
        let mut config = DashgateConfig::default();
        config.resolve_paths("/srv/bi");

        assert_eq!(config.dashboards.directory, PathBuf::from("/srv/bi/dashboards"));

        config.dashboards.directory = PathBuf::from("/var/dashboards");
        config.resolve_paths("/srv/bi");
        assert_eq!(config.dashboards.directory, PathBuf::from("/var/dashboards"));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = DashgateConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("CustOrderHist"));

        let parsed: DashgateConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
