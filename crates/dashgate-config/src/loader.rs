//! Configuration loader with multi-source merging

use crate::{DashgateConfig, Paths};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    include_user_config: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "DASHGATE".to_string(),
            include_user_config: true,
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "DASHGATE")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Skip ~/.config/dashgate/config.toml
    pub fn without_user_config(mut self) -> Self {
        self.include_user_config = false;
        self
    }

    /// Load configuration from all sources with proper precedence
    ///
    /// Built-in defaults are applied by serde while deserializing, so a list
    /// section given in a file replaces the built-in list instead of being
    /// merged into it element by element.
    pub fn load(self) -> Result<DashgateConfig> {
        let mut builder = config::Config::builder();

        // 1. User config (~/.config/dashgate/config.toml)
        if self.include_user_config {
            let paths = Paths::new();
            if let Ok(user_config_file) = paths.user_config_file() {
                if user_config_file.exists() {
                    debug!(path = %user_config_file.display(), "Loading user config");
                    builder = builder.add_source(
                        config::File::from(user_config_file)
                            .required(false)
                            .format(config::FileFormat::Toml),
                    );
                }
            }
        }

        // 2. Project config (dashgate.toml)
        let project_config_file = Paths::project_config_file(&self.project_dir);
        if project_config_file.exists() {
            debug!(path = %project_config_file.display(), "Loading project config");
            builder = builder.add_source(
                config::File::from(project_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 3. Local config (dashgate.local.toml, gitignored)
        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            debug!(path = %local_config_file.display(), "Loading local config");
            builder = builder.add_source(
                config::File::from(local_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 4. Environment variables (DASHGATE_POLICY__DEFAULT_IDENTITY=...)
        // Values stay strings: identities like "007" must not become numbers.
        // Numeric fields are still parsed from the string on deserialization.
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("policy.elevated_identities"),
        );

        // Build and deserialize
        let config = builder.build().context("Failed to build configuration")?;

        let mut dashgate_config: DashgateConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Resolve relative paths
        dashgate_config.resolve_paths(&self.project_dir);

        Ok(dashgate_config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default(self) -> DashgateConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashgate_policy::{Role, ValueSource};
    use std::fs;
    use tempfile::tempdir;

    fn loader(dir: &Path) -> ConfigLoader {
        // Unique prefix so variables from the test environment never leak in.
        ConfigLoader::new()
            .with_project_dir(dir)
            .with_env_prefix("DASHGATE_TEST_UNSET")
            .without_user_config()
    }

    #[test]
    fn test_load_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = loader(temp_dir.path()).load().expect("Failed to load config");

        assert_eq!(config.policy, dashgate_policy::PolicyConfig::default());
        assert_eq!(config.dashboards.directory, temp_dir.path().join("dashboards"));
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        let config_content = r#"
[project]
name = "northwind-portal"

[dashboards]
directory = "/srv/dashboards"

[policy]
default_identity = "GUEST"
elevated_identities = ["ROOT"]

[[policy.rules]]
role = "User"
allowed_resources = ["Products", "Categories"]

[[policy.procedures]]
resource_id = "SalesByYear"
procedure = "Sales by Year"

[[policy.procedures.parameters]]
name = "EmployeeID"
source = "attribute:employee_id"
"#;
        fs::write(project_dir.join("dashgate.toml"), config_content)
            .expect("Failed to write config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(config.project.name, "northwind-portal");
        assert_eq!(config.dashboards.directory, PathBuf::from("/srv/dashboards"));
        assert_eq!(config.policy.default_identity, "GUEST");
        assert_eq!(config.policy.rules.len(), 1);
        assert_eq!(config.policy.rules[0].role, Role::User);
        assert!(config.policy.rules[0].allowed_resources.contains("Categories"));

        // Lists replace the built-in ones wholesale.
        assert_eq!(config.policy.procedures.len(), 1);
        assert_eq!(config.policy.procedures[0].procedure, "Sales by Year");
        assert_eq!(
            config.policy.procedures[0].parameters[0].source,
            ValueSource::Attribute("employee_id".to_string())
        );

        // Untouched sections keep their defaults.
        assert_eq!(config.policy.custom_queries.len(), 1);

        let policy = config.policy().expect("policy is valid");
        assert_eq!(policy.resolver().resolve("ROOT"), Role::Admin);
        assert_eq!(policy.resolver().resolve("AROUT"), Role::User);
    }

    #[test]
    fn test_local_overrides() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("dashgate.toml"),
            r#"
[database]
host = "sql.internal"
port = 1433
"#,
        )
        .expect("Failed to write project config");

        fs::write(
            project_dir.join("dashgate.local.toml"),
            r#"
[database]
host = "localhost"
"#,
        )
        .expect("Failed to write local config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 1433);
    }

    #[test]
    fn test_unknown_role_fails_to_load() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("dashgate.toml"),
            r#"
[[policy.rules]]
role = "Superuser"
allowed_resources = ["Orders"]
"#,
        )
        .expect("Failed to write config");

        assert!(loader(project_dir).load().is_err());
    }

    // Environment overrides are covered by the CLI tests, which set them per
    // process instead of mutating this test process's environment.

    #[test]
    fn test_load_or_default() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join("dashgate.toml"), "not [valid toml")
            .expect("Failed to write config");

        let config = loader(temp_dir.path()).load_or_default();
        assert_eq!(config.project.name, "dashgate-project");
    }
}
