//! CLI command implementations.

use std::path::Path;

use anyhow::{Context, Result};
use dashgate_config::{ConfigLoader, DashgateConfig};

pub mod check;
pub mod config;
pub mod dashboards;
pub mod version;

/// Loads the layered configuration for `project`.
fn load_config(project: &Path) -> Result<DashgateConfig> {
    ConfigLoader::new()
        .with_project_dir(project)
        .load()
        .with_context(|| format!("Failed to load configuration from {}", project.display()))
}
