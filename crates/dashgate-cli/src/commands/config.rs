//! Configuration management commands.

use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use dashgate_config::{CredentialProvider, DashgateConfig, Paths};

use crate::style;

/// Output format of `config show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Toml,
}

const REDACTED: &str = "********";

/// Show the effective configuration with secrets redacted.
pub fn show(project: &Path, format: OutputFormat) -> Result<()> {
    let mut config = super::load_config(project)?;
    if !config.database.password.is_empty() {
        config.database.password = REDACTED.to_string();
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        OutputFormat::Toml => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        OutputFormat::Text => print_text(&config),
    }

    Ok(())
}

fn print_text(config: &DashgateConfig) {
    style::print_header("dashgate Configuration");
    println!();

    println!("Project:");
    style::print_labeled("Name", &config.project.name);
    println!();

    println!("Dashboards:");
    style::print_labeled("Directory", &config.dashboards.directory.display().to_string());
    style::print_labeled("Extension", &config.dashboards.extension);
    println!();

    println!("Database:");
    style::print_labeled("Data source", &config.database.data_source);
    style::print_labeled(
        "Server",
        &format!("{}:{}", config.database.host, config.database.port),
    );
    style::print_labeled("Database", &config.database.database);
    style::print_labeled("Username", &config.database.username);
    println!();

    let policy = &config.policy;
    println!("Policy:");
    style::print_labeled("Identity header", &policy.headers.identity);
    for attribute in &policy.headers.attributes {
        style::print_labeled(
            "Attribute header",
            &format!("{} <- {}", attribute.name, attribute.header),
        );
    }
    style::print_labeled("Default identity", &policy.default_identity);
    let elevated: Vec<&str> = policy.elevated_identities.iter().map(String::as_str).collect();
    style::print_labeled("Elevated identities", &elevated.join(", "));
    for rule in &policy.rules {
        let tables: Vec<&str> = rule.allowed_resources.iter().map(String::as_str).collect();
        style::print_labeled(&format!("{} tables", rule.role), &tables.join(", "));
    }
    for binding in &policy.procedures {
        style::print_labeled(
            "Procedure",
            &format!("{} -> {}", binding.resource_id, binding.procedure),
        );
    }
    for binding in &policy.custom_queries {
        style::print_labeled("Custom query", &binding.resource_id);
    }
    for rls in &policy.row_level_security {
        style::print_labeled(
            "Row filter",
            &format!("{}.{} = @{}", rls.table, rls.column, rls.parameter),
        );
    }
}

/// Validate configuration files and the policy they describe.
pub fn validate(project: &Path) -> Result<()> {
    println!("Validating configuration in {}...", project.display());

    if !Paths::is_initialized(project) {
        style::print_hint(&format!(
            "No dashgate.toml in {}, validating built-in defaults",
            project.display()
        ));
    }

    let config = super::load_config(project)?;
    config.validate().context("Configuration is invalid")?;

    let data_source = &config.database.data_source;
    let credentials = config
        .credential_provider()
        .credentials(data_source)
        .with_context(|| format!("No credentials for data source {data_source}"))?;

    style::print_success("Configuration is valid");
    style::print_labeled(
        "Data source",
        &format!("{data_source} (as {})", credentials.username),
    );
    style::print_labeled("Rules", &config.policy.rules.len().to_string());
    style::print_labeled("Procedure bindings", &config.policy.procedures.len().to_string());
    style::print_labeled("Custom queries", &config.policy.custom_queries.len().to_string());
    style::print_labeled(
        "Row-level secured tables",
        &config.policy.row_level_security.len().to_string(),
    );

    Ok(())
}
