//! Dashboard document commands.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;
use dashgate_config::DashgateConfig;
use dashgate_store::{DashboardId, DashboardStore, FsDashboardStore};

use crate::style;

fn open_store(config: &DashgateConfig) -> FsDashboardStore {
    FsDashboardStore::new(&config.dashboards.directory)
        .with_extension(config.dashboards.extension.clone())
}

/// List stored dashboards.
pub fn list(project: &Path) -> Result<()> {
    let config = super::load_config(project)?;
    let store = open_store(&config);

    let ids = store.list().context("Failed to list dashboards")?;
    if ids.is_empty() {
        println!("No dashboards in {}", store.dir().display());
        style::print_hint("Add one with: dashgate dashboards import <ID> <FILE>");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = ids
        .iter()
        .map(|id| vec![id.to_string(), store.path_for(id).display().to_string()])
        .collect();
    println!("{}", style::list_table(&["Dashboard", "Path"], &rows));

    Ok(())
}

/// Print a stored dashboard document as-is.
pub fn show(project: &Path, id: &str) -> Result<()> {
    let config = super::load_config(project)?;
    let id = DashboardId::new(id)?;

    let data = open_store(&config)
        .read(&id)
        .with_context(|| format!("Failed to read dashboard {id}"))?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&data)?;
    stdout.flush()?;
    Ok(())
}

/// Store a dashboard document read from `file`.
pub fn import(project: &Path, id: &str, file: &Path) -> Result<()> {
    let config = super::load_config(project)?;
    let id = DashboardId::new(id)?;

    let data = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let size = data.len();

    let store = open_store(&config);
    store
        .write(&id, Bytes::from(data))
        .with_context(|| format!("Failed to store dashboard {id}"))?;

    style::print_success(&format!(
        "Imported {id} ({size} bytes) to {}",
        store.path_for(&id).display()
    ));
    Ok(())
}
