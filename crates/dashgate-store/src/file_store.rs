//! File-system backed dashboard store.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::{DashboardId, DashboardStore};

/// Default extension of dashboard documents.
pub const DEFAULT_EXTENSION: &str = "rdash";

/// Keeps each dashboard as `<dir>/<id>.<extension>`.
///
/// Every write lands in its own temporary file in the store directory that is
/// then renamed over the target, so readers observe either the old or the new
/// document and concurrent writers of one id never share a temporary file.
#[derive(Debug, Clone)]
pub struct FsDashboardStore {
    dir: PathBuf,
    extension: String,
}

impl FsDashboardStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Path of the document stored under `id`.
    pub fn path_for(&self, id: &DashboardId) -> PathBuf {
        self.dir.join(format!("{}.{}", id.as_str(), self.extension))
    }
}

impl DashboardStore for FsDashboardStore {
    fn read(&self, id: &DashboardId) -> Result<Bytes> {
        let path = self.path_for(id);
        match fs::read(&path) {
            Ok(data) => {
                debug!(dashboard = %id, bytes = data.len(), "Read dashboard");
                Ok(Bytes::from(data))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, id: &DashboardId, data: Bytes) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        // Dropping the temporary file on any error removes it.
        let mut temp = NamedTempFile::new_in(&self.dir)?;
        temp.write_all(&data)?;
        temp.as_file().sync_all()?;
        temp.persist(self.path_for(id)).map_err(|e| e.error)?;

        debug!(dashboard = %id, bytes = data.len(), "Wrote dashboard");
        Ok(())
    }

    fn list(&self) -> Result<Vec<DashboardId>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some(self.extension.as_str())
            {
                continue;
            }
            // Files whose stem is not a valid id are not ours to serve.
            if let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| DashboardId::new(stem).ok())
            {
                ids.push(id);
            }
        }

        ids.sort();
        Ok(ids)
    }
}
