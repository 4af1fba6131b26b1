//! dashgate-store: Dashboard document storage
//!
//! Dashboards are opaque byte documents produced by the BI designer. The
//! store only names and persists them; it never interprets their content.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use dashgate_store::{DashboardId, DashboardStore, FsDashboardStore};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = FsDashboardStore::new(dir.path());
//!
//! let id = DashboardId::new("Sales").unwrap();
//! store.write(&id, Bytes::from_static(b"{}")).unwrap();
//!
//! assert_eq!(store.read(&id).unwrap(), Bytes::from_static(b"{}"));
//! assert_eq!(store.list().unwrap(), vec![id]);
//! ```

use bytes::Bytes;

mod error;
mod file_store;
mod id;

pub use error::{Result, StoreError};
pub use file_store::{DEFAULT_EXTENSION, FsDashboardStore};
pub use id::DashboardId;

/// Byte-stream persistence for dashboards, keyed by id.
pub trait DashboardStore: Send + Sync {
    /// Reads the document stored under `id`.
    fn read(&self, id: &DashboardId) -> Result<Bytes>;

    /// Stores `data` under `id`, replacing any previous document.
    fn write(&self, id: &DashboardId, data: Bytes) -> Result<()>;

    /// Ids of all stored documents, sorted.
    fn list(&self) -> Result<Vec<DashboardId>>;
}
