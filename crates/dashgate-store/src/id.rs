//! Validated dashboard ids

use std::fmt::{self, Display};
use std::str::FromStr;

use crate::error::StoreError;

/// Name of a stored dashboard.
///
/// Ids map directly to file names, so only `[A-Za-z0-9 _.-]` is accepted and
/// anything that could leave the store directory (`..`, separators) is
/// rejected at construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DashboardId(String);

impl DashboardId {
    pub fn new(id: impl Into<String>) -> Result<Self, StoreError> {
        let id = id.into();
        if let Some(reason) = rejection(&id) {
            return Err(StoreError::InvalidId { id, reason });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn rejection(id: &str) -> Option<&'static str> {
    if id.trim().is_empty() {
        return Some("id is empty");
    }
    if id.contains(['/', '\\']) {
        return Some("id contains a path separator");
    }
    if id.contains("..") {
        return Some("id contains '..'");
    }
    if id.starts_with('.') {
        return Some("id starts with '.'");
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '.' | '-'))
    {
        return Some("id contains characters outside [A-Za-z0-9 _.-]");
    }
    None
}

impl Display for DashboardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DashboardId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for DashboardId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
