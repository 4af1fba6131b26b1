//! Resource descriptors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies the data-source item being requested, independent of the
/// store behind it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceDescriptor {
    /// A database table, by name.
    Table { name: String },

    /// A stored procedure item, by SDK item id.
    Procedure { id: String },

    /// A custom query item, by SDK item id.
    CustomQuery { id: String },
}

/// Discriminant of [`ResourceDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Table,
    Procedure,
    CustomQuery,
}

impl ResourceDescriptor {
    pub fn table(name: impl Into<String>) -> Self {
        Self::Table { name: name.into() }
    }

    pub fn procedure(id: impl Into<String>) -> Self {
        Self::Procedure { id: id.into() }
    }

    pub fn custom_query(id: impl Into<String>) -> Self {
        Self::CustomQuery { id: id.into() }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Table { .. } => ResourceKind::Table,
            Self::Procedure { .. } => ResourceKind::Procedure,
            Self::CustomQuery { .. } => ResourceKind::CustomQuery,
        }
    }

    /// Table name or item id.
    pub fn key(&self) -> &str {
        match self {
            Self::Table { name } => name,
            Self::Procedure { id } | Self::CustomQuery { id } => id,
        }
    }

    /// Item id for procedure and custom query items; `None` for tables.
    pub fn item_id(&self) -> Option<&str> {
        match self {
            Self::Table { .. } => None,
            Self::Procedure { id } | Self::CustomQuery { id } => Some(id),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Table => "table",
            Self::Procedure => "procedure",
            Self::CustomQuery => "custom query",
        })
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind(), self.key())
    }
}
