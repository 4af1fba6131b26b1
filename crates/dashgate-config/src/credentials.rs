//! Credentials for the database collaborator.

use std::fmt;

use crate::DatabaseConfig;

/// Login for a SQL data source.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseCredentials {
    pub username: String,
    password: String,
}

impl DatabaseCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Supplies credentials when the SDK opens a data source.
pub trait CredentialProvider: Send + Sync {
    /// Credentials for `data_source`, or `None` when it is not known.
    fn credentials(&self, data_source: &str) -> Option<DatabaseCredentials>;
}

/// Serves one fixed login for one data source.
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    data_source: String,
    credentials: DatabaseCredentials,
}

impl StaticCredentialProvider {
    pub fn new(data_source: impl Into<String>, credentials: DatabaseCredentials) -> Self {
        Self {
            data_source: data_source.into(),
            credentials,
        }
    }

    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self::new(
            config.data_source.clone(),
            DatabaseCredentials::new(config.username.clone(), config.password.clone()),
        )
    }

    pub fn data_source(&self) -> &str {
        &self.data_source
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn credentials(&self, data_source: &str) -> Option<DatabaseCredentials> {
        (data_source == self.data_source).then(|| self.credentials.clone())
    }
}
