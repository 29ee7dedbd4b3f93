//! Connection-string resolution.
//!
//! The executor never reads ambient configuration; it is handed a
//! [`ConnectionStringProvider`] at construction and asks it for a connection
//! string by logical name on every ad-hoc call and on `start_transaction`.

mod env;
mod settings;

use std::collections::HashMap;

pub use env::EnvConnectionStrings;
pub use settings::AppSettings;

use crate::error::DbAccessError;

/// Key→connection-string lookup consumed by the executor.
pub trait ConnectionStringProvider: Send + Sync {
    /// Resolve a logical connection name.
    ///
    /// # Errors
    /// Returns [`DbAccessError::ConfigError`] if the name is unknown.
    fn resolve(&self, name: &str) -> Result<String, DbAccessError>;
}

pub(crate) fn unresolved(name: &str) -> DbAccessError {
    DbAccessError::ConfigError(format!("connection string '{name}' is not configured"))
}

/// In-memory connection strings.
///
/// ```rust
/// use db_access::config::{ConnectionStringProvider, ConnectionStrings};
///
/// let strings = ConnectionStrings::new().with("Default", "app.db");
/// assert_eq!(strings.resolve("Default").unwrap(), "app.db");
/// assert!(strings.resolve("Reporting").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConnectionStrings {
    entries: HashMap<String, String>,
}

impl ConnectionStrings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, connection_string: impl Into<String>) -> Self {
        self.insert(name, connection_string);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, connection_string: impl Into<String>) {
        self.entries.insert(name.into(), connection_string.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<HashMap<String, String>> for ConnectionStrings {
    fn from(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }
}

impl ConnectionStringProvider for ConnectionStrings {
    fn resolve(&self, name: &str) -> Result<String, DbAccessError> {
        match self.entries.get(name) {
            Some(value) if !value.trim().is_empty() => Ok(value.clone()),
            _ => Err(unresolved(name)),
        }
    }
}
