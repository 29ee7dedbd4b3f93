use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::{ConnectionStringProvider, unresolved};
use crate::error::DbAccessError;

/// Settings file in the `appsettings.json` shape:
///
/// ```json
/// {
///   "ConnectionStrings": { "Default": "Data Source=app.db" },
///   "Procedures": { "usp_User_Get": "SELECT Id, Name FROM users WHERE Id = :Id" }
/// }
/// ```
///
/// `Procedures` is only consulted by drivers without native stored procedures
/// (see `SqliteDriver`). Unknown top-level sections are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppSettings {
    #[serde(rename = "ConnectionStrings", default)]
    pub connection_strings: HashMap<String, String>,
    #[serde(rename = "Procedures", default)]
    pub procedures: HashMap<String, String>,
}

impl AppSettings {
    /// Parse settings from JSON text.
    ///
    /// # Errors
    /// Returns [`DbAccessError::ConfigError`] if the text is not valid settings JSON.
    pub fn from_json_str(json: &str) -> Result<Self, DbAccessError> {
        serde_json::from_str(json)
            .map_err(|e| DbAccessError::ConfigError(format!("invalid settings JSON: {e}")))
    }

    /// Read and parse a settings file.
    ///
    /// # Errors
    /// Returns [`DbAccessError::ConfigError`] if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DbAccessError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DbAccessError::ConfigError(format!("cannot read settings file {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }
}

impl ConnectionStringProvider for AppSettings {
    fn resolve(&self, name: &str) -> Result<String, DbAccessError> {
        match self.connection_strings.get(name) {
            Some(value) if !value.trim().is_empty() => Ok(value.clone()),
            _ => Err(unresolved(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SETTINGS: &str = r#"{
        "Logging": { "LogLevel": { "Default": "Information" } },
        "ConnectionStrings": { "Default": "Data Source=app.db" },
        "Procedures": { "usp_Ping": "SELECT 1 AS Pong" }
    }"#;

    #[test]
    fn reads_connection_strings_section() {
        let settings = AppSettings::from_json_str(SETTINGS).unwrap();
        assert_eq!(settings.resolve("Default").unwrap(), "Data Source=app.db");
        assert_eq!(settings.procedures["usp_Ping"], "SELECT 1 AS Pong");
        assert!(matches!(
            settings.resolve("Other"),
            Err(DbAccessError::ConfigError(_))
        ));
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let settings = AppSettings::from_json_str("{}").unwrap();
        assert!(settings.connection_strings.is_empty());
        assert!(settings.procedures.is_empty());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SETTINGS.as_bytes()).unwrap();
        let settings = AppSettings::from_json_file(file.path()).unwrap();
        assert_eq!(settings.connection_strings.len(), 1);

        let err = AppSettings::from_json_file(file.path().with_extension("missing")).unwrap_err();
        assert!(matches!(err, DbAccessError::ConfigError(_)));
    }
}
