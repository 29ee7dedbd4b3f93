use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::connection::SqliteConnection;
use crate::config::AppSettings;
use crate::driver::{Driver, DriverConnection};
use crate::error::DriverError;

/// Named SQL statements standing in for stored procedures.
#[derive(Debug, Clone, Default)]
pub struct ProcedureCatalog {
    procedures: HashMap<String, Arc<str>>,
}

impl ProcedureCatalog {
    pub fn insert(&mut self, name: impl Into<String>, sql: impl AsRef<str>) {
        self.procedures.insert(name.into(), Arc::from(sql.as_ref()));
    }

    /// Look up a procedure; exact names win, then ASCII case-insensitive ones.
    ///
    /// # Errors
    /// Returns [`DriverError::ExecutionError`] if no procedure has that name.
    pub fn sql_for(&self, procedure: &str) -> Result<Arc<str>, DriverError> {
        self.procedures
            .get(procedure)
            .or_else(|| {
                self.procedures
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(procedure))
                    .map(|(_, sql)| sql)
            })
            .cloned()
            .ok_or_else(|| {
                DriverError::ExecutionError(format!(
                    "Could not find stored procedure '{procedure}'"
                ))
            })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}

/// Options applied to every connection the driver opens.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub busy_timeout: Duration,
    pub wal: bool,
    pub init_batch: Option<String>,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            wal: false,
            init_batch: None,
        }
    }
}

/// `SQLite` driver: one `rusqlite::Connection` per `open`, procedures resolved
/// from a [`ProcedureCatalog`].
///
/// ```rust
/// use db_access::sqlite::SqliteDriver;
///
/// let driver = SqliteDriver::new()
///     .with_procedure("usp_User_Insert", "INSERT INTO users (id, name) VALUES (:Id, :Name)")
///     .with_procedure("usp_User_GetAll", "SELECT id AS Id, name AS Name FROM users");
/// # let _ = driver;
/// ```
#[derive(Debug, Clone, Default)]
pub struct SqliteDriver {
    catalog: Arc<ProcedureCatalog>,
    options: SqliteOptions,
}

impl SqliteDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a driver whose catalog is the `Procedures` section of the settings.
    #[must_use]
    pub fn from_settings(settings: &AppSettings) -> Self {
        let mut catalog = ProcedureCatalog::default();
        for (name, sql) in &settings.procedures {
            catalog.insert(name.clone(), sql);
        }
        Self {
            catalog: Arc::new(catalog),
            options: SqliteOptions::default(),
        }
    }

    #[must_use]
    pub fn with_procedure(mut self, name: impl Into<String>, sql: impl AsRef<str>) -> Self {
        Arc::make_mut(&mut self.catalog).insert(name, sql);
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: SqliteOptions) -> Self {
        self.options = options;
        self
    }

    /// Switch file databases to WAL journaling on open.
    #[must_use]
    pub fn wal(mut self, enabled: bool) -> Self {
        self.options.wal = enabled;
        self
    }

    /// Statements run once on every new connection (pragmas, temp tables).
    #[must_use]
    pub fn init_batch(mut self, sql: impl Into<String>) -> Self {
        self.options.init_batch = Some(sql.into());
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &ProcedureCatalog {
        &self.catalog
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    async fn open(
        &self,
        connection_string: &str,
    ) -> Result<Box<dyn DriverConnection>, DriverError> {
        let path = database_path(connection_string)?;
        let options = self.options.clone();
        tracing::debug!(path = %path, "opening sqlite connection");

        let conn = tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&path)?;
            conn.busy_timeout(options.busy_timeout)?;
            if options.wal {
                conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            }
            if let Some(batch) = &options.init_batch {
                conn.execute_batch(batch)?;
            }
            Ok::<_, DriverError>(conn)
        })
        .await
        .map_err(|e| {
            DriverError::ConnectionError(format!("sqlite spawn_blocking join error: {e}"))
        })??;

        Ok(Box::new(SqliteConnection::new(
            conn,
            Arc::clone(&self.catalog),
        )))
    }
}

/// Extract the database path from a connection string.
///
/// Accepts a bare path, `:memory:`, a `file:` URI, or ADO-style key/value
/// pairs with a `Data Source`/`DataSource`/`Filename` key.
///
/// # Errors
/// Returns [`DriverError::ConnectionError`] if no path can be found.
pub fn database_path(connection_string: &str) -> Result<String, DriverError> {
    let trimmed = connection_string.trim();
    if trimmed.is_empty() {
        return Err(DriverError::ConnectionError(
            "empty sqlite connection string".into(),
        ));
    }
    if trimmed.starts_with("file:") || trimmed == ":memory:" || !trimmed.contains('=') {
        return Ok(trimmed.to_owned());
    }

    trimmed
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| {
            let key = key.trim();
            key.eq_ignore_ascii_case("data source")
                || key.eq_ignore_ascii_case("datasource")
                || key.eq_ignore_ascii_case("filename")
        })
        .map(|(_, value)| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            DriverError::ConnectionError(format!(
                "sqlite connection string has no Data Source: {trimmed}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_connection_string_forms() {
        assert_eq!(database_path("app.db").unwrap(), "app.db");
        assert_eq!(database_path(":memory:").unwrap(), ":memory:");
        assert_eq!(
            database_path("file:mem1?mode=memory&cache=shared").unwrap(),
            "file:mem1?mode=memory&cache=shared"
        );
        assert_eq!(
            database_path("Data Source=/tmp/x.db;Cache=Shared").unwrap(),
            "/tmp/x.db"
        );
        assert_eq!(database_path("filename = y.db").unwrap(), "y.db");
        assert!(database_path("Mode=ReadOnly").is_err());
        assert!(database_path("  ").is_err());
    }

    #[test]
    fn catalog_lookup_falls_back_to_case_insensitive() {
        let driver = SqliteDriver::new().with_procedure("usp_Get", "SELECT 1");
        assert_eq!(&*driver.catalog().sql_for("USP_GET").unwrap(), "SELECT 1");
        assert!(matches!(
            driver.catalog().sql_for("usp_Missing"),
            Err(DriverError::ExecutionError(_))
        ));
    }

    #[test]
    fn settings_fill_the_catalog() {
        let settings = AppSettings::from_json_str(
            r#"{"Procedures": {"usp_A": "SELECT 1", "usp_B": "SELECT 2"}}"#,
        )
        .unwrap();
        assert_eq!(SqliteDriver::from_settings(&settings).catalog().len(), 2);
    }
}
