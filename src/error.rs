use thiserror::Error;

/// Faults raised by a database driver: connectivity, constraint violations,
/// timeouts. They are not distinguished further and travel to the caller
/// unchanged inside [`DbAccessError::DataAccess`].
#[derive(Debug, Error)]
pub enum DriverError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "mssql")]
    #[error(transparent)]
    Mssql(#[from] tiberius::error::Error),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Other database error: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum DbAccessError {
    /// A connection name could not be resolved to a connection string.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Any driver-level failure.
    #[error(transparent)]
    DataAccess(#[from] DriverError),

    /// A transactional operation was invoked in the wrong session state.
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// The implicit commit of an abandoned session failed.
    #[error("Failed to commit abandoned transaction: {0}")]
    Disposal(#[source] Box<DbAccessError>),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("Row mapping error: {0}")]
    MappingError(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[cfg(feature = "http")]
    #[error(transparent)]
    HttpError(#[from] reqwest::Error),
}

impl DbAccessError {
    /// The driver fault behind this error, looking through a disposal wrapper.
    #[must_use]
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            DbAccessError::DataAccess(err) => Some(err),
            DbAccessError::Disposal(inner) => inner.driver_error(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, DbAccessError::InvalidState(_))
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for DbAccessError {
    fn from(err: rusqlite::Error) -> Self {
        DbAccessError::DataAccess(DriverError::Sqlite(err))
    }
}

#[cfg(feature = "mssql")]
impl From<tiberius::error::Error> for DbAccessError {
    fn from(err: tiberius::error::Error) -> Self {
        DbAccessError::DataAccess(DriverError::Mssql(err))
    }
}
