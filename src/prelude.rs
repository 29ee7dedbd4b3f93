//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::blocking::BlockingSqlDataAccess;
pub use crate::config::{
    AppSettings, ConnectionStringProvider, ConnectionStrings, EnvConnectionStrings,
};
pub use crate::driver::{Driver, DriverConnection, TransactionHandle};
pub use crate::error::{DbAccessError, DriverError};
pub use crate::executor::{SessionState, SqlDataAccess, TransactionWork, with_cancellation};
pub use crate::mapping::{from_row, map_model};
pub use crate::params::{IntoProcedureParams, ModelParams, ProcedureParams};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::types::{DatabaseType, RowValues};

#[cfg(feature = "http")]
pub use crate::http::{HttpRequests, ReqwestHttpRequests};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{ProcedureCatalog, SqliteDriver, SqliteOptions};

#[cfg(feature = "mssql")]
pub use crate::mssql::MssqlDriver;
