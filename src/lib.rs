//! Generic stored-procedure data access.
//!
//! [`SqlDataAccess`] invokes named stored procedures through a pluggable
//! [`Driver`], either ad hoc (one connection per call) or inside an explicit
//! transactional session that shares one connection and one transaction.
//! Connection strings come from an injected [`ConnectionStringProvider`];
//! rows map onto any `serde::Deserialize` type by column name.
//!
//! A session that is never committed or rolled back is **committed** when the
//! executor is disposed. Prefer [`SqlDataAccess::with_transaction`] or an
//! explicit [`SqlDataAccess::dispose`] so that commit happens at a known point.

pub mod blocking;
pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod mapping;
pub mod params;
pub mod prelude;
pub mod responses;
pub mod results;
pub mod types;

#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "mssql")]
pub mod mssql;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{AppSettings, ConnectionStringProvider, ConnectionStrings, EnvConnectionStrings};
pub use driver::{Driver, DriverConnection, TransactionHandle};
pub use error::{DbAccessError, DriverError};
pub use executor::{SessionState, SqlDataAccess, TransactionWork, with_cancellation};
pub use params::{IntoProcedureParams, ModelParams, ProcedureParams};
pub use results::{CustomDbRow, ResultSet};
pub use types::{DatabaseType, RowValues};
