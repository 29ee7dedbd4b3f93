// MSSQL driver - native stored procedures over tiberius
//
// - config: the `Driver` implementation and ADO connection-string handling
// - client: raw client creation
// - query: EXEC statement building, parameter binding and result building
// - connection: the `DriverConnection` implementation

pub mod client;
pub mod config;
pub mod connection;
pub mod query;

pub use client::{MssqlClient, create_mssql_client};
pub use config::MssqlDriver;
pub use connection::MssqlConnection;
pub use query::{build_exec_statement, build_result_set};
