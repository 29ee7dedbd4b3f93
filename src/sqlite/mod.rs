// SQLite driver - stored procedures emulated through a named SQL catalog
//
// - config: driver options, procedure catalog and connection-string parsing
// - connection: the `DriverConnection` implementation and blocking hand-off
// - params: binding procedure parameters onto statement placeholders
// - query: result extraction and building

pub mod config;
pub mod connection;
pub mod params;
pub mod query;

pub use config::{ProcedureCatalog, SqliteDriver, SqliteOptions, database_path};
pub use connection::SqliteConnection;
pub use params::{bind_procedure_params, row_value_to_sqlite_value};
pub use query::build_result_set;
