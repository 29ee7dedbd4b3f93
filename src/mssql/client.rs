use tiberius::{Client, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::error::DriverError;

/// Type alias for SQL Server client
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Connect to SQL Server using an ADO.NET-style connection string.
///
/// # Errors
/// Returns `DriverError::ConnectionError` if the string cannot be parsed or
/// the server cannot be reached.
pub async fn create_mssql_client(connection_string: &str) -> Result<MssqlClient, DriverError> {
    let config = Config::from_ado_string(connection_string).map_err(|e| {
        DriverError::ConnectionError(format!("invalid SQL Server connection string: {e}"))
    })?;

    let tcp = TcpStream::connect(config.get_addr())
        .await
        .map_err(|e| DriverError::ConnectionError(format!("TCP connection error: {e}")))?;
    tcp.set_nodelay(true)
        .map_err(|e| DriverError::ConnectionError(format!("TCP configuration error: {e}")))?;

    Client::connect(config, tcp.compat_write())
        .await
        .map_err(|e| DriverError::ConnectionError(format!("SQL Server connection error: {e}")))
}
