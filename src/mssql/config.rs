use async_trait::async_trait;

use super::client::create_mssql_client;
use super::connection::MssqlConnection;
use crate::driver::{Driver, DriverConnection};
use crate::error::DriverError;

/// SQL Server driver. Connection strings use the ADO.NET format, e.g.
/// `Server=tcp:localhost,1433;Database=app;User Id=sa;Password=...;TrustServerCertificate=true`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlDriver;

impl MssqlDriver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for MssqlDriver {
    async fn open(
        &self,
        connection_string: &str,
    ) -> Result<Box<dyn DriverConnection>, DriverError> {
        let client = create_mssql_client(connection_string).await?;
        tracing::debug!("opened SQL Server connection");
        Ok(Box::new(MssqlConnection::new(client)))
    }
}
