use async_trait::async_trait;

use super::client::MssqlClient;
use super::query::{build_exec_statement, build_result_set, execute_statement};
use crate::driver::{DriverConnection, TransactionHandle, check_transaction};
use crate::error::DriverError;
use crate::params::ProcedureParams;
use crate::results::ResultSet;

/// One SQL Server connection. Dropping it closes the TCP stream; the server
/// rolls back a transaction left open on a closed session.
pub struct MssqlConnection {
    client: Option<MssqlClient>,
    open_transaction: Option<u64>,
    transactions_started: u64,
}

impl MssqlConnection {
    pub(crate) fn new(client: MssqlClient) -> Self {
        Self {
            client: Some(client),
            open_transaction: None,
            transactions_started: 0,
        }
    }

    fn client_mut(&mut self) -> Result<&mut MssqlClient, DriverError> {
        self.client
            .as_mut()
            .ok_or_else(|| DriverError::ConnectionError("SQL Server connection already closed".into()))
    }

    async fn simple(&mut self, sql: &str) -> Result<(), DriverError> {
        execute_statement(self.client_mut()?, sql, &[]).await?;
        Ok(())
    }
}

impl std::fmt::Debug for MssqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlConnection")
            .field("client", &"<TiberiusClient>")
            .field("open_transaction", &self.open_transaction)
            .finish()
    }
}

#[async_trait]
impl DriverConnection for MssqlConnection {
    async fn begin_transaction(&mut self) -> Result<TransactionHandle, DriverError> {
        if self.open_transaction.is_some() {
            return Err(DriverError::ExecutionError(
                "SQL Server transaction already in progress".into(),
            ));
        }
        self.simple("BEGIN TRANSACTION").await?;
        self.transactions_started += 1;
        self.open_transaction = Some(self.transactions_started);
        Ok(TransactionHandle::new(self.transactions_started))
    }

    async fn query(
        &mut self,
        procedure: &str,
        params: &ProcedureParams,
        transaction: Option<&TransactionHandle>,
    ) -> Result<ResultSet, DriverError> {
        check_transaction(self.open_transaction, transaction)?;
        let (sql, values) = build_exec_statement(procedure, params)?;
        build_result_set(self.client_mut()?, &sql, &values).await
    }

    async fn execute(
        &mut self,
        procedure: &str,
        params: &ProcedureParams,
        transaction: Option<&TransactionHandle>,
    ) -> Result<usize, DriverError> {
        check_transaction(self.open_transaction, transaction)?;
        let (sql, values) = build_exec_statement(procedure, params)?;
        execute_statement(self.client_mut()?, &sql, &values).await
    }

    async fn commit(&mut self, transaction: TransactionHandle) -> Result<(), DriverError> {
        check_transaction(self.open_transaction, Some(&transaction))?;
        self.simple("COMMIT TRANSACTION").await?;
        self.open_transaction = None;
        Ok(())
    }

    async fn rollback(&mut self, transaction: TransactionHandle) -> Result<(), DriverError> {
        check_transaction(self.open_transaction, Some(&transaction))?;
        self.simple("ROLLBACK TRANSACTION").await?;
        self.open_transaction = None;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.open_transaction = None;
        match self.client.take() {
            Some(client) => client.close().await.map_err(DriverError::Mssql),
            None => Ok(()),
        }
    }
}
