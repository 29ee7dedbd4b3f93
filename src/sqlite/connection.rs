use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::config::ProcedureCatalog;
use super::params::bind_procedure_params;
use super::query::build_result_set;
use crate::driver::{DriverConnection, TransactionHandle, check_transaction};
use crate::error::DriverError;
use crate::params::ProcedureParams;
use crate::results::ResultSet;

pub(crate) type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;

/// One `SQLite` connection. Blocking `rusqlite` work is moved onto tokio's
/// blocking pool; dropping the connection closes it, and `SQLite` discards any
/// transaction still open at that point.
pub struct SqliteConnection {
    conn: Option<SharedSqliteConnection>,
    catalog: Arc<ProcedureCatalog>,
    open_transaction: Option<u64>,
    transactions_started: u64,
}

impl SqliteConnection {
    pub(crate) fn new(conn: rusqlite::Connection, catalog: Arc<ProcedureCatalog>) -> Self {
        Self {
            conn: Some(Arc::new(Mutex::new(conn))),
            catalog,
            open_transaction: None,
            transactions_started: 0,
        }
    }

    fn conn_handle(&self) -> Result<SharedSqliteConnection, DriverError> {
        self.conn
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| DriverError::ConnectionError("SQLite connection already closed".into()))
    }

    async fn run_batch(&self, sql: &'static str) -> Result<(), DriverError> {
        run_blocking(self.conn_handle()?, move |guard| {
            guard.execute_batch(sql).map_err(DriverError::Sqlite)
        })
        .await
    }

    fn finish_transaction(&mut self, transaction: &TransactionHandle) -> Result<(), DriverError> {
        check_transaction(self.open_transaction, Some(transaction))?;
        if self.open_transaction.is_none() {
            return Err(DriverError::ExecutionError(
                "SQLite transaction not active".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("open", &self.conn.is_some())
            .field("open_transaction", &self.open_transaction)
            .finish_non_exhaustive()
    }
}

pub(crate) async fn run_blocking<F, R>(
    conn: SharedSqliteConnection,
    func: F,
) -> Result<R, DriverError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, DriverError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| DriverError::ExecutionError(format!("sqlite spawn_blocking join error: {e}")))?
}

#[async_trait]
impl DriverConnection for SqliteConnection {
    async fn begin_transaction(&mut self) -> Result<TransactionHandle, DriverError> {
        if self.open_transaction.is_some() {
            return Err(DriverError::ExecutionError(
                "SQLite transaction already in progress".into(),
            ));
        }
        self.run_batch("BEGIN").await?;
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
        let sql = self.catalog.sql_for(procedure)?;
        let params = params.clone();
        run_blocking(self.conn_handle()?, move |guard| {
            let mut stmt = guard.prepare(&sql)?;
            bind_procedure_params(&mut stmt, &params)?;
            build_result_set(&mut stmt)
        })
        .await
    }

    async fn execute(
        &mut self,
        procedure: &str,
        params: &ProcedureParams,
        transaction: Option<&TransactionHandle>,
    ) -> Result<usize, DriverError> {
        check_transaction(self.open_transaction, transaction)?;
        let sql = self.catalog.sql_for(procedure)?;
        let params = params.clone();
        run_blocking(self.conn_handle()?, move |guard| {
            let mut stmt = guard.prepare(&sql)?;
            bind_procedure_params(&mut stmt, &params)?;
            Ok(stmt.raw_execute()?)
        })
        .await
    }

    async fn commit(&mut self, transaction: TransactionHandle) -> Result<(), DriverError> {
        self.finish_transaction(&transaction)?;
        self.run_batch("COMMIT").await?;
        self.open_transaction = None;
        Ok(())
    }

    async fn rollback(&mut self, transaction: TransactionHandle) -> Result<(), DriverError> {
        self.finish_transaction(&transaction)?;
        self.run_batch("ROLLBACK").await?;
        self.open_transaction = None;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        let Some(handle) = self.conn.take() else {
            return Ok(());
        };
        self.open_transaction = None;
        match Arc::try_unwrap(handle) {
            Ok(mutex) => {
                let conn = mutex.into_inner();
                tokio::task::spawn_blocking(move || conn.close().map_err(|(_, err)| err))
                    .await
                    .map_err(|e| {
                        DriverError::ConnectionError(format!(
                            "sqlite spawn_blocking join error: {e}"
                        ))
                    })?
                    .map_err(DriverError::Sqlite)
            }
            // a blocking call still holds a clone; the last clone closes it
            Err(_) => Ok(()),
        }
    }
}
