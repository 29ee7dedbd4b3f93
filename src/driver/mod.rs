//! The narrow contract between the executor and a database driver.
//!
//! A driver opens connections; a connection runs stored procedures, optionally
//! inside a transaction it started. Every call is a logical stored-procedure
//! invocation; the wire protocol stays inside the driver.

use async_trait::async_trait;

use crate::error::DriverError;
use crate::params::ProcedureParams;
use crate::results::ResultSet;

/// Opens connections from connection strings.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Open a new connection.
    ///
    /// # Errors
    /// Returns a [`DriverError`] if the connection cannot be established.
    async fn open(&self, connection_string: &str)
    -> Result<Box<dyn DriverConnection>, DriverError>;
}

/// One open connection.
///
/// Implementations must release the underlying connection when dropped as well
/// as on [`close`](DriverConnection::close), so a call cancelled mid-flight
/// still gives the connection back.
#[async_trait]
pub trait DriverConnection: Send {
    /// Begin a transaction on this connection.
    ///
    /// # Errors
    /// Returns a [`DriverError`] if the transaction cannot be started.
    async fn begin_transaction(&mut self) -> Result<TransactionHandle, DriverError>;

    /// Invoke a stored procedure and collect the rows it returns.
    ///
    /// # Errors
    /// Returns a [`DriverError`] if the invocation fails.
    async fn query(
        &mut self,
        procedure: &str,
        params: &ProcedureParams,
        transaction: Option<&TransactionHandle>,
    ) -> Result<ResultSet, DriverError>;

    /// Invoke a stored procedure for its side effects and return the row count.
    ///
    /// # Errors
    /// Returns a [`DriverError`] if the invocation fails.
    async fn execute(
        &mut self,
        procedure: &str,
        params: &ProcedureParams,
        transaction: Option<&TransactionHandle>,
    ) -> Result<usize, DriverError>;

    /// # Errors
    /// Returns a [`DriverError`] if the commit fails.
    async fn commit(&mut self, transaction: TransactionHandle) -> Result<(), DriverError>;

    /// # Errors
    /// Returns a [`DriverError`] if the rollback fails.
    async fn rollback(&mut self, transaction: TransactionHandle) -> Result<(), DriverError>;

    /// # Errors
    /// Returns a [`DriverError`] if closing the connection reports a failure.
    async fn close(&mut self) -> Result<(), DriverError>;
}

/// Token for a transaction begun on a [`DriverConnection`].
///
/// It is not `Clone`: `commit` and `rollback` consume it, so a finished
/// transaction cannot be used again.
#[derive(Debug, PartialEq, Eq)]
pub struct TransactionHandle {
    id: u64,
}

impl TransactionHandle {
    /// Drivers mint handles; the id only needs to be unique per connection.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Reject a handle that does not belong to the transaction a connection has open.
///
/// # Errors
/// Returns [`DriverError::ExecutionError`] on a mismatch or when no transaction is open.
pub fn check_transaction(
    open: Option<u64>,
    given: Option<&TransactionHandle>,
) -> Result<(), DriverError> {
    match (open, given) {
        (_, None) => Ok(()),
        (Some(open), Some(given)) if open == given.id() => Ok(()),
        (Some(open), Some(given)) => Err(DriverError::ExecutionError(format!(
            "transaction {} is not the open transaction {open}",
            given.id()
        ))),
        (None, Some(given)) => Err(DriverError::ExecutionError(format!(
            "transaction {} is not open on this connection",
            given.id()
        ))),
    }
}
