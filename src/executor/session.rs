use crate::driver::{DriverConnection, TransactionHandle};
use crate::error::{DbAccessError, DriverError};

/// One open connection with its open transaction.
pub(crate) struct Session {
    connection: Box<dyn DriverConnection>,
    transaction: TransactionHandle,
    connection_name: String,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Ending {
    Commit,
    Rollback,
}

impl Session {
    pub(crate) fn new(
        connection: Box<dyn DriverConnection>,
        transaction: TransactionHandle,
        connection_name: &str,
    ) -> Self {
        Self {
            connection,
            transaction,
            connection_name: connection_name.to_owned(),
        }
    }

    pub(crate) fn connection_name(&self) -> &str {
        &self.connection_name
    }

    /// The connection and the transaction every statement of the session runs in.
    pub(crate) fn parts(&mut self) -> (&mut dyn DriverConnection, &TransactionHandle) {
        (self.connection.as_mut(), &self.transaction)
    }

    /// Commit or roll back, then close the connection whatever the outcome.
    pub(crate) async fn end(self, ending: Ending) -> Result<(), DbAccessError> {
        let Session {
            mut connection,
            transaction,
            connection_name,
        } = self;
        let outcome = match ending {
            Ending::Commit => connection.commit(transaction).await,
            Ending::Rollback => connection.rollback(transaction).await,
        };
        let closed = connection.close().await;
        match &outcome {
            Ok(()) => tracing::info!(connection = %connection_name, ?ending, "transaction ended"),
            Err(err) => {
                tracing::debug!(connection = %connection_name, ?ending, error = %err, "transaction end failed");
            }
        }
        settle(outcome, closed)
    }
}

/// Combine a call's outcome with the close that followed it; the call's own
/// error wins over a close error.
pub(crate) fn settle<T>(
    outcome: Result<T, DriverError>,
    closed: Result<(), DriverError>,
) -> Result<T, DbAccessError> {
    match (outcome, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err.into()),
        (Err(err), Ok(())) => Err(err.into()),
        (Err(err), Err(close_err)) => {
            tracing::warn!(error = %close_err, "closing connection after a failed call also failed");
            Err(err.into())
        }
    }
}
