use std::future::Future;
use std::pin::Pin;

use super::SqlDataAccess;
use crate::error::DbAccessError;

/// The boxed body of [`SqlDataAccess::with_transaction`].
pub type TransactionWork<'s, T> =
    Pin<Box<dyn Future<Output = Result<T, DbAccessError>> + Send + 's>>;

impl SqlDataAccess {
    /// Run `work` inside a session that is finished deterministically when it returns.
    ///
    /// `work` may commit or roll back itself. If it leaves the session open,
    /// the session is committed, whether `work` succeeded or not.
    ///
    /// ```rust,no_run
    /// # use db_access::prelude::*;
    /// # async fn demo(db: &mut SqlDataAccess) -> Result<(), DbAccessError> {
    /// let moved = db
    ///     .with_transaction("Default", |tx| {
    ///         Box::pin(async move {
    ///             tx.save_in_transaction("Debit", ProcedureParams::new().with("Amount", 10)).await?;
    ///             tx.save_in_transaction("Credit", ProcedureParams::new().with("Amount", 10)).await?;
    ///             Ok(10)
    ///         })
    ///     })
    ///     .await?;
    /// # let _ = moved;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// Returns any error from starting the session, then the error returned by
    /// `work`, then [`DbAccessError::Disposal`] if the closing commit fails.
    pub async fn with_transaction<T, F>(
        &mut self,
        connection_name: &str,
        work: F,
    ) -> Result<T, DbAccessError>
    where
        F: for<'s> FnOnce(&'s mut SqlDataAccess) -> TransactionWork<'s, T>,
    {
        self.start_transaction(connection_name).await?;
        let outcome = work(self).await;
        let finished = self.commit_abandoned().await;
        match (outcome, finished) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) | (Err(err), Ok(())) => Err(err),
            (Err(err), Err(finish_err)) => {
                tracing::warn!(error = %finish_err, "commit after failed transaction body also failed");
                Err(err)
            }
        }
    }
}
