use serde::de::DeserializeOwned;

use super::SqlDataAccess;
use super::session::{Ending, Session};
use crate::error::DbAccessError;
use crate::mapping::from_row;
use crate::params::IntoProcedureParams;
use crate::results::CustomDbRow;

fn no_session(operation: &str) -> DbAccessError {
    DbAccessError::InvalidState(format!(
        "{operation} requires an active transaction; call start_transaction first"
    ))
}

impl SqlDataAccess {
    /// Open a connection, begin a transaction on it and keep both as the session.
    ///
    /// # Errors
    /// Returns [`DbAccessError::InvalidState`] if a session is already active
    /// (the existing session is left untouched), [`DbAccessError::ConfigError`]
    /// if `connection_name` is unknown, or [`DbAccessError::DataAccess`] if the
    /// connection or the transaction cannot be opened. A connection whose
    /// transaction failed to begin is closed before returning.
    pub async fn start_transaction(&mut self, connection_name: &str) -> Result<(), DbAccessError> {
        if let Some(session) = self.session.get_mut() {
            return Err(DbAccessError::InvalidState(format!(
                "a transaction on '{}' is already active; commit or roll it back first",
                session.connection_name()
            )));
        }
        let connection_string = self.connection_string(connection_name)?;

        let mut connection = self.driver.open(&connection_string).await?;
        let transaction = match connection.begin_transaction().await {
            Ok(transaction) => transaction,
            Err(err) => {
                if let Err(close_err) = connection.close().await {
                    tracing::warn!(
                        connection = connection_name,
                        error = %close_err,
                        "closing connection after failed begin also failed"
                    );
                }
                return Err(err.into());
            }
        };
        tracing::info!(connection = connection_name, "transaction started");
        *self.session.get_mut() = Some(Session::new(connection, transaction, connection_name));
        Ok(())
    }

    /// Invoke `procedure` inside the session and map every row onto `T`.
    ///
    /// # Errors
    /// Returns [`DbAccessError::InvalidState`] when no session is active,
    /// [`DbAccessError::DataAccess`] for driver faults and
    /// [`DbAccessError::MappingError`] if a row does not fit `T`. A failed call
    /// does not roll the session back.
    pub async fn load_in_transaction<T, P>(
        &mut self,
        procedure: &str,
        params: P,
    ) -> Result<Vec<T>, DbAccessError>
    where
        T: DeserializeOwned,
        P: IntoProcedureParams,
    {
        self.load_in_transaction_with(procedure, params, from_row)
            .await
    }

    /// [`load_in_transaction`](Self::load_in_transaction) with a caller-supplied row mapper.
    ///
    /// # Errors
    /// As [`load_in_transaction`](Self::load_in_transaction), plus any error returned by `map`.
    pub async fn load_in_transaction_with<T, P, F>(
        &mut self,
        procedure: &str,
        params: P,
        map: F,
    ) -> Result<Vec<T>, DbAccessError>
    where
        P: IntoProcedureParams,
        F: FnMut(&CustomDbRow) -> Result<T, DbAccessError>,
    {
        let session = self
            .session
            .get_mut()
            .as_mut()
            .ok_or_else(|| no_session("load_in_transaction"))?;
        let params = params.into_procedure_params()?;
        tracing::debug!(
            procedure,
            connection = %session.connection_name(),
            params = params.len(),
            "calling stored procedure in transaction"
        );
        let (connection, transaction) = session.parts();
        let rows = connection
            .query(procedure, &params, Some(transaction))
            .await?;
        tracing::debug!(procedure, rows = rows.len(), "procedure returned");
        rows.map_rows(map)
    }

    /// Invoke `procedure` inside the session for its side effects.
    ///
    /// # Errors
    /// Returns [`DbAccessError::InvalidState`] when no session is active and
    /// [`DbAccessError::DataAccess`] for driver faults. A failed call does not
    /// roll the session back.
    pub async fn save_in_transaction<P>(
        &mut self,
        procedure: &str,
        params: P,
    ) -> Result<(), DbAccessError>
    where
        P: IntoProcedureParams,
    {
        let session = self
            .session
            .get_mut()
            .as_mut()
            .ok_or_else(|| no_session("save_in_transaction"))?;
        let params = params.into_procedure_params()?;
        tracing::debug!(
            procedure,
            connection = %session.connection_name(),
            params = params.len(),
            "calling stored procedure in transaction"
        );
        let (connection, transaction) = session.parts();
        let affected = connection
            .execute(procedure, &params, Some(transaction))
            .await?;
        tracing::debug!(procedure, rows_affected = affected, "procedure returned");
        Ok(())
    }

    /// Commit the session and close its connection.
    ///
    /// Without an active session this is a no-op, so committing twice is fine.
    ///
    /// # Errors
    /// Returns [`DbAccessError::DataAccess`] if the commit or the close fails.
    /// The session is over either way.
    pub async fn commit_transaction(&mut self) -> Result<(), DbAccessError> {
        match self.session.get_mut().take() {
            Some(session) => session.end(Ending::Commit).await,
            None => {
                tracing::debug!("commit requested with no active transaction; nothing to do");
                Ok(())
            }
        }
    }

    /// Roll the session back and close its connection.
    ///
    /// # Errors
    /// Returns [`DbAccessError::InvalidState`] when no session is active and
    /// [`DbAccessError::DataAccess`] if the rollback or the close fails. The
    /// session is over either way.
    pub async fn rollback_transaction(&mut self) -> Result<(), DbAccessError> {
        let session = self
            .session
            .get_mut()
            .take()
            .ok_or_else(|| no_session("rollback_transaction"))?;
        session.end(Ending::Rollback).await
    }
}
