use serde::de::DeserializeOwned;

use super::SqlDataAccess;
use super::session::settle;
use crate::error::DbAccessError;
use crate::mapping::from_row;
use crate::params::{IntoProcedureParams, ProcedureParams};
use crate::results::{CustomDbRow, ResultSet};

enum Call {
    Query,
    Execute,
}

enum Outcome {
    Rows(ResultSet),
    Affected(usize),
}

impl SqlDataAccess {
    /// Invoke `procedure` on a fresh connection and map every row onto `T`.
    ///
    /// # Errors
    /// Returns [`DbAccessError::ConfigError`] before any connection is opened
    /// if `connection_name` is unknown, [`DbAccessError::DataAccess`] for
    /// driver faults and [`DbAccessError::MappingError`] if a row does not fit `T`.
    pub async fn load<T, P>(
        &self,
        procedure: &str,
        params: P,
        connection_name: &str,
    ) -> Result<Vec<T>, DbAccessError>
    where
        T: DeserializeOwned,
        P: IntoProcedureParams,
    {
        self.load_with(procedure, params, connection_name, from_row)
            .await
    }

    /// [`load`](Self::load) with a caller-supplied row mapper.
    ///
    /// # Errors
    /// As [`load`](Self::load), plus any error returned by `map`.
    pub async fn load_with<T, P, F>(
        &self,
        procedure: &str,
        params: P,
        connection_name: &str,
        map: F,
    ) -> Result<Vec<T>, DbAccessError>
    where
        P: IntoProcedureParams,
        F: FnMut(&CustomDbRow) -> Result<T, DbAccessError>,
    {
        match self
            .call_once(Call::Query, procedure, params, connection_name)
            .await?
        {
            Outcome::Rows(rows) => rows.map_rows(map),
            Outcome::Affected(_) => Ok(Vec::new()),
        }
    }

    /// Invoke `procedure` on a fresh connection for its side effects.
    ///
    /// # Errors
    /// Returns [`DbAccessError::ConfigError`] if `connection_name` is unknown
    /// and [`DbAccessError::DataAccess`] for driver faults.
    pub async fn save<P>(
        &self,
        procedure: &str,
        params: P,
        connection_name: &str,
    ) -> Result<(), DbAccessError>
    where
        P: IntoProcedureParams,
    {
        self.call_once(Call::Execute, procedure, params, connection_name)
            .await
            .map(|_| ())
    }

    async fn call_once<P: IntoProcedureParams>(
        &self,
        call: Call,
        procedure: &str,
        params: P,
        connection_name: &str,
    ) -> Result<Outcome, DbAccessError> {
        let connection_string = self.connection_string(connection_name)?;
        let params: ProcedureParams = params.into_procedure_params()?;

        let mut connection = self.driver.open(&connection_string).await?;
        tracing::debug!(
            procedure,
            connection = connection_name,
            params = params.len(),
            "calling stored procedure"
        );
        let outcome = match call {
            Call::Query => connection
                .query(procedure, &params, None)
                .await
                .map(Outcome::Rows),
            Call::Execute => connection
                .execute(procedure, &params, None)
                .await
                .map(Outcome::Affected),
        };
        let closed = connection.close().await;
        let outcome = settle(outcome, closed)?;
        match &outcome {
            Outcome::Rows(rows) => tracing::debug!(procedure, rows = rows.len(), "procedure returned"),
            Outcome::Affected(rows) => tracing::debug!(procedure, rows_affected = *rows, "procedure returned"),
        }
        Ok(outcome)
    }
}
