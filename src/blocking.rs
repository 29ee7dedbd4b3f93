//! Synchronous facade over [`SqlDataAccess`].
//!
//! [`BlockingSqlDataAccess`] owns a current-thread tokio runtime and drives the
//! async executor on it, so it must not be used from inside another runtime.
//! Dropping it with an open session commits that session before `drop`
//! returns.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::runtime::{Builder, Runtime};

use crate::config::ConnectionStringProvider;
use crate::driver::Driver;
use crate::error::DbAccessError;
use crate::executor::{SessionState, SqlDataAccess};
use crate::params::IntoProcedureParams;
use crate::results::CustomDbRow;

pub struct BlockingSqlDataAccess {
    // `None` only after `dispose` has taken it.
    inner: Option<SqlDataAccess>,
    runtime: Runtime,
}

fn released() -> DbAccessError {
    DbAccessError::InvalidState("executor has already been disposed".into())
}

impl BlockingSqlDataAccess {
    /// # Errors
    /// Returns [`DbAccessError::ConfigError`] if the runtime cannot be built.
    pub fn new(
        config: Arc<dyn ConnectionStringProvider>,
        driver: Arc<dyn Driver>,
    ) -> Result<Self, DbAccessError> {
        Self::from_async(SqlDataAccess::new(config, driver))
    }

    /// Wrap an existing async executor.
    ///
    /// # Errors
    /// Returns [`DbAccessError::ConfigError`] if the runtime cannot be built.
    pub fn from_async(inner: SqlDataAccess) -> Result<Self, DbAccessError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DbAccessError::ConfigError(format!("cannot build tokio runtime: {e}")))?;
        Ok(Self {
            inner: Some(inner),
            runtime,
        })
    }

    fn parts(&mut self) -> Result<(&Runtime, &mut SqlDataAccess), DbAccessError> {
        let inner = self.inner.as_mut().ok_or_else(released)?;
        Ok((&self.runtime, inner))
    }

    /// # Errors
    /// See [`SqlDataAccess::connection_string`].
    pub fn connection_string(&self, connection_name: &str) -> Result<String, DbAccessError> {
        self.inner
            .as_ref()
            .ok_or_else(released)?
            .connection_string(connection_name)
    }

    #[must_use]
    pub fn state(&mut self) -> SessionState {
        self.inner
            .as_mut()
            .map_or(SessionState::Idle, SqlDataAccess::state)
    }

    /// # Errors
    /// See [`SqlDataAccess::load`].
    pub fn load<T, P>(
        &mut self,
        procedure: &str,
        params: P,
        connection_name: &str,
    ) -> Result<Vec<T>, DbAccessError>
    where
        T: DeserializeOwned,
        P: IntoProcedureParams,
    {
        let (runtime, inner) = self.parts()?;
        runtime.block_on(inner.load(procedure, params, connection_name))
    }

    /// # Errors
    /// See [`SqlDataAccess::load_with`].
    pub fn load_with<T, P, F>(
        &mut self,
        procedure: &str,
        params: P,
        connection_name: &str,
        map: F,
    ) -> Result<Vec<T>, DbAccessError>
    where
        P: IntoProcedureParams,
        F: FnMut(&CustomDbRow) -> Result<T, DbAccessError>,
    {
        let (runtime, inner) = self.parts()?;
        runtime.block_on(inner.load_with(procedure, params, connection_name, map))
    }

    /// # Errors
    /// See [`SqlDataAccess::save`].
    pub fn save<P: IntoProcedureParams>(
        &mut self,
        procedure: &str,
        params: P,
        connection_name: &str,
    ) -> Result<(), DbAccessError> {
        let (runtime, inner) = self.parts()?;
        runtime.block_on(inner.save(procedure, params, connection_name))
    }

    /// # Errors
    /// See [`SqlDataAccess::start_transaction`].
    pub fn start_transaction(&mut self, connection_name: &str) -> Result<(), DbAccessError> {
        let (runtime, inner) = self.parts()?;
        runtime.block_on(inner.start_transaction(connection_name))
    }

    /// # Errors
    /// See [`SqlDataAccess::load_in_transaction`].
    pub fn load_in_transaction<T, P>(
        &mut self,
        procedure: &str,
        params: P,
    ) -> Result<Vec<T>, DbAccessError>
    where
        T: DeserializeOwned,
        P: IntoProcedureParams,
    {
        let (runtime, inner) = self.parts()?;
        runtime.block_on(inner.load_in_transaction(procedure, params))
    }

    /// # Errors
    /// See [`SqlDataAccess::save_in_transaction`].
    pub fn save_in_transaction<P: IntoProcedureParams>(
        &mut self,
        procedure: &str,
        params: P,
    ) -> Result<(), DbAccessError> {
        let (runtime, inner) = self.parts()?;
        runtime.block_on(inner.save_in_transaction(procedure, params))
    }

    /// # Errors
    /// See [`SqlDataAccess::commit_transaction`].
    pub fn commit_transaction(&mut self) -> Result<(), DbAccessError> {
        let (runtime, inner) = self.parts()?;
        runtime.block_on(inner.commit_transaction())
    }

    /// # Errors
    /// See [`SqlDataAccess::rollback_transaction`].
    pub fn rollback_transaction(&mut self) -> Result<(), DbAccessError> {
        let (runtime, inner) = self.parts()?;
        runtime.block_on(inner.rollback_transaction())
    }

    /// Commit a session that was never ended and release the executor.
    ///
    /// # Errors
    /// Returns [`DbAccessError::Disposal`] wrapping the commit failure.
    pub fn dispose(mut self) -> Result<(), DbAccessError> {
        match self.inner.take() {
            Some(inner) => self.runtime.block_on(inner.dispose()),
            None => Ok(()),
        }
    }
}

impl Drop for BlockingSqlDataAccess {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take()
            && let Err(err) = self.runtime.block_on(inner.dispose())
        {
            tracing::error!(error = %err, "{err}");
        }
    }
}
