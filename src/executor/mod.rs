//! The stored-procedure executor.
//!
//! [`SqlDataAccess`] runs in two modes:
//! - ad-hoc calls (`load`, `load_with`, `save`) open a connection for the call
//!   and always close it again;
//! - a transactional session (`start_transaction` ... `commit_transaction` or
//!   `rollback_transaction`) keeps one connection and one transaction open
//!   across calls.
//!
//! A session that is never ended explicitly is **committed**, not rolled back:
//! by [`SqlDataAccess::dispose`], by the scope of
//! [`SqlDataAccess::with_transaction`], or, as a last resort, by a commit
//! run from `Drop`.

mod adhoc;
mod cancel;
mod scoped;
mod session;
mod transaction;

use std::fmt;
use std::sync::Arc;

use tokio::runtime::RuntimeFlavor;

pub use cancel::with_cancellation;
pub use scoped::TransactionWork;

use crate::config::ConnectionStringProvider;
use crate::driver::Driver;
use crate::error::DbAccessError;
use session::{Ending, Session};

/// Whether the executor currently holds a transactional session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => f.write_str("idle"),
            SessionState::Active => f.write_str("active"),
        }
    }
}

/// Generic stored-procedure data access over an injected driver and
/// connection-string provider.
///
/// Ad-hoc calls take `&self` and may run concurrently, each on its own
/// connection. Transactional calls take `&mut self`: one executor owns at most
/// one session, and statements in it run in call order.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use db_access::prelude::*;
///
/// # async fn demo() -> Result<(), DbAccessError> {
/// let settings = AppSettings::from_json_file("appsettings.json")?;
/// let driver = SqliteDriver::from_settings(&settings);
/// let mut db = SqlDataAccess::new(Arc::new(settings), Arc::new(driver));
///
/// db.save("AddUser", ProcedureParams::new().with("Name", "alice"), "Default").await?;
///
/// db.start_transaction("Default").await?;
/// db.save_in_transaction("AddUser", ProcedureParams::new().with("Name", "bob")).await?;
/// db.commit_transaction().await?;
/// # Ok(())
/// # }
/// ```
pub struct SqlDataAccess {
    config: Arc<dyn ConnectionStringProvider>,
    driver: Arc<dyn Driver>,
    // Only reached through `&mut self`; the mutex keeps the executor `Sync`
    // without requiring driver connections to be.
    session: tokio::sync::Mutex<Option<Session>>,
}

impl SqlDataAccess {
    #[must_use]
    pub fn new(config: Arc<dyn ConnectionStringProvider>, driver: Arc<dyn Driver>) -> Self {
        Self {
            config,
            driver,
            session: tokio::sync::Mutex::new(None),
        }
    }

    /// A new idle executor sharing this one's provider and driver.
    #[must_use]
    pub fn detached(&self) -> Self {
        Self::new(Arc::clone(&self.config), Arc::clone(&self.driver))
    }

    /// Resolve a logical connection name through the configured provider.
    ///
    /// # Errors
    /// Returns [`DbAccessError::ConfigError`] if the name is not configured.
    pub fn connection_string(&self, connection_name: &str) -> Result<String, DbAccessError> {
        self.config.resolve(connection_name)
    }

    #[must_use]
    pub fn state(&mut self) -> SessionState {
        if self.session.get_mut().is_some() {
            SessionState::Active
        } else {
            SessionState::Idle
        }
    }

    #[must_use]
    pub fn is_transaction_open(&mut self) -> bool {
        self.state() == SessionState::Active
    }

    /// Commit a session that was never ended, then release the executor.
    ///
    /// An idle executor is released without touching the driver.
    ///
    /// # Errors
    /// Returns [`DbAccessError::Disposal`] wrapping the commit failure. The
    /// connection is closed either way.
    pub async fn dispose(mut self) -> Result<(), DbAccessError> {
        self.commit_abandoned().await
    }

    pub(crate) async fn commit_abandoned(&mut self) -> Result<(), DbAccessError> {
        let Some(session) = self.session.get_mut().take() else {
            return Ok(());
        };
        tracing::warn!(
            connection = %session.connection_name(),
            "transaction was never committed or rolled back; committing it"
        );
        session
            .end(Ending::Commit)
            .await
            .map_err(|err| DbAccessError::Disposal(Box::new(err)))
    }
}

impl fmt::Debug for SqlDataAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.session.try_lock() {
            Ok(session) if session.is_some() => SessionState::Active,
            Ok(_) => SessionState::Idle,
            Err(_) => return f.debug_struct("SqlDataAccess").finish_non_exhaustive(),
        };
        f.debug_struct("SqlDataAccess")
            .field("state", &state)
            .finish_non_exhaustive()
    }
}

impl Drop for SqlDataAccess {
    fn drop(&mut self) {
        let Some(session) = self.session.get_mut().take() else {
            return;
        };
        tracing::warn!(
            connection = %session.connection_name(),
            "executor dropped with an open transaction; committing it"
        );
        commit_on_drop(session);
    }
}

/// Commit a session whose executor is being dropped.
///
/// Outside a runtime, and on a multi-thread runtime, the commit finishes before
/// `drop` returns. A current-thread runtime cannot be blocked from inside, so
/// there the commit is spawned and only happens if the runtime keeps running;
/// call [`SqlDataAccess::dispose`] before the end of `main` on such a runtime.
fn commit_on_drop(session: Session) {
    let connection = session.connection_name().to_owned();
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::CurrentThread => {
            tracing::debug!(connection = %connection, "spawning commit on the current-thread runtime");
            handle.spawn(async move {
                let outcome = session.end(Ending::Commit).await;
                report_dropped_commit(&connection, outcome);
            });
        }
        Ok(handle) => {
            let outcome =
                tokio::task::block_in_place(|| handle.block_on(session.end(Ending::Commit)));
            report_dropped_commit(&connection, outcome);
        }
        Err(_) => match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => {
                let outcome = runtime.block_on(session.end(Ending::Commit));
                report_dropped_commit(&connection, outcome);
            }
            Err(err) => tracing::error!(
                connection = %connection,
                error = %err,
                "could not start a runtime to commit the dropped transaction"
            ),
        },
    }
}

fn report_dropped_commit(connection: &str, outcome: Result<(), DbAccessError>) {
    if let Err(err) = outcome {
        let err = DbAccessError::Disposal(Box::new(err));
        tracing::error!(connection = %connection, error = %err, "{err}");
    }
}
