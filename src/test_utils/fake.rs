use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::driver::{Driver, DriverConnection, TransactionHandle, check_transaction};
use crate::error::DriverError;
use crate::params::ProcedureParams;
use crate::results::ResultSet;
use crate::types::RowValues;

/// In-memory tables: table name -> rows, each row a column -> value map.
pub type FakeTables = BTreeMap<String, Vec<BTreeMap<String, RowValues>>>;

type Handler =
    Arc<dyn Fn(&ProcedureParams, &mut FakeTables) -> Result<ResultSet, DriverError> + Send + Sync>;

/// A stored procedure of the fake driver.
#[derive(Clone)]
pub struct FakeProcedure {
    handler: Handler,
}

impl FakeProcedure {
    /// Any handler over the connection's view of the tables.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ProcedureParams, &mut FakeTables) -> Result<ResultSet, DriverError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// Append one row built from the named parameters.
    #[must_use]
    pub fn insert(table: &str) -> Self {
        let table = table.to_owned();
        Self::new(move |params, tables| {
            let row = params
                .iter()
                .filter_map(|p| p.name.clone().map(|name| (name, p.value.clone())))
                .collect();
            tables.entry(table.clone()).or_default().push(row);
            let mut affected = ResultSet::default();
            affected.rows_affected = 1;
            Ok(affected)
        })
    }

    /// Return every row of `table` with the given columns, in insertion order.
    #[must_use]
    pub fn select_all(table: &str, columns: &[&str]) -> Self {
        Self::select_where(table, columns, None)
    }

    /// Return rows of `table` whose `key` column equals the `key` parameter.
    #[must_use]
    pub fn select_by(table: &str, columns: &[&str], key: &str) -> Self {
        Self::select_where(table, columns, Some(key.to_owned()))
    }

    fn select_where(table: &str, columns: &[&str], key: Option<String>) -> Self {
        let table = table.to_owned();
        let columns: Vec<String> = columns.iter().map(|c| (*c).to_owned()).collect();
        Self::new(move |params, tables| {
            let wanted = match &key {
                Some(key) => Some(params.get(key).cloned().ok_or_else(|| {
                    DriverError::ExecutionError(format!("missing parameter {key}"))
                })?),
                None => None,
            };
            let rows = tables
                .get(&table)
                .map(Vec::as_slice)
                .unwrap_or_default()
                .iter()
                .filter(|row| match (&key, &wanted) {
                    (Some(key), Some(wanted)) => row.get(key) == Some(wanted),
                    _ => true,
                })
                .map(|row| {
                    columns
                        .iter()
                        .map(|c| row.get(c).cloned().unwrap_or(RowValues::Null))
                        .collect()
                })
                .collect();
            Ok(ResultSet::from_rows(columns.clone(), rows))
        })
    }

    /// Always fail with the given message.
    #[must_use]
    pub fn failing(message: &str) -> Self {
        let message = message.to_owned();
        Self::new(move |_, _| Err(DriverError::ExecutionError(message.clone())))
    }
}

/// Everything the fake driver was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    Open {
        connection: u64,
        connection_string: String,
    },
    Begin {
        connection: u64,
        transaction: u64,
    },
    Query {
        connection: u64,
        procedure: String,
        transaction: Option<u64>,
    },
    Execute {
        connection: u64,
        procedure: String,
        transaction: Option<u64>,
    },
    Commit {
        connection: u64,
        transaction: u64,
    },
    Rollback {
        connection: u64,
        transaction: u64,
    },
    Close {
        connection: u64,
    },
}

#[derive(Default)]
struct FakeState {
    procedures: Mutex<HashMap<String, FakeProcedure>>,
    tables: Mutex<FakeTables>,
    events: Mutex<Vec<DriverEvent>>,
    next_connection: AtomicU64,
    open_connections: AtomicUsize,
    peak_open_connections: AtomicUsize,
    fail_open: AtomicBool,
    fail_begin: AtomicBool,
    fail_commit: AtomicBool,
    fail_rollback: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Driver double backed by shared in-memory tables.
///
/// Writes outside a transaction go straight to the shared tables. `begin`
/// snapshots the tables for the connection; statements in the transaction see
/// and change only the snapshot; `commit` publishes it and `rollback` throws
/// it away.
#[derive(Clone, Default)]
pub struct FakeDriver {
    state: Arc<FakeState>,
}

impl FakeDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_procedure(self, name: &str, procedure: FakeProcedure) -> Self {
        lock(&self.state.procedures).insert(name.to_owned(), procedure);
        self
    }

    pub fn fail_open(&self, fail: bool) {
        self.state.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn fail_begin(&self, fail: bool) {
        self.state.fail_begin.store(fail, Ordering::SeqCst);
    }

    pub fn fail_commit(&self, fail: bool) {
        self.state.fail_commit.store(fail, Ordering::SeqCst);
    }

    pub fn fail_rollback(&self, fail: bool) {
        self.state.fail_rollback.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn events(&self) -> Vec<DriverEvent> {
        lock(&self.state.events).clone()
    }

    #[must_use]
    pub fn open_count(&self) -> usize {
        self.count(|e| matches!(e, DriverEvent::Open { .. }))
    }

    #[must_use]
    pub fn close_count(&self) -> usize {
        self.count(|e| matches!(e, DriverEvent::Close { .. }))
    }

    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.count(|e| matches!(e, DriverEvent::Commit { .. }))
    }

    #[must_use]
    pub fn rollback_count(&self) -> usize {
        self.count(|e| matches!(e, DriverEvent::Rollback { .. }))
    }

    /// Connections currently open (opened and neither closed nor dropped).
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.state.open_connections.load(Ordering::SeqCst)
    }

    /// Highest number of connections that were open at the same time.
    #[must_use]
    pub fn peak_open_connections(&self) -> usize {
        self.state.peak_open_connections.load(Ordering::SeqCst)
    }

    /// Committed rows of a table.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<BTreeMap<String, RowValues>> {
        lock(&self.state.tables)
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    fn count(&self, pred: impl Fn(&DriverEvent) -> bool) -> usize {
        lock(&self.state.events).iter().filter(|e| pred(e)).count()
    }

    fn record(&self, event: DriverEvent) {
        lock(&self.state.events).push(event);
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn open(
        &self,
        connection_string: &str,
    ) -> Result<Box<dyn DriverConnection>, DriverError> {
        if self.state.fail_open.load(Ordering::SeqCst) {
            return Err(DriverError::ConnectionError(format!(
                "cannot reach {connection_string}"
            )));
        }
        let id = self.state.next_connection.fetch_add(1, Ordering::SeqCst) + 1;
        let open = self.state.open_connections.fetch_add(1, Ordering::SeqCst) + 1;
        self.state
            .peak_open_connections
            .fetch_max(open, Ordering::SeqCst);
        self.record(DriverEvent::Open {
            connection: id,
            connection_string: connection_string.to_owned(),
        });
        Ok(Box::new(FakeConnection {
            driver: self.clone(),
            id,
            open: true,
            transaction: None,
            transactions_started: 0,
        }))
    }
}

struct FakeConnection {
    driver: FakeDriver,
    id: u64,
    open: bool,
    transaction: Option<(u64, FakeTables)>,
    transactions_started: u64,
}

impl FakeConnection {
    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.open {
            Ok(())
        } else {
            Err(DriverError::ConnectionError("connection is closed".into()))
        }
    }

    async fn call(
        &mut self,
        procedure: &str,
        params: &ProcedureParams,
        transaction: Option<&TransactionHandle>,
    ) -> Result<ResultSet, DriverError> {
        self.ensure_open()?;
        check_transaction(self.transaction.as_ref().map(|(id, _)| *id), transaction)?;
        // let concurrent callers interleave like real I/O would
        tokio::task::yield_now().await;

        let handler = lock(&self.driver.state.procedures)
            .get(procedure)
            .cloned()
            .ok_or_else(|| {
                DriverError::ExecutionError(format!(
                    "Could not find stored procedure '{procedure}'"
                ))
            })?;
        match &mut self.transaction {
            Some((_, working)) => (handler.handler)(params, working),
            None => (handler.handler)(params, &mut *lock(&self.driver.state.tables)),
        }
    }

    fn release(&mut self) {
        if self.open {
            self.open = false;
            self.transaction = None;
            self.driver
                .state
                .open_connections
                .fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        self.release();
    }
}

#[async_trait]
impl DriverConnection for FakeConnection {
    async fn begin_transaction(&mut self) -> Result<TransactionHandle, DriverError> {
        self.ensure_open()?;
        if self.driver.state.fail_begin.load(Ordering::SeqCst) {
            return Err(DriverError::ExecutionError("begin failed".into()));
        }
        if self.transaction.is_some() {
            return Err(DriverError::ExecutionError(
                "transaction already in progress".into(),
            ));
        }
        self.transactions_started += 1;
        let snapshot = lock(&self.driver.state.tables).clone();
        self.transaction = Some((self.transactions_started, snapshot));
        self.driver.record(DriverEvent::Begin {
            connection: self.id,
            transaction: self.transactions_started,
        });
        Ok(TransactionHandle::new(self.transactions_started))
    }

    async fn query(
        &mut self,
        procedure: &str,
        params: &ProcedureParams,
        transaction: Option<&TransactionHandle>,
    ) -> Result<ResultSet, DriverError> {
        self.driver.record(DriverEvent::Query {
            connection: self.id,
            procedure: procedure.to_owned(),
            transaction: transaction.map(TransactionHandle::id),
        });
        self.call(procedure, params, transaction).await
    }

    async fn execute(
        &mut self,
        procedure: &str,
        params: &ProcedureParams,
        transaction: Option<&TransactionHandle>,
    ) -> Result<usize, DriverError> {
        self.driver.record(DriverEvent::Execute {
            connection: self.id,
            procedure: procedure.to_owned(),
            transaction: transaction.map(TransactionHandle::id),
        });
        Ok(self.call(procedure, params, transaction).await?.rows_affected)
    }

    async fn commit(&mut self, transaction: TransactionHandle) -> Result<(), DriverError> {
        self.ensure_open()?;
        check_transaction(self.transaction.as_ref().map(|(id, _)| *id), Some(&transaction))?;
        self.driver.record(DriverEvent::Commit {
            connection: self.id,
            transaction: transaction.id(),
        });
        if self.driver.state.fail_commit.load(Ordering::SeqCst) {
            return Err(DriverError::ExecutionError("commit failed".into()));
        }
        if let Some((_, working)) = self.transaction.take() {
            *lock(&self.driver.state.tables) = working;
        }
        Ok(())
    }

    async fn rollback(&mut self, transaction: TransactionHandle) -> Result<(), DriverError> {
        self.ensure_open()?;
        check_transaction(self.transaction.as_ref().map(|(id, _)| *id), Some(&transaction))?;
        self.driver.record(DriverEvent::Rollback {
            connection: self.id,
            transaction: transaction.id(),
        });
        if self.driver.state.fail_rollback.load(Ordering::SeqCst) {
            return Err(DriverError::ExecutionError("rollback failed".into()));
        }
        self.transaction = None;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if self.open {
            self.driver.record(DriverEvent::Close {
                connection: self.id,
            });
        }
        self.release();
        Ok(())
    }
}
