#![cfg(feature = "test-utils")]

use std::sync::Arc;

use db_access::prelude::*;
use db_access::test_utils::{DriverEvent, FakeDriver, FakeProcedure};
use serde::Deserialize;

#[derive(Debug, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Order {
    id: i64,
}

fn fake() -> FakeDriver {
    FakeDriver::new()
        .with_procedure("AddOrder", FakeProcedure::insert("orders"))
        .with_procedure("GetOrders", FakeProcedure::select_all("orders", &["Id"]))
        .with_procedure("Broken", FakeProcedure::failing("deadlock"))
}

fn executor(driver: &FakeDriver) -> SqlDataAccess {
    let config = ConnectionStrings::new().with("Default", "fake");
    SqlDataAccess::new(Arc::new(config), Arc::new(driver.clone()))
}

fn order(id: i64) -> ProcedureParams {
    ProcedureParams::new().with("Id", id)
}

#[tokio::test]
async fn commit_persists_writes() -> Result<(), DbAccessError> {
    let driver = fake();
    let mut db = executor(&driver);

    db.start_transaction("Default").await?;
    assert_eq!(db.state(), SessionState::Active);
    db.save_in_transaction("AddOrder", order(1)).await?;
    db.save_in_transaction("AddOrder", order(2)).await?;

    // uncommitted writes are visible inside the session only
    let inside: Vec<Order> = db.load_in_transaction("GetOrders", ()).await?;
    assert_eq!(inside.len(), 2);
    assert!(driver.rows("orders").is_empty());

    db.commit_transaction().await?;
    assert_eq!(db.state(), SessionState::Idle);
    let after: Vec<Order> = db.load("GetOrders", (), "Default").await?;
    assert_eq!(after, vec![Order { id: 1 }, Order { id: 2 }]);

    assert_eq!(driver.commit_count(), 1);
    assert_eq!(driver.rollback_count(), 0);
    assert_eq!(driver.open_connections(), 0);
    Ok(())
}

#[tokio::test]
async fn rollback_discards_writes() -> Result<(), DbAccessError> {
    let driver = fake();
    let mut db = executor(&driver);

    db.start_transaction("Default").await?;
    db.save_in_transaction("AddOrder", order(1)).await?;
    db.rollback_transaction().await?;

    assert!(driver.rows("orders").is_empty());
    assert_eq!(driver.rollback_count(), 1);
    assert_eq!(driver.commit_count(), 0);
    assert_eq!(driver.open_connections(), 0);
    assert!(!db.is_transaction_open());
    Ok(())
}

#[tokio::test]
async fn session_calls_share_one_connection_and_transaction() -> Result<(), DbAccessError> {
    let driver = fake();
    let mut db = executor(&driver);

    db.start_transaction("Default").await?;
    db.save_in_transaction("AddOrder", order(1)).await?;
    let _: Vec<Order> = db.load_in_transaction("GetOrders", ()).await?;
    db.commit_transaction().await?;

    assert_eq!(
        driver.events(),
        vec![
            DriverEvent::Open {
                connection: 1,
                connection_string: "fake".into()
            },
            DriverEvent::Begin {
                connection: 1,
                transaction: 1
            },
            DriverEvent::Execute {
                connection: 1,
                procedure: "AddOrder".into(),
                transaction: Some(1)
            },
            DriverEvent::Query {
                connection: 1,
                procedure: "GetOrders".into(),
                transaction: Some(1)
            },
            DriverEvent::Commit {
                connection: 1,
                transaction: 1
            },
            DriverEvent::Close { connection: 1 },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn idle_session_calls_are_invalid_state() {
    let driver = fake();
    let mut db = executor(&driver);

    let err = db
        .load_in_transaction::<Order, _>("GetOrders", ())
        .await
        .unwrap_err();
    assert!(err.is_invalid_state());
    let err = db.save_in_transaction("AddOrder", order(1)).await.unwrap_err();
    assert!(err.is_invalid_state());
    let err = db.rollback_transaction().await.unwrap_err();
    assert!(err.is_invalid_state());

    assert_eq!(driver.open_count(), 0);
}

#[tokio::test]
async fn commit_without_session_is_a_no_op() -> Result<(), DbAccessError> {
    let driver = fake();
    let mut db = executor(&driver);

    db.commit_transaction().await?;
    db.start_transaction("Default").await?;
    db.commit_transaction().await?;
    db.commit_transaction().await?;

    assert_eq!(driver.commit_count(), 1);
    Ok(())
}

#[tokio::test]
async fn ended_session_does_not_reuse_stale_handles() -> Result<(), DbAccessError> {
    let driver = fake();
    let mut db = executor(&driver);

    db.start_transaction("Default").await?;
    db.rollback_transaction().await?;

    let err = db.save_in_transaction("AddOrder", order(1)).await.unwrap_err();
    assert!(err.is_invalid_state());
    let err = db.rollback_transaction().await.unwrap_err();
    assert!(err.is_invalid_state());
    assert_eq!(driver.open_count(), 1);
    Ok(())
}

#[tokio::test]
async fn start_while_active_is_rejected_and_keeps_the_session() -> Result<(), DbAccessError> {
    let driver = fake();
    let mut db = executor(&driver);

    db.start_transaction("Default").await?;
    db.save_in_transaction("AddOrder", order(1)).await?;

    let err = db.start_transaction("Default").await.unwrap_err();
    assert!(err.is_invalid_state());
    assert_eq!(driver.open_count(), 1);

    // the original session still works and commits its write
    db.save_in_transaction("AddOrder", order(2)).await?;
    db.commit_transaction().await?;
    assert_eq!(driver.rows("orders").len(), 2);
    Ok(())
}

#[tokio::test]
async fn start_with_unknown_name_opens_nothing() {
    let driver = fake();
    let mut db = executor(&driver);

    let err = db.start_transaction("Missing").await.unwrap_err();
    assert!(matches!(err, DbAccessError::ConfigError(_)));
    assert_eq!(driver.open_count(), 0);
    assert_eq!(db.state(), SessionState::Idle);
}

#[tokio::test]
async fn failed_begin_closes_the_connection() {
    let driver = fake();
    driver.fail_begin(true);
    let mut db = executor(&driver);

    let err = db.start_transaction("Default").await.unwrap_err();
    assert!(matches!(err, DbAccessError::DataAccess(_)));
    assert_eq!(db.state(), SessionState::Idle);
    assert_eq!(driver.open_count(), 1);
    assert_eq!(driver.close_count(), 1);
    assert_eq!(driver.open_connections(), 0);
}

#[tokio::test]
async fn failed_statement_leaves_the_session_open() -> Result<(), DbAccessError> {
    let driver = fake();
    let mut db = executor(&driver);

    db.start_transaction("Default").await?;
    db.save_in_transaction("AddOrder", order(1)).await?;
    let err = db.save_in_transaction("Broken", ()).await.unwrap_err();
    assert!(matches!(err, DbAccessError::DataAccess(_)));

    assert!(db.is_transaction_open());
    assert_eq!(driver.rollback_count(), 0);
    db.rollback_transaction().await?;
    assert!(driver.rows("orders").is_empty());
    Ok(())
}

#[tokio::test]
async fn failed_commit_still_ends_the_session() -> Result<(), DbAccessError> {
    let driver = fake();
    let mut db = executor(&driver);

    db.start_transaction("Default").await?;
    db.save_in_transaction("AddOrder", order(1)).await?;
    driver.fail_commit(true);

    let err = db.commit_transaction().await.unwrap_err();
    assert!(matches!(
        err.driver_error(),
        Some(DriverError::ExecutionError(msg)) if msg == "commit failed"
    ));
    assert_eq!(db.state(), SessionState::Idle);
    assert_eq!(driver.open_connections(), 0);
    assert!(driver.rows("orders").is_empty());
    Ok(())
}

#[tokio::test]
async fn failed_rollback_still_ends_the_session() -> Result<(), DbAccessError> {
    let driver = fake();
    let mut db = executor(&driver);

    db.start_transaction("Default").await?;
    driver.fail_rollback(true);
    let err = db.rollback_transaction().await.unwrap_err();
    assert!(matches!(err, DbAccessError::DataAccess(_)));
    assert_eq!(db.state(), SessionState::Idle);
    assert_eq!(driver.close_count(), 1);
    Ok(())
}

#[tokio::test]
async fn detached_executors_run_independent_sessions() -> Result<(), DbAccessError> {
    let driver = fake();
    let mut first = executor(&driver);
    let mut second = first.detached();

    first.start_transaction("Default").await?;
    second.start_transaction("Default").await?;
    first.save_in_transaction("AddOrder", order(1)).await?;
    second.save_in_transaction("AddOrder", order(2)).await?;
    second.rollback_transaction().await?;
    first.commit_transaction().await?;

    assert_eq!(driver.peak_open_connections(), 2);
    let ids: Vec<_> = driver
        .rows("orders")
        .iter()
        .filter_map(|row| row.get("Id").cloned())
        .collect();
    assert_eq!(ids, [RowValues::Int(1)]);
    Ok(())
}
