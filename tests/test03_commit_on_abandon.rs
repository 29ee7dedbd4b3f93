#![cfg(feature = "test-utils")]

use std::sync::Arc;

use db_access::prelude::*;
use db_access::test_utils::{FakeDriver, FakeProcedure};
use tokio::task::yield_now;

fn fake() -> FakeDriver {
    FakeDriver::new()
        .with_procedure("AddOrder", FakeProcedure::insert("orders"))
        .with_procedure("Broken", FakeProcedure::failing("boom"))
}

fn executor(driver: &FakeDriver) -> SqlDataAccess {
    let config = ConnectionStrings::new().with("Default", "fake");
    SqlDataAccess::new(Arc::new(config), Arc::new(driver.clone()))
}

fn order(id: i64) -> ProcedureParams {
    ProcedureParams::new().with("Id", id)
}

async fn wait_for_commit(driver: &FakeDriver) {
    for _ in 0..100 {
        if driver.commit_count() > 0 && driver.open_connections() == 0 {
            return;
        }
        yield_now().await;
    }
}

#[tokio::test]
async fn dispose_commits_an_open_session() -> Result<(), DbAccessError> {
    let driver = fake();
    let mut db = executor(&driver);

    db.start_transaction("Default").await?;
    db.save_in_transaction("AddOrder", order(1)).await?;
    db.dispose().await?;

    assert_eq!(driver.commit_count(), 1);
    assert_eq!(driver.rollback_count(), 0);
    assert_eq!(driver.rows("orders").len(), 1);
    assert_eq!(driver.open_connections(), 0);
    Ok(())
}

#[tokio::test]
async fn dispose_of_idle_executor_touches_nothing() -> Result<(), DbAccessError> {
    let driver = fake();
    let mut db = executor(&driver);

    db.start_transaction("Default").await?;
    db.rollback_transaction().await?;
    db.dispose().await?;

    assert_eq!(driver.commit_count(), 0);
    assert_eq!(driver.rollback_count(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_disposal_commit_wraps_the_cause() -> Result<(), DbAccessError> {
    let driver = fake();
    let mut db = executor(&driver);

    db.start_transaction("Default").await?;
    db.save_in_transaction("AddOrder", order(1)).await?;
    driver.fail_commit(true);

    let err = db.dispose().await.unwrap_err();
    let DbAccessError::Disposal(cause) = &err else {
        panic!("expected a disposal error, got {err:?}");
    };
    assert!(matches!(
        cause.as_ref(),
        DbAccessError::DataAccess(DriverError::ExecutionError(msg)) if msg == "commit failed"
    ));
    assert_eq!(driver.open_connections(), 0);
    Ok(())
}

#[tokio::test]
async fn dropping_an_open_session_commits_it() -> Result<(), DbAccessError> {
    let driver = fake();
    {
        let mut db = executor(&driver);
        db.start_transaction("Default").await?;
        db.save_in_transaction("AddOrder", order(7)).await?;
    }
    wait_for_commit(&driver).await;

    assert_eq!(driver.commit_count(), 1);
    assert_eq!(driver.rollback_count(), 0);
    assert_eq!(driver.rows("orders").len(), 1);
    assert_eq!(driver.open_connections(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropping_on_a_multi_thread_runtime_commits_before_returning() -> Result<(), DbAccessError>
{
    let driver = fake();
    {
        let mut db = executor(&driver);
        db.start_transaction("Default").await?;
        db.save_in_transaction("AddOrder", order(8)).await?;
    }

    assert_eq!(driver.commit_count(), 1);
    assert_eq!(driver.rows("orders").len(), 1);
    assert_eq!(driver.open_connections(), 0);
    Ok(())
}

#[test]
fn dropping_at_the_end_of_main_commits_before_shutdown() -> Result<(), DbAccessError> {
    let driver = fake();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("runtime");

    runtime.block_on(async {
        let mut db = executor(&driver);
        db.start_transaction("Default").await?;
        db.save_in_transaction("AddOrder", order(9)).await?;
        Ok::<_, DbAccessError>(())
    })?;
    drop(runtime);

    assert_eq!(driver.commit_count(), 1);
    assert_eq!(driver.rollback_count(), 0);
    assert_eq!(driver.rows("orders").len(), 1);
    assert_eq!(driver.open_connections(), 0);
    Ok(())
}

#[test]
fn dropping_outside_a_runtime_commits() -> Result<(), DbAccessError> {
    let driver = fake();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");

    let db = runtime.block_on(async {
        let mut db = executor(&driver);
        db.start_transaction("Default").await?;
        db.save_in_transaction("AddOrder", order(10)).await?;
        Ok::<_, DbAccessError>(db)
    })?;
    drop(runtime);
    drop(db);

    assert_eq!(driver.commit_count(), 1);
    assert_eq!(driver.rollback_count(), 0);
    assert_eq!(driver.rows("orders").len(), 1);
    assert_eq!(driver.open_connections(), 0);
    Ok(())
}

#[test]
fn failed_commit_on_drop_outside_a_runtime_releases_the_connection() -> Result<(), DbAccessError> {
    let driver = fake();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");

    let db = runtime.block_on(async {
        let mut db = executor(&driver);
        db.start_transaction("Default").await?;
        db.save_in_transaction("AddOrder", order(11)).await?;
        Ok::<_, DbAccessError>(db)
    })?;
    drop(runtime);
    driver.fail_commit(true);
    drop(db);

    assert!(driver.rows("orders").is_empty());
    assert_eq!(driver.open_connections(), 0);
    Ok(())
}

#[tokio::test]
async fn with_transaction_commits_when_body_leaves_session_open() -> Result<(), DbAccessError> {
    let driver = fake();
    let mut db = executor(&driver);

    let saved = db
        .with_transaction("Default", |tx| {
            Box::pin(async move {
                tx.save_in_transaction("AddOrder", order(1)).await?;
                tx.save_in_transaction("AddOrder", order(2)).await?;
                Ok(2)
            })
        })
        .await?;

    assert_eq!(saved, 2);
    assert_eq!(db.state(), SessionState::Idle);
    assert_eq!(driver.commit_count(), 1);
    assert_eq!(driver.rows("orders").len(), 2);
    Ok(())
}

#[tokio::test]
async fn with_transaction_respects_an_explicit_rollback() -> Result<(), DbAccessError> {
    let driver = fake();
    let mut db = executor(&driver);

    db.with_transaction("Default", |tx| {
        Box::pin(async move {
            tx.save_in_transaction("AddOrder", order(1)).await?;
            tx.rollback_transaction().await
        })
    })
    .await?;

    assert_eq!(driver.commit_count(), 0);
    assert_eq!(driver.rollback_count(), 1);
    assert!(driver.rows("orders").is_empty());
    Ok(())
}

#[tokio::test]
async fn with_transaction_commits_even_when_body_fails() {
    let driver = fake();
    let mut db = executor(&driver);

    let err = db
        .with_transaction("Default", |tx| {
            Box::pin(async move {
                tx.save_in_transaction("AddOrder", order(1)).await?;
                tx.save_in_transaction("Broken", ()).await?;
                Ok(())
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DbAccessError::DataAccess(DriverError::ExecutionError(ref msg)) if msg == "boom"
    ));
    assert_eq!(driver.commit_count(), 1);
    assert_eq!(driver.rows("orders").len(), 1);
    assert_eq!(db.state(), SessionState::Idle);
}

#[tokio::test]
async fn with_transaction_reports_failed_closing_commit() {
    let driver = fake();
    driver.fail_commit(true);
    let mut db = executor(&driver);

    let err = db
        .with_transaction("Default", |tx| {
            Box::pin(async move { tx.save_in_transaction("AddOrder", order(1)).await })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DbAccessError::Disposal(_)));
    assert_eq!(driver.open_connections(), 0);
}
