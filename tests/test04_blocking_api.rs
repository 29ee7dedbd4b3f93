#![cfg(feature = "test-utils")]

use std::sync::Arc;

use db_access::prelude::*;
use db_access::test_utils::{FakeDriver, FakeProcedure};
use serde::Deserialize;

#[derive(Debug, PartialEq, Deserialize)]
struct Note {
    id: i64,
    body: String,
}

fn fake() -> FakeDriver {
    FakeDriver::new()
        .with_procedure("AddNote", FakeProcedure::insert("notes"))
        .with_procedure("GetNote", FakeProcedure::select_by("notes", &["id", "body"], "id"))
}

fn executor(driver: &FakeDriver) -> Result<BlockingSqlDataAccess, DbAccessError> {
    let config = ConnectionStrings::new().with("Default", "fake");
    BlockingSqlDataAccess::new(Arc::new(config), Arc::new(driver.clone()))
}

fn note(id: i64, body: &str) -> ProcedureParams {
    ProcedureParams::new().with("id", id).with("body", body)
}

#[test]
fn synchronous_calls_round_trip() -> Result<(), DbAccessError> {
    let driver = fake();
    let mut db = executor(&driver)?;

    db.save("AddNote", note(1, "first"), "Default")?;
    db.save("AddNote", note(2, "second"), "Default")?;
    let found: Vec<Note> = db.load("GetNote", ProcedureParams::new().with("id", 2), "Default")?;

    assert_eq!(
        found,
        vec![Note {
            id: 2,
            body: "second".into()
        }]
    );
    assert_eq!(db.connection_string("Default")?, "fake");
    Ok(())
}

#[test]
fn synchronous_session_commit_and_rollback() -> Result<(), DbAccessError> {
    let driver = fake();
    let mut db = executor(&driver)?;

    db.start_transaction("Default")?;
    db.save_in_transaction("AddNote", note(1, "kept"))?;
    let seen: Vec<Note> = db.load_in_transaction("GetNote", ProcedureParams::new().with("id", 1))?;
    assert_eq!(seen.len(), 1);
    db.commit_transaction()?;

    db.start_transaction("Default")?;
    db.save_in_transaction("AddNote", note(2, "dropped"))?;
    db.rollback_transaction()?;

    assert_eq!(driver.rows("notes").len(), 1);
    assert_eq!(db.state(), SessionState::Idle);
    assert!(db.rollback_transaction().unwrap_err().is_invalid_state());
    Ok(())
}

#[test]
fn dropping_commits_before_returning() -> Result<(), DbAccessError> {
    let driver = fake();
    {
        let mut db = executor(&driver)?;
        db.start_transaction("Default")?;
        db.save_in_transaction("AddNote", note(1, "abandoned"))?;
    }
    // no waiting: the commit already happened inside drop
    assert_eq!(driver.commit_count(), 1);
    assert_eq!(driver.rows("notes").len(), 1);
    assert_eq!(driver.open_connections(), 0);
    Ok(())
}

#[test]
fn dispose_reports_a_failed_commit() -> Result<(), DbAccessError> {
    let driver = fake();
    let mut db = executor(&driver)?;
    db.start_transaction("Default")?;
    driver.fail_commit(true);

    assert!(matches!(db.dispose(), Err(DbAccessError::Disposal(_))));
    assert_eq!(driver.open_connections(), 0);
    Ok(())
}
