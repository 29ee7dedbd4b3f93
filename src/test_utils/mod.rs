//! Test doubles for exercising the executor without a database.

mod fake;

pub use fake::{DriverEvent, FakeDriver, FakeProcedure, FakeTables};
