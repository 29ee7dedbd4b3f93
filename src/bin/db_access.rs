use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use db_access::prelude::*;
use serde_json::Value as JsonValue;
use tracing::Level;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Call a stored procedure and print the rows it returns")]
struct Args {
    /// appsettings.json with `ConnectionStrings` (and `Procedures` for SQLite)
    #[arg(long)]
    settings: PathBuf,
    #[arg(long, default_value = "Default")]
    connection: String,
    #[arg(long, value_enum, default_value = "sqlite")]
    driver: DatabaseType,
    #[arg(long)]
    procedure: String,
    /// `Name=Value`; may be repeated
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, RowValues)>,
    /// Execute for side effects instead of loading rows
    #[arg(long)]
    save: bool,
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,
}

fn parse_param(raw: &str) -> Result<(String, RowValues), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected Name=Value, got '{raw}'"))?;
    if name.trim().is_empty() {
        return Err(format!("missing parameter name in '{raw}'"));
    }
    Ok((name.trim().to_owned(), parse_value(value)))
}

fn parse_value(value: &str) -> RowValues {
    if value.eq_ignore_ascii_case("null") {
        RowValues::Null
    } else if let Ok(i) = value.parse::<i64>() {
        RowValues::Int(i)
    } else if let Ok(f) = value.parse::<f64>() {
        RowValues::Float(f)
    } else if let Ok(b) = value.parse::<bool>() {
        RowValues::Bool(b)
    } else {
        RowValues::Text(value.to_owned())
    }
}

fn driver_for(kind: DatabaseType, settings: &AppSettings) -> Arc<dyn Driver> {
    match kind {
        DatabaseType::Sqlite => Arc::new(SqliteDriver::from_settings(settings)),
        #[cfg(feature = "mssql")]
        DatabaseType::Mssql => Arc::new(MssqlDriver::new()),
    }
}

async fn run(args: Args) -> Result<(), DbAccessError> {
    let settings = AppSettings::from_json_file(&args.settings)?;
    let driver = driver_for(args.driver, &settings);
    let db = SqlDataAccess::new(Arc::new(settings), driver);

    if args.save {
        db.save(&args.procedure, args.params, &args.connection).await?;
        tracing::info!(procedure = %args.procedure, "procedure executed");
        return Ok(());
    }

    let rows = db
        .load_with(&args.procedure, args.params, &args.connection, |row| {
            Ok(JsonValue::Object(row.to_json_object()))
        })
        .await?;
    for row in rows {
        println!("{row}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(Level::from(args.log_level))
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
