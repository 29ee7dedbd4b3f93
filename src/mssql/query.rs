use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures_util::TryStreamExt;
use tiberius::numeric::Numeric;
use tiberius::{ColumnData, FromSql, Query};

use super::client::MssqlClient;
use crate::error::DriverError;
use crate::params::ProcedureParams;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Quote a possibly schema-qualified procedure name: `dbo.usp_Get` -> `[dbo].[usp_Get]`.
fn quote_procedure_name(procedure: &str) -> Result<String, DriverError> {
    let parts: Vec<&str> = procedure.split('.').map(str::trim).collect();
    if parts.iter().any(|part| part.is_empty()) {
        return Err(DriverError::ExecutionError(format!(
            "invalid stored procedure name '{procedure}'"
        )));
    }
    Ok(parts
        .iter()
        .map(|part| {
            let bare = part
                .strip_prefix('[')
                .and_then(|p| p.strip_suffix(']'))
                .unwrap_or(part);
            format!("[{}]", bare.replace(']', "]]"))
        })
        .collect::<Vec<_>>()
        .join("."))
}

fn valid_parameter_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '#' || c == '$')
}

/// Build the `EXEC` text for a stored procedure call plus the values to bind,
/// in `@P1..@Pn` order.
///
/// Positional parameters come first as bare arguments, then named ones as
/// `@Name = @Pn`.
///
/// # Errors
/// Returns `DriverError::ExecutionError` for malformed procedure or parameter names.
pub fn build_exec_statement(
    procedure: &str,
    params: &ProcedureParams,
) -> Result<(String, Vec<RowValues>), DriverError> {
    let mut sql = format!("EXEC {}", quote_procedure_name(procedure)?);
    let mut values = Vec::with_capacity(params.len());
    let mut args = Vec::with_capacity(params.len());

    for value in params.positional() {
        values.push(value.clone());
        args.push(format!("@P{}", values.len()));
    }
    for param in params {
        let Some(name) = &param.name else { continue };
        if !valid_parameter_name(name) {
            return Err(DriverError::ExecutionError(format!(
                "invalid parameter name '{name}'"
            )));
        }
        values.push(param.value.clone());
        args.push(format!("@{name} = @P{}", values.len()));
    }

    if !args.is_empty() {
        sql.push(' ');
        sql.push_str(&args.join(", "));
    }
    Ok((sql, values))
}

/// Bind parameters directly to the query for SQL Server
pub fn bind_query_params<'a>(query: &'a str, params: &[RowValues]) -> Query<'a> {
    let mut query_builder = Query::new(query);

    for param in params {
        match param {
            RowValues::Int(i) => query_builder.bind(*i),
            RowValues::Float(f) => query_builder.bind(*f),
            RowValues::Text(s) => query_builder.bind(s.clone()),
            RowValues::Bool(b) => query_builder.bind(*b),
            RowValues::Timestamp(dt) => query_builder.bind(*dt),
            RowValues::Null => query_builder.bind(Option::<String>::None),
            RowValues::JSON(jsval) => query_builder.bind(jsval.to_string()),
            RowValues::Blob(bytes) => query_builder.bind(bytes.clone()),
        }
    }

    query_builder
}

/// Run a statement and collect the first result set it produces.
///
/// # Errors
/// Returns `DriverError::Mssql` if execution or row streaming fails.
pub async fn build_result_set(
    client: &mut MssqlClient,
    query: &str,
    params: &[RowValues],
) -> Result<ResultSet, DriverError> {
    let query_builder = bind_query_params(query, params);
    let mut stream = query_builder.query(client).await?;

    let column_names: Vec<String> = stream
        .columns()
        .await?
        .map(|columns| columns.iter().map(|col| col.name().to_string()).collect())
        .unwrap_or_default();
    let col_count = column_names.len();

    let mut result_set = ResultSet::with_capacity(10);
    result_set.set_column_names(Arc::new(column_names));

    let mut rows_stream = stream.into_row_stream();
    while let Some(row) = rows_stream.try_next().await? {
        let mut row_values = Vec::with_capacity(col_count);
        for data in row {
            row_values.push(extract_value(&data)?);
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}

/// Run a statement for its side effects and sum the affected row counts.
///
/// # Errors
/// Returns `DriverError::Mssql` if execution fails.
pub async fn execute_statement(
    client: &mut MssqlClient,
    query: &str,
    params: &[RowValues],
) -> Result<usize, DriverError> {
    let exec_result = bind_query_params(query, params).execute(client).await?;
    let rows_affected: u64 = exec_result.rows_affected().iter().sum();
    usize::try_from(rows_affected)
        .map_err(|e| DriverError::ExecutionError(format!("Invalid rows affected count: {e}")))
}

/// Convert one SQL Server cell into a [`RowValues`]; a NULL of any type is `Null`.
///
/// DECIMAL/NUMERIC/MONEY become `Float`, UNIQUEIDENTIFIER and XML become
/// `Text`, DATE/TIME/DATETIMEOFFSET become ISO-8601 `Text`.
///
/// # Errors
/// Returns `DriverError::Mssql` if a temporal value cannot be decoded, or
/// `DriverError::ExecutionError` for a column type with no mapping.
pub(crate) fn extract_value(data: &ColumnData<'static>) -> Result<RowValues, DriverError> {
    let value = match data {
        ColumnData::U8(v) => v.map(|v| RowValues::Int(i64::from(v))),
        ColumnData::I16(v) => v.map(|v| RowValues::Int(i64::from(v))),
        ColumnData::I32(v) => v.map(|v| RowValues::Int(i64::from(v))),
        ColumnData::I64(v) => v.map(RowValues::Int),
        ColumnData::F32(v) => v.map(|v| RowValues::Float(f64::from(v))),
        ColumnData::F64(v) => v.map(RowValues::Float),
        ColumnData::Bit(v) => v.map(RowValues::Bool),
        ColumnData::String(v) => v.as_ref().map(|s| RowValues::Text(s.to_string())),
        ColumnData::Binary(v) => v.as_ref().map(|b| RowValues::Blob(b.to_vec())),
        ColumnData::Guid(v) => v.map(|g| RowValues::Text(g.to_string())),
        ColumnData::Xml(v) => v
            .as_ref()
            .map(|x| RowValues::Text(x.clone().into_owned().into_string())),
        ColumnData::Numeric(v) => v.as_ref().map(|n| RowValues::Float(numeric_to_f64(n))),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(data)?.map(RowValues::Timestamp)
        }
        ColumnData::Date(_) => NaiveDate::from_sql(data)?
            .map(|d| RowValues::Text(d.format("%Y-%m-%d").to_string())),
        ColumnData::Time(_) => NaiveTime::from_sql(data)?
            .map(|t| RowValues::Text(t.format("%H:%M:%S%.f").to_string())),
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(data)?
            .map(|dt| RowValues::Text(dt.to_rfc3339())),
        #[allow(unreachable_patterns)]
        other => {
            return Err(DriverError::ExecutionError(format!(
                "unsupported SQL Server column value {other:?}"
            )));
        }
    };
    Ok(value.unwrap_or(RowValues::Null))
}

#[allow(clippy::cast_precision_loss)]
fn numeric_to_f64(n: &Numeric) -> f64 {
    n.value() as f64 / 10f64.powi(i32::from(n.scale()))
}
