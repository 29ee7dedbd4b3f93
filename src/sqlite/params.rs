use rusqlite::Statement;
use rusqlite::types::Value;

use crate::error::DriverError;
use crate::params::ProcedureParams;
use crate::types::RowValues;

/// Convert a single `RowValues` to a rusqlite `Value`.
#[must_use]
pub fn row_value_to_sqlite_value(value: &RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(jval.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Bind procedure parameters onto every placeholder of `stmt`.
///
/// Named placeholders (`:Id`, `@Id`, `$Id`) take the parameter of that name;
/// `?` takes the next positional parameter and `?N` the N-th one. Once a
/// statement uses any `?N`, a bare `?` follows SQLite's own numbering (one past
/// the largest number so far), so `?2, ?` binds the 2nd and 3rd parameters.
/// Parameters that no placeholder asks for are ignored.
///
/// # Errors
/// Returns [`DriverError::ExecutionError`] if a placeholder has no matching
/// parameter, or the underlying bind error.
pub fn bind_procedure_params(
    stmt: &mut Statement<'_>,
    params: &ProcedureParams,
) -> Result<(), DriverError> {
    let positional: Vec<&RowValues> = params.positional().collect();
    let mut next_positional = 0usize;
    let numbered = (1..=stmt.parameter_count())
        .any(|index| stmt.parameter_name(index).is_some_and(|name| name.starts_with('?')));

    for index in 1..=stmt.parameter_count() {
        let placeholder = stmt.parameter_name(index).map(str::to_owned);
        let value = match placeholder.as_deref() {
            Some(numbered) if numbered.starts_with('?') => {
                let position: usize = numbered[1..].parse().map_err(|_| {
                    DriverError::ExecutionError(format!("unsupported placeholder {numbered}"))
                })?;
                positional.get(position.saturating_sub(1)).copied()
            }
            Some(name) => params.get(name),
            None if numbered => positional.get(index - 1).copied(),
            None => {
                next_positional += 1;
                positional.get(next_positional - 1).copied()
            }
        };

        let value = value.ok_or_else(|| {
            DriverError::ExecutionError(format!(
                "procedure expects parameter {} which was not supplied",
                placeholder.unwrap_or_else(|| format!("#{index}"))
            ))
        })?;
        stmt.raw_bind_parameter(index, row_value_to_sqlite_value(value))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::build_result_set;

    fn select(sql: &str, params: &ProcedureParams) -> Result<Vec<RowValues>, DriverError> {
        let conn = rusqlite::Connection::open_in_memory()?;
        let mut stmt = conn.prepare(sql)?;
        bind_procedure_params(&mut stmt, params)?;
        let rs = build_result_set(&mut stmt)?;
        Ok(rs.results[0].rows.clone())
    }

    #[test]
    fn binds_named_placeholders_in_any_prefix_style() {
        let params = ProcedureParams::new().with("Id", 5).with("Name", "n");
        let row = select("SELECT :Id, @Name, $Id", &params).unwrap();
        assert_eq!(
            row,
            [RowValues::Int(5), RowValues::Text("n".into()), RowValues::Int(5)]
        );
    }

    #[test]
    fn binds_positional_and_numbered_placeholders() {
        let mut params = ProcedureParams::new();
        params.push_positional(1);
        params.push_positional(2);
        assert_eq!(
            select("SELECT ?, ?", &params).unwrap(),
            [RowValues::Int(1), RowValues::Int(2)]
        );
        assert_eq!(
            select("SELECT ?2, ?1", &params).unwrap(),
            [RowValues::Int(2), RowValues::Int(1)]
        );
    }

    #[test]
    fn bare_placeholder_after_numbered_one_continues_sqlite_numbering() {
        let mut params = ProcedureParams::new();
        for value in [1, 2, 3] {
            params.push_positional(value);
        }
        assert_eq!(
            select("SELECT ?2, ?", &params).unwrap(),
            [RowValues::Int(2), RowValues::Int(3)]
        );
        assert_eq!(
            select("SELECT ?1, ?", &params).unwrap(),
            [RowValues::Int(1), RowValues::Int(2)]
        );

        let mut short = ProcedureParams::new();
        short.push_positional(1);
        short.push_positional(2);
        assert!(select("SELECT ?2, ?", &short).is_err());
    }

    #[test]
    fn missing_parameter_is_reported() {
        let err = select("SELECT :Id", &ProcedureParams::new()).unwrap_err();
        assert!(
            matches!(err, DriverError::ExecutionError(ref msg) if msg.contains(":Id")),
            "{err}"
        );
    }

    #[test]
    fn unused_parameters_are_ignored() {
        let params = ProcedureParams::new().with("Id", 1).with("Extra", "x");
        assert_eq!(select("SELECT :Id", &params).unwrap(), [RowValues::Int(1)]);
    }

    #[test]
    fn bools_and_timestamps_use_sqlite_storage_classes() {
        let dt = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5))
            .unwrap();
        assert_eq!(row_value_to_sqlite_value(&RowValues::Bool(true)), Value::Integer(1));
        assert_eq!(
            row_value_to_sqlite_value(&RowValues::Timestamp(dt)),
            Value::Text("2024-01-02 03:04:05".into())
        );
    }
}
