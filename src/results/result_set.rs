use std::collections::HashMap;
use std::sync::Arc;

use super::row::{CustomDbRow, build_column_index};
use crate::error::DbAccessError;
use crate::types::RowValues;

/// The rows returned by one stored procedure invocation.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<CustomDbRow>,
    /// The number of rows affected (for DML statements)
    pub rows_affected: usize,
    column_names: Option<Arc<Vec<String>>>,
    column_index_cache: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            ..ResultSet::default()
        }
    }

    /// Build a result set from column names and row values in one go.
    #[must_use]
    pub fn from_rows(column_names: Vec<String>, rows: Vec<Vec<RowValues>>) -> ResultSet {
        let mut result_set = ResultSet::with_capacity(rows.len());
        result_set.set_column_names(Arc::new(column_names));
        for row in rows {
            result_set.add_row_values(row);
        }
        result_set
    }

    /// Set the column names for this result set (to be shared by all rows)
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index_cache = Some(build_column_index(&column_names));
        self.column_names = Some(column_names);
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Add a row to the result set.
    ///
    /// Rows added before [`set_column_names`](Self::set_column_names) are dropped.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        if let (Some(column_names), Some(cache)) = (&self.column_names, &self.column_index_cache)
        {
            self.results.push(CustomDbRow {
                column_names: Arc::clone(column_names),
                rows: row_values,
                column_index_cache: Arc::clone(cache),
            });
            self.rows_affected += 1;
        }
    }

    /// Add an already built row to the result set
    pub fn add_row(&mut self, row: CustomDbRow) {
        if self.column_names.is_none() {
            self.column_index_cache = Some(Arc::clone(&row.column_index_cache));
            self.column_names = Some(Arc::clone(&row.column_names));
        }
        self.results.push(row);
        self.rows_affected += 1;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Map every row in order with `map`, stopping at the first failure.
    ///
    /// # Errors
    /// Returns the first error produced by `map`.
    pub fn map_rows<T, F>(&self, mut map: F) -> Result<Vec<T>, DbAccessError>
    where
        F: FnMut(&CustomDbRow) -> Result<T, DbAccessError>,
    {
        let mut mapped = Vec::with_capacity(self.results.len());
        for row in &self.results {
            mapped.push(map(row)?);
        }
        Ok(mapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_share_column_names() {
        let rs = ResultSet::from_rows(
            vec!["Id".into()],
            vec![vec![RowValues::Int(1)], vec![RowValues::Int(2)]],
        );
        assert_eq!(rs.len(), 2);
        assert_eq!(rs.rows_affected, 2);
        assert!(Arc::ptr_eq(
            &rs.results[0].column_names,
            &rs.results[1].column_names
        ));
    }

    #[test]
    fn rows_without_columns_are_dropped() {
        let mut rs = ResultSet::default();
        rs.add_row_values(vec![RowValues::Int(1)]);
        assert!(rs.is_empty());
    }

    #[test]
    fn map_rows_stops_at_first_error() {
        let rs = ResultSet::from_rows(
            vec!["Id".into()],
            vec![vec![RowValues::Int(1)], vec![RowValues::Null], vec![RowValues::Int(3)]],
        );
        let mut seen = 0;
        let err = rs
            .map_rows(|row| {
                seen += 1;
                row.get("Id")
                    .and_then(RowValues::as_int)
                    .copied()
                    .ok_or_else(|| DbAccessError::MappingError("null id".into()))
            })
            .unwrap_err();
        assert!(matches!(err, DbAccessError::MappingError(_)));
        assert_eq!(seen, 2);
    }
}
