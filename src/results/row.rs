use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use crate::types::RowValues;

/// A row returned by a stored procedure.
///
/// Column names and the name lookup cache are shared by every row of the
/// result set the row came from.
#[derive(Debug, Clone)]
pub struct CustomDbRow {
    /// The column names for this row (shared across all rows in a result set)
    pub column_names: Arc<Vec<String>>,
    /// The values for this row
    pub rows: Vec<RowValues>,
    #[doc(hidden)]
    pub(crate) column_index_cache: Arc<HashMap<String, usize>>,
}

pub(crate) fn build_column_index(column_names: &[String]) -> Arc<HashMap<String, usize>> {
    let mut index = HashMap::with_capacity(column_names.len());
    for (i, name) in column_names.iter().enumerate() {
        // first occurrence wins for duplicate column names
        index.entry(name.clone()).or_insert(i);
    }
    Arc::new(index)
}

impl CustomDbRow {
    /// Create a new database row
    ///
    /// # Arguments
    ///
    /// * `column_names` - The column names
    /// * `rows` - The values for this row
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, rows: Vec<RowValues>) -> Self {
        let column_index_cache = build_column_index(&column_names);
        Self {
            column_names,
            rows,
            column_index_cache,
        }
    }

    /// Get the index of a column by name
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.column_index_cache.get(column_name) {
            return Some(idx);
        }
        self.column_names
            .iter()
            .position(|col| col.eq_ignore_ascii_case(column_name))
    }

    /// Get a value from the row by column name.
    ///
    /// Exact matches win; otherwise the first column whose name matches
    /// ignoring ASCII case is used.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.rows.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.rows.get(index)
    }

    /// Render the row as a JSON object keyed by column name.
    ///
    /// Columns without a value (short rows) are left out; for duplicate
    /// column names the first one is kept.
    #[must_use]
    pub fn to_json_object(&self) -> Map<String, JsonValue> {
        let mut object = Map::with_capacity(self.column_names.len());
        for (name, value) in self.column_names.iter().zip(self.rows.iter()) {
            if !object.contains_key(name) {
                object.insert(name.clone(), value.to_json());
            }
        }
        object
    }
}
