//! Row-to-model mapping by field-name correspondence.
//!
//! Rows are rendered as JSON objects keyed by column name and handed to serde,
//! so the target type's `Deserialize` impl is the correspondence table:
//! columns without a matching field are ignored, and fields without a column
//! keep their default when the type is annotated with `#[serde(default)]`.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

use crate::error::DbAccessError;
use crate::results::CustomDbRow;

/// Map one row onto `T`.
///
/// # Errors
/// Returns [`DbAccessError::MappingError`] when a column value does not fit the
/// corresponding field, or when a required field has no column.
pub fn from_row<T: DeserializeOwned>(row: &CustomDbRow) -> Result<T, DbAccessError> {
    serde_json::from_value(JsonValue::Object(row.to_json_object()))
        .map_err(|e| DbAccessError::MappingError(e.to_string()))
}

/// Copy every same-named field of `source` onto `target`, except the names in `skip`.
///
/// Fields are resolved one by one in `source`'s serialization order; fields of
/// `target` with no counterpart keep their value.
///
/// ```rust
/// use db_access::mapping::map_model;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// struct User { id: i64, name: String, password_hash: String }
///
/// #[derive(Serialize, Deserialize, Default)]
/// struct UserView { id: i64, name: String, password_hash: String, display: String }
///
/// let user = User { id: 1, name: "A".into(), password_hash: "x".into() };
/// let view = map_model(UserView { display: "A!".into(), ..Default::default() }, &user, &["password_hash"]).unwrap();
/// assert_eq!((view.id, view.name.as_str(), view.password_hash.as_str(), view.display.as_str()), (1, "A", "", "A!"));
/// ```
///
/// # Errors
/// Returns [`DbAccessError::MappingError`] if either model does not serialize to
/// an object or the merged object no longer fits the target type.
pub fn map_model<N, O>(target: N, source: &O, skip: &[&str]) -> Result<N, DbAccessError>
where
    N: Serialize + DeserializeOwned,
    O: Serialize + ?Sized,
{
    let mut merged = to_object(&target, "target")?;
    let fields = to_object(source, "source")?;

    for (name, value) in fields {
        if skip.contains(&name.as_str()) {
            continue;
        }
        if let Some(slot) = merged.get_mut(&name) {
            *slot = value;
        }
    }

    serde_json::from_value(JsonValue::Object(merged))
        .map_err(|e| DbAccessError::MappingError(e.to_string()))
}

fn to_object<T: Serialize + ?Sized>(
    model: &T,
    role: &str,
) -> Result<Map<String, JsonValue>, DbAccessError> {
    match serde_json::to_value(model) {
        Ok(JsonValue::Object(fields)) => Ok(fields),
        Ok(other) => Err(DbAccessError::MappingError(format!(
            "{role} model must serialize to an object, got {other}"
        ))),
        Err(e) => Err(DbAccessError::MappingError(format!(
            "cannot serialize {role} model: {e}"
        ))),
    }
}
