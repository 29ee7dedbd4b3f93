use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::DbAccessError;
use crate::types::RowValues;

/// One argument of a stored procedure call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureParam {
    /// Parameter name without any `@`/`:`/`$` prefix; `None` for positional arguments.
    pub name: Option<String>,
    pub value: RowValues,
}

/// The arguments of a stored procedure call, in the order they were given.
///
/// ```rust
/// use db_access::prelude::*;
///
/// let params = ProcedureParams::new().with("Id", 7).with("Name", "alice");
/// assert_eq!(params.get("id"), Some(&RowValues::Int(7)));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcedureParams {
    params: Vec<ProcedureParam>,
}

fn strip_prefix(name: &str) -> &str {
    name.trim_start_matches(['@', ':', '$'])
}

impl ProcedureParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named parameter. A leading `@`, `:` or `$` is dropped.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<RowValues>) -> Self {
        self.push_named(name, value);
        self
    }

    pub fn push_named(&mut self, name: &str, value: impl Into<RowValues>) {
        self.params.push(ProcedureParam {
            name: Some(strip_prefix(name).to_owned()),
            value: value.into(),
        });
    }

    pub fn push_positional(&mut self, value: impl Into<RowValues>) {
        self.params.push(ProcedureParam {
            name: None,
            value: value.into(),
        });
    }

    /// Look up a named parameter; an exact match wins over a case-insensitive one.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RowValues> {
        let name = strip_prefix(name);
        self.params
            .iter()
            .find(|p| p.name.as_deref() == Some(name))
            .or_else(|| {
                self.params.iter().find(|p| {
                    p.name
                        .as_deref()
                        .is_some_and(|n| n.eq_ignore_ascii_case(name))
                })
            })
            .map(|p| &p.value)
    }

    /// Positional (unnamed) parameters in call order.
    pub fn positional(&self) -> impl Iterator<Item = &RowValues> {
        self.params
            .iter()
            .filter(|p| p.name.is_none())
            .map(|p| &p.value)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProcedureParam> {
        self.params.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Build named parameters from the top-level fields of a serializable model.
    ///
    /// # Errors
    /// Returns [`DbAccessError::ParameterError`] if the model does not serialize
    /// to a JSON object (a `null`/unit payload yields no parameters).
    pub fn from_serialize<T: Serialize + ?Sized>(model: &T) -> Result<Self, DbAccessError> {
        let value = serde_json::to_value(model)
            .map_err(|e| DbAccessError::ParameterError(format!("cannot serialize model: {e}")))?;
        match value {
            JsonValue::Object(fields) => {
                let mut params = ProcedureParams::new();
                for (name, field) in fields {
                    params.push_named(&name, RowValues::from_json(field));
                }
                Ok(params)
            }
            JsonValue::Null => Ok(ProcedureParams::new()),
            other => Err(DbAccessError::ParameterError(format!(
                "model must serialize to an object of named fields, got {other}"
            ))),
        }
    }
}

impl<'a> IntoIterator for &'a ProcedureParams {
    type Item = &'a ProcedureParam;
    type IntoIter = std::slice::Iter<'a, ProcedureParam>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

/// Wrap any `Serialize` model so its fields become named procedure parameters.
///
/// ```rust
/// use db_access::prelude::*;
///
/// #[derive(serde::Serialize)]
/// struct NewUser<'a> { id: i64, name: &'a str }
///
/// let params = ModelParams(NewUser { id: 1, name: "A" }).into_procedure_params().unwrap();
/// assert_eq!(params.get("name"), Some(&RowValues::Text("A".into())));
/// ```
#[derive(Debug, Clone)]
pub struct ModelParams<T>(pub T);

/// Conversion into the argument list of a stored procedure call.
pub trait IntoProcedureParams {
    /// # Errors
    /// Returns [`DbAccessError::ParameterError`] when the payload cannot be
    /// expressed as procedure arguments.
    fn into_procedure_params(self) -> Result<ProcedureParams, DbAccessError>;
}

impl IntoProcedureParams for ProcedureParams {
    fn into_procedure_params(self) -> Result<ProcedureParams, DbAccessError> {
        Ok(self)
    }
}

impl IntoProcedureParams for &ProcedureParams {
    fn into_procedure_params(self) -> Result<ProcedureParams, DbAccessError> {
        Ok(self.clone())
    }
}

impl IntoProcedureParams for () {
    fn into_procedure_params(self) -> Result<ProcedureParams, DbAccessError> {
        Ok(ProcedureParams::new())
    }
}

impl IntoProcedureParams for Vec<RowValues> {
    fn into_procedure_params(self) -> Result<ProcedureParams, DbAccessError> {
        let mut params = ProcedureParams::new();
        for value in self {
            params.push_positional(value);
        }
        Ok(params)
    }
}

impl IntoProcedureParams for Vec<(String, RowValues)> {
    fn into_procedure_params(self) -> Result<ProcedureParams, DbAccessError> {
        let mut params = ProcedureParams::new();
        for (name, value) in self {
            params.push_named(&name, value);
        }
        Ok(params)
    }
}

impl<const N: usize> IntoProcedureParams for [(&str, RowValues); N] {
    fn into_procedure_params(self) -> Result<ProcedureParams, DbAccessError> {
        let mut params = ProcedureParams::new();
        for (name, value) in self {
            params.push_named(name, value);
        }
        Ok(params)
    }
}

impl IntoProcedureParams for BTreeMap<String, RowValues> {
    fn into_procedure_params(self) -> Result<ProcedureParams, DbAccessError> {
        let mut params = ProcedureParams::new();
        for (name, value) in self {
            params.push_named(&name, value);
        }
        Ok(params)
    }
}

impl IntoProcedureParams for HashMap<String, RowValues> {
    fn into_procedure_params(self) -> Result<ProcedureParams, DbAccessError> {
        // sorted so the call is identical across runs
        self.into_iter()
            .collect::<BTreeMap<_, _>>()
            .into_procedure_params()
    }
}

impl<T: Serialize> IntoProcedureParams for ModelParams<T> {
    fn into_procedure_params(self) -> Result<ProcedureParams, DbAccessError> {
        ProcedureParams::from_serialize(&self.0)
    }
}
