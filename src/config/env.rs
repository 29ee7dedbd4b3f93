use super::{ConnectionStringProvider, unresolved};
use crate::error::DbAccessError;

/// Connection strings read from the process environment.
///
/// A name `Default` resolves from `CONNECTIONSTRINGS__DEFAULT` (the prefix is
/// configurable); the lookup happens on every call so changes are picked up.
#[derive(Debug, Clone)]
pub struct EnvConnectionStrings {
    prefix: String,
}

impl Default for EnvConnectionStrings {
    fn default() -> Self {
        Self {
            prefix: "CONNECTIONSTRINGS__".to_owned(),
        }
    }
}

impl EnvConnectionStrings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn variable_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name.to_ascii_uppercase())
    }
}

impl ConnectionStringProvider for EnvConnectionStrings {
    fn resolve(&self, name: &str) -> Result<String, DbAccessError> {
        match std::env::var(self.variable_name(name)) {
            Ok(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(unresolved(name)),
        }
    }
}
