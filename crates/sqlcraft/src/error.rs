//! Error types for sqlcraft

use crate::dialect::Operation;
use thiserror::Error;

/// Result type alias for sqlcraft operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Message fragment drivers use when a single-row lookup comes back empty.
const NO_ROWS_FRAGMENT: &str = "no rows in result set";

/// Error types for database operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// Unrecognized dialect discriminant or malformed configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Database connection error (ping failure, driver refused the URL, ...)
    #[error("Connection error: {0}")]
    Connection(String),

    /// No driver is registered for the requested dialect
    #[error(
        "no driver registered for dialect `{dialect}`; register one with `Drivers::register`"
    )]
    DriverUnavailable { dialect: &'static str },

    /// Connection attempt exceeded its deadline
    #[error("Connection timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Entity/statement shape error
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// Operation not implemented by the dialect
    #[error("operation `{operation}` is not supported by the {dialect} dialect")]
    Unsupported {
        dialect: &'static str,
        operation: Operation,
    },

    /// Lookup returned no rows, or a write touched none
    #[error("Not found: {0}")]
    NoRows(String),

    /// Statement failed in the driver; carries the offending statement
    #[error("Execution error: {source} (statement: {statement})")]
    Execution {
        statement: String,
        #[source]
        source: Box<OrmError>,
    },

    /// Raw driver failure, before it is attached to a statement
    #[error("Driver error: {0}")]
    Driver(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Query could not be compiled (e.g. empty list bound to `IN (?)`)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Structural errors raised while mapping entities to statements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("{table} does not have an identity field named `id`")]
    MissingIdentity { table: &'static str },

    #[error("{table}: identity field `{column}` is not a UUID")]
    IdentityNotUuid {
        table: &'static str,
        column: &'static str,
    },

    #[error("{operation} requires a collection, got a single value")]
    ExpectedCollection { operation: &'static str },

    #[error("{operation} requires a single value, got a collection")]
    ExpectedSingle { operation: &'static str },

    #[error("{operation} was given an empty collection")]
    EmptyCollection { operation: &'static str },

    #[error("{table}: entity does not define a SQL view")]
    MissingSqlView { table: &'static str },

    #[error("template key `{0}` has no value")]
    MissingTemplateKey(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a no-rows error
    pub fn no_rows(message: impl Into<String>) -> Self {
        Self::NoRows(message.into())
    }

    /// Create a driver error
    pub fn driver(message: impl ToString) -> Self {
        Self::Driver(message.to_string())
    }

    /// Attach the statement that produced this error.
    ///
    /// `NoRows` passes through untouched so callers can still match on it.
    pub fn with_statement(self, statement: &str) -> Self {
        match self {
            Self::NoRows(_) | Self::Execution { .. } => self,
            other => Self::Execution {
                statement: statement.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Check if this is a no-rows error.
    ///
    /// Falls back to matching the driver message, since some drivers only
    /// report the condition as text.
    pub fn is_no_rows(&self) -> bool {
        match self {
            Self::NoRows(_) => true,
            Self::Execution { source, .. } => source.is_no_rows(),
            other => other.to_string().contains(NO_ROWS_FRAGMENT),
        }
    }

    /// Check if this is an unsupported-operation error
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if this is a mapping error
    pub fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping(_))
    }
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for OrmError {
    fn from(err: tokio_postgres::Error) -> Self {
        match err.as_db_error() {
            Some(db_err) => Self::Driver(format!("{}: {}", db_err.code().code(), db_err.message())),
            None => Self::Driver(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_rows_matches_legacy_message() {
        assert!(OrmError::driver("sql: no rows in result set").is_no_rows());
        assert!(OrmError::no_rows("select one").is_no_rows());
        assert!(!OrmError::driver("syntax error").is_no_rows());
    }

    #[test]
    fn with_statement_wraps_driver_errors() {
        let err = OrmError::driver("boom").with_statement("DELETE FROM test");
        let OrmError::Execution { statement, source } = &err else {
            panic!("expected execution error, got {err:?}");
        };
        assert_eq!(statement, "DELETE FROM test");
        assert!(matches!(**source, OrmError::Driver(_)));
        assert!(err.to_string().contains("DELETE FROM test"));
    }

    #[test]
    fn with_statement_keeps_no_rows() {
        let err = OrmError::no_rows("none").with_statement("SELECT 1");
        assert!(matches!(err, OrmError::NoRows(_)));
    }

    #[test]
    fn mapping_error_messages_name_the_problem() {
        let err: OrmError = MappingError::MissingIdentity { table: "test" }.into();
        assert!(err.is_mapping());
        assert!(err.to_string().contains("identity field"));
    }
}
