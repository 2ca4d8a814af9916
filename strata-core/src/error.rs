//! Error types for Strata engine operations

use thiserror::Error;

use crate::column::ColumnType;

/// Engine-level failures, independent of the transport that surfaces them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Column '{column}' is reserved and must be of type {expected}, got {got}")]
    ReservedTypeMismatch {
        column: String,
        expected: ColumnType,
        got: ColumnType,
    },

    #[error("Table '{table}' must have at least one column besides the reserved columns")]
    NoUserColumns { table: String },

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("Table '{table}' already exists")]
    DuplicateTable { table: String },

    #[error("SQL execution failed: {message}")]
    SqlExecution {
        message: String,
        sqlstate: Option<String>,
    },

    #[error("Statement exceeded the {seconds}s execution timeout")]
    Timeout { seconds: u64 },

    #[error("Import failed: {reason}")]
    Import {
        reason: String,
        statement: Option<String>,
    },
}

impl EngineError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn table_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "Table",
            name: name.into(),
        }
    }

    pub fn column_not_found(table: &str, column: &str) -> Self {
        Self::NotFound {
            kind: "Column",
            name: format!("{}.{}", table, column),
        }
    }

    pub fn sql(message: impl Into<String>) -> Self {
        Self::SqlExecution {
            message: message.into(),
            sqlstate: None,
        }
    }

    pub fn import(reason: impl Into<String>) -> Self {
        Self::Import {
            reason: reason.into(),
            statement: None,
        }
    }

    /// A short remediation hint suitable for surfacing to API callers.
    pub fn remediation(&self) -> Option<String> {
        match self {
            EngineError::InvalidInput { .. } => Some(
                "Use names of letters, digits and underscores that do not start with a digit."
                    .to_string(),
            ),
            EngineError::ReservedTypeMismatch { column, expected, .. } => Some(format!(
                "Remove '{}' from the column list or declare it as {}.",
                column, expected
            )),
            EngineError::NoUserColumns { .. } => {
                Some("Add at least one user-defined column.".to_string())
            }
            EngineError::Forbidden { .. } => Some(
                "System tables, reserved columns and frozen columns cannot be modified."
                    .to_string(),
            ),
            EngineError::NotFound { kind, .. } => {
                Some(format!("Check the {} name and try again.", kind.to_lowercase()))
            }
            EngineError::DuplicateTable { .. } => {
                Some("Choose a different table name or drop the existing table first.".to_string())
            }
            EngineError::SqlExecution { .. } => {
                Some("Check the SQL syntax and referenced objects.".to_string())
            }
            EngineError::Timeout { .. } => {
                Some("Simplify the statement or add an index to speed it up.".to_string())
            }
            EngineError::Import { .. } => Some(
                "Fix the failing statement in the file; nothing from this import was applied."
                    .to_string(),
            ),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_object() {
        let err = EngineError::table_not_found("posts");
        assert_eq!(err.to_string(), "Table 'posts' not found");

        let err = EngineError::column_not_found("posts", "title");
        assert!(err.to_string().contains("posts.title"));

        let err = EngineError::ReservedTypeMismatch {
            column: "id".to_string(),
            expected: ColumnType::Uuid,
            got: ColumnType::String,
        };
        assert!(err.to_string().contains("uuid"));
        assert!(err.to_string().contains("string"));
    }

    #[test]
    fn test_every_error_has_a_remediation() {
        let errors = vec![
            EngineError::invalid_input("bad"),
            EngineError::NoUserColumns {
                table: "t".to_string(),
            },
            EngineError::forbidden("nope"),
            EngineError::table_not_found("t"),
            EngineError::DuplicateTable {
                table: "t".to_string(),
            },
            EngineError::sql("syntax"),
            EngineError::Timeout { seconds: 30 },
            EngineError::import("bad file"),
        ];
        for err in errors {
            assert!(err.remediation().is_some(), "{:?}", err);
        }
    }
}
