//! System-schema policy.
//!
//! One rule table answers every "may this be touched?" question: reserved
//! columns present on every user table, frozen columns on built-in tables,
//! protected built-in tables, and the system table prefix. Mutation entry
//! points query the policy by name instead of re-checking ad hoc.

use crate::column::ColumnType;
use crate::error::{EngineError, EngineResult};

/// Columns every user table carries, with their required types.
pub const RESERVED_COLUMNS: [(&str, ColumnType); 3] = [
    ("id", ColumnType::Uuid),
    ("created_at", ColumnType::DateTime),
    ("updated_at", ColumnType::DateTime),
];

/// Built-in table whose profile columns are frozen.
pub const USERS_TABLE: &str = "users";

/// Default prefix marking system tables.
pub const DEFAULT_SYSTEM_PREFIX: &str = "_";

/// A single policy rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyRule {
    /// `column` exists on every user table and must have `column_type`.
    Reserved {
        column: &'static str,
        column_type: ColumnType,
    },
    /// `column` on `table` may never be dropped, renamed or retyped.
    Frozen {
        table: &'static str,
        column: &'static str,
    },
    /// `table` may be altered but never dropped or renamed.
    ProtectedTable { table: &'static str },
}

/// The rule table plus the system prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemSchemaPolicy {
    system_prefix: String,
    rules: Vec<PolicyRule>,
}

impl Default for SystemSchemaPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PREFIX)
    }
}

impl SystemSchemaPolicy {
    pub fn new(system_prefix: impl Into<String>) -> Self {
        let mut rules: Vec<PolicyRule> = RESERVED_COLUMNS
            .iter()
            .map(|(column, column_type)| PolicyRule::Reserved {
                column: *column,
                column_type: *column_type,
            })
            .collect();
        rules.push(PolicyRule::Frozen {
            table: USERS_TABLE,
            column: "nickname",
        });
        rules.push(PolicyRule::Frozen {
            table: USERS_TABLE,
            column: "avatar_url",
        });
        rules.push(PolicyRule::ProtectedTable { table: USERS_TABLE });
        Self {
            system_prefix: system_prefix.into(),
            rules,
        }
    }

    pub fn system_prefix(&self) -> &str {
        &self.system_prefix
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    pub fn is_system_table(&self, table: &str) -> bool {
        !self.system_prefix.is_empty() && table.starts_with(&self.system_prefix)
    }

    pub fn is_reserved(&self, column: &str) -> bool {
        self.reserved_type(column).is_some()
    }

    pub fn reserved_type(&self, column: &str) -> Option<ColumnType> {
        self.rules.iter().find_map(|rule| match rule {
            PolicyRule::Reserved {
                column: c,
                column_type,
            } if *c == column => Some(*column_type),
            _ => None,
        })
    }

    pub fn reserved_columns(&self) -> impl Iterator<Item = (&'static str, ColumnType)> + '_ {
        self.rules.iter().filter_map(|rule| match rule {
            PolicyRule::Reserved {
                column,
                column_type,
            } => Some((*column, *column_type)),
            _ => None,
        })
    }

    pub fn is_frozen(&self, table: &str, column: &str) -> bool {
        self.rules.iter().any(|rule| {
            matches!(rule, PolicyRule::Frozen { table: t, column: c } if *t == table && *c == column)
        })
    }

    pub fn is_protected_table(&self, table: &str) -> bool {
        self.rules
            .iter()
            .any(|rule| matches!(rule, PolicyRule::ProtectedTable { table: t } if *t == table))
    }

    // ========================================================================
    // Entry-point guards
    // ========================================================================

    /// Reject any operation addressed at a system table.
    pub fn ensure_not_system(&self, table: &str) -> EngineResult<()> {
        if self.is_system_table(table) {
            return Err(EngineError::forbidden(format!(
                "Table '{}' is a system table and cannot be accessed through the schema API",
                table
            )));
        }
        Ok(())
    }

    /// Guard for dropping a table.
    pub fn ensure_droppable(&self, table: &str) -> EngineResult<()> {
        self.ensure_not_system(table)?;
        if self.is_protected_table(table) {
            return Err(EngineError::forbidden(format!(
                "Table '{}' is a built-in table and cannot be deleted",
                table
            )));
        }
        Ok(())
    }

    /// Guard for renaming `table` to `new_name`.
    pub fn ensure_renamable(&self, table: &str, new_name: &str) -> EngineResult<()> {
        self.ensure_not_system(table)?;
        if self.is_protected_table(table) {
            return Err(EngineError::forbidden(format!(
                "Table '{}' is a built-in table and cannot be renamed",
                table
            )));
        }
        if self.is_system_table(new_name) {
            return Err(EngineError::forbidden(format!(
                "Cannot rename table to '{}': the '{}' prefix is reserved for system tables",
                new_name, self.system_prefix
            )));
        }
        Ok(())
    }

    /// Guard for dropping, renaming or retyping `column` on `table`.
    pub fn ensure_column_mutable(&self, table: &str, column: &str) -> EngineResult<()> {
        if self.is_reserved(column) {
            return Err(EngineError::forbidden(format!(
                "Column '{}' is a reserved system column and cannot be modified",
                column
            )));
        }
        if self.is_frozen(table, column) {
            return Err(EngineError::forbidden(format!(
                "Column '{}' on table '{}' is frozen and cannot be modified",
                column, table
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_columns() {
        let policy = SystemSchemaPolicy::default();
        assert_eq!(policy.reserved_type("id"), Some(ColumnType::Uuid));
        assert_eq!(policy.reserved_type("created_at"), Some(ColumnType::DateTime));
        assert_eq!(policy.reserved_type("updated_at"), Some(ColumnType::DateTime));
        assert_eq!(policy.reserved_type("title"), None);
        assert_eq!(policy.reserved_columns().count(), 3);
    }

    #[test]
    fn test_system_tables() {
        let policy = SystemSchemaPolicy::default();
        assert!(policy.is_system_table("_internal"));
        assert!(!policy.is_system_table("posts"));
        assert!(policy.ensure_not_system("_secrets").is_err());

        let custom = SystemSchemaPolicy::new("sys_");
        assert!(custom.is_system_table("sys_audit"));
        assert!(!custom.is_system_table("_internal"));
    }

    #[test]
    fn test_frozen_columns_only_apply_to_users() {
        let policy = SystemSchemaPolicy::default();
        assert!(policy.is_frozen("users", "nickname"));
        assert!(policy.is_frozen("users", "avatar_url"));
        assert!(!policy.is_frozen("posts", "nickname"));
        assert!(policy.ensure_column_mutable("posts", "nickname").is_ok());
        assert!(matches!(
            policy.ensure_column_mutable("users", "nickname"),
            Err(EngineError::Forbidden { .. })
        ));
        assert!(matches!(
            policy.ensure_column_mutable("posts", "id"),
            Err(EngineError::Forbidden { .. })
        ));
    }

    #[test]
    fn test_users_table_is_protected() {
        let policy = SystemSchemaPolicy::default();
        assert!(policy.ensure_droppable("users").is_err());
        assert!(policy.ensure_renamable("users", "members").is_err());
        assert!(policy.ensure_droppable("posts").is_ok());
        assert!(policy.ensure_renamable("posts", "_posts").is_err());
        assert!(policy.ensure_renamable("posts", "articles").is_ok());
    }
}
