//! Planning of catalog mutations.
//!
//! A plan turns a validated request plus a snapshot of the live table into
//! the ordered list of [`DdlStatement`]s to execute. Every policy and
//! identifier check happens here, before a connection is acquired.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::column::{ColumnSchema, ColumnType, ForeignKeySchema, ResolvedColumn};
use crate::ddl::DdlStatement;
use crate::error::{EngineError, EngineResult};
use crate::identifier::{validate_identifier, validate_new_identifier, IdentifierKind};
use crate::policy::SystemSchemaPolicy;

// ============================================================================
// REQUEST SHAPES
// ============================================================================

/// Change to an existing column. Applied as type, then default, then rename.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ColumnUpdate {
    pub column_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_column_name: Option<String>,
    /// An empty string removes the current default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub column_type: Option<ColumnType>,
}

/// Foreign key to add to an existing column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyAddition {
    pub column_name: String,
    #[serde(flatten)]
    pub foreign_key: ForeignKeySchema,
}

/// Compound alteration of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TableUpdate {
    #[serde(default)]
    pub add_columns: Vec<ColumnSchema>,
    #[serde(default)]
    pub drop_columns: Vec<String>,
    #[serde(default)]
    pub update_columns: Vec<ColumnUpdate>,
    #[serde(default)]
    pub add_foreign_keys: Vec<ForeignKeyAddition>,
    /// Columns whose foreign key constraints should be dropped.
    #[serde(default)]
    pub drop_foreign_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename_table: Option<String>,
}

impl TableUpdate {
    pub fn is_empty(&self) -> bool {
        self.add_columns.is_empty()
            && self.drop_columns.is_empty()
            && self.update_columns.is_empty()
            && self.add_foreign_keys.is_empty()
            && self.drop_foreign_keys.is_empty()
            && self.rename_table.is_none()
    }
}

// ============================================================================
// LIVE SNAPSHOT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotColumn {
    pub name: String,
    pub column_type: Option<ColumnType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotForeignKey {
    pub column: String,
    pub constraint: String,
}

/// What the catalog currently says about a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSnapshot {
    pub table: String,
    pub columns: Vec<SnapshotColumn>,
    pub foreign_keys: Vec<SnapshotForeignKey>,
}

impl TableSnapshot {
    pub fn column(&self, name: &str) -> Option<&SnapshotColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

// ============================================================================
// CREATE TABLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTablePlan {
    pub statements: Vec<DdlStatement>,
    /// Final column list: reserved columns plus user columns, with SQL types.
    pub columns: Vec<ResolvedColumn>,
}

/// Drop reserved columns whose type matches, fail on a mismatching type.
pub fn reconcile_reserved_columns(
    policy: &SystemSchemaPolicy,
    columns: Vec<ColumnSchema>,
) -> EngineResult<Vec<ColumnSchema>> {
    let mut user_columns = Vec::with_capacity(columns.len());
    for column in columns {
        match policy.reserved_type(&column.column_name) {
            Some(expected) if expected == column.column_type => {}
            Some(expected) => {
                return Err(EngineError::ReservedTypeMismatch {
                    column: column.column_name,
                    expected,
                    got: column.column_type,
                })
            }
            None => user_columns.push(column),
        }
    }
    Ok(user_columns)
}

pub fn plan_create_table(
    policy: &SystemSchemaPolicy,
    table: &str,
    columns: Vec<ColumnSchema>,
    rls_enabled: bool,
) -> EngineResult<CreateTablePlan> {
    validate_new_identifier(table, IdentifierKind::Table, policy.system_prefix())?;

    let user_columns = reconcile_reserved_columns(policy, columns)?;
    if user_columns.is_empty() {
        return Err(EngineError::NoUserColumns {
            table: table.to_string(),
        });
    }

    let mut seen = HashSet::new();
    for column in &user_columns {
        validate_identifier(&column.column_name, IdentifierKind::Column)?;
        if !seen.insert(column.column_name.as_str()) {
            return Err(EngineError::invalid_input(format!(
                "Column '{}' is declared more than once",
                column.column_name
            )));
        }
        if let Some(fk) = &column.foreign_key {
            validate_reference(policy, fk)?;
        }
    }

    let mut resolved: Vec<ResolvedColumn> = Vec::with_capacity(user_columns.len() + 3);
    for (name, column_type) in policy.reserved_columns() {
        // Matches the rendered table: only the key is NOT NULL.
        let mut column = ColumnSchema::new(name, column_type);
        if name == "id" {
            column = column.not_null().unique();
        }
        column.default_value = column_type
            .mapping()
            .canonical_default
            .map(|function| function.sql().to_string());
        resolved.push(ResolvedColumn {
            sql_type: column_type.sql_type().to_string(),
            column,
        });
    }
    resolved.extend(user_columns.iter().map(|column| ResolvedColumn {
        sql_type: column.column_type.sql_type().to_string(),
        column: column.clone(),
    }));

    let mut statements = vec![DdlStatement::CreateTable {
        table: table.to_string(),
        columns: user_columns,
    }];
    if rls_enabled {
        statements.push(DdlStatement::EnableRls {
            table: table.to_string(),
        });
    }
    statements.push(DdlStatement::CreateUpdatedAtTrigger {
        table: table.to_string(),
    });

    Ok(CreateTablePlan {
        statements,
        columns: resolved,
    })
}

fn validate_reference(policy: &SystemSchemaPolicy, fk: &ForeignKeySchema) -> EngineResult<()> {
    validate_identifier(&fk.reference_table, IdentifierKind::Table)?;
    validate_identifier(&fk.reference_column, IdentifierKind::Column)?;
    policy.ensure_not_system(&fk.reference_table)
}

// ============================================================================
// UPDATE TABLE
// ============================================================================

/// Order the operations of `update` into executable statements.
///
/// Fixed order: drop foreign keys, drop columns, update columns, add
/// columns, add foreign keys, rename table.
pub fn plan_table_update(
    policy: &SystemSchemaPolicy,
    snapshot: &TableSnapshot,
    update: &TableUpdate,
) -> EngineResult<Vec<DdlStatement>> {
    let table = snapshot.table.as_str();
    policy.ensure_not_system(table)?;
    if update.is_empty() {
        return Err(EngineError::invalid_input(
            "At least one schema operation is required",
        ));
    }

    let mut statements = Vec::new();

    // Projected column names after drops, renames and adds.
    let mut projected: Vec<String> = snapshot.columns.iter().map(|c| c.name.clone()).collect();

    for column in &update.drop_foreign_keys {
        validate_identifier(column, IdentifierKind::Column)?;
        let constraints: Vec<&SnapshotForeignKey> = snapshot
            .foreign_keys
            .iter()
            .filter(|fk| &fk.column == column)
            .collect();
        if constraints.is_empty() {
            return Err(EngineError::NotFound {
                kind: "Foreign key",
                name: format!("{}.{}", table, column),
            });
        }
        statements.extend(constraints.into_iter().map(|fk| DdlStatement::DropConstraint {
            table: table.to_string(),
            constraint: fk.constraint.clone(),
        }));
    }

    for column in &update.drop_columns {
        validate_identifier(column, IdentifierKind::Column)?;
        policy.ensure_column_mutable(table, column)?;
        if !projected.iter().any(|c| c == column) {
            return Err(EngineError::column_not_found(table, column));
        }
        projected.retain(|c| c != column);
        statements.push(DdlStatement::DropColumn {
            table: table.to_string(),
            column: column.clone(),
        });
    }

    for change in &update.update_columns {
        let column = &change.column_name;
        validate_identifier(column, IdentifierKind::Column)?;
        policy.ensure_column_mutable(table, column)?;
        let current = snapshot
            .column(column)
            .filter(|_| projected.iter().any(|c| c == column))
            .ok_or_else(|| EngineError::column_not_found(table, column))?;

        if let Some(column_type) = change.column_type {
            statements.push(DdlStatement::AlterColumnType {
                table: table.to_string(),
                column: column.clone(),
                column_type,
            });
        }

        if let Some(default_value) = &change.default_value {
            if default_value.trim().is_empty() {
                statements.push(DdlStatement::DropDefault {
                    table: table.to_string(),
                    column: column.clone(),
                });
            } else {
                let column_type = change
                    .column_type
                    .or(current.column_type)
                    .unwrap_or(ColumnType::String);
                statements.push(DdlStatement::SetDefault {
                    table: table.to_string(),
                    column: column.clone(),
                    column_type,
                    default_value: default_value.clone(),
                });
            }
        }

        if let Some(new_name) = change.new_column_name.as_ref().filter(|n| *n != column) {
            validate_identifier(new_name, IdentifierKind::Column)?;
            if policy.is_reserved(new_name) {
                return Err(EngineError::forbidden(format!(
                    "Cannot rename column to reserved name '{}'",
                    new_name
                )));
            }
            if projected.iter().any(|c| c == new_name) {
                return Err(EngineError::invalid_input(format!(
                    "Column '{}' already exists on table '{}'",
                    new_name, table
                )));
            }
            projected.retain(|c| c != column);
            projected.push(new_name.clone());
            statements.push(DdlStatement::RenameColumn {
                table: table.to_string(),
                from: column.clone(),
                to: new_name.clone(),
            });
        }
    }

    for column in &update.add_columns {
        validate_identifier(&column.column_name, IdentifierKind::Column)?;
        if policy.is_reserved(&column.column_name) {
            return Err(EngineError::forbidden(format!(
                "Column '{}' is a reserved system column and already exists",
                column.column_name
            )));
        }
        if projected.iter().any(|c| c == &column.column_name) {
            return Err(EngineError::invalid_input(format!(
                "Column '{}' already exists on table '{}'",
                column.column_name, table
            )));
        }
        if let Some(fk) = &column.foreign_key {
            validate_reference(policy, fk)?;
        }
        projected.push(column.column_name.clone());
        statements.push(DdlStatement::AddColumn {
            table: table.to_string(),
            column: column.clone(),
        });
    }

    for addition in &update.add_foreign_keys {
        validate_identifier(&addition.column_name, IdentifierKind::Column)?;
        validate_reference(policy, &addition.foreign_key)?;
        if !projected.iter().any(|c| c == &addition.column_name) {
            return Err(EngineError::column_not_found(table, &addition.column_name));
        }
        statements.push(DdlStatement::AddForeignKey {
            table: table.to_string(),
            column: addition.column_name.clone(),
            foreign_key: addition.foreign_key.clone(),
        });
    }

    let user_columns = projected.iter().filter(|c| !policy.is_reserved(c)).count();
    if user_columns == 0 {
        return Err(EngineError::NoUserColumns {
            table: table.to_string(),
        });
    }

    if let Some(new_name) = update.rename_table.as_ref().filter(|n| n.as_str() != table) {
        validate_identifier(new_name, IdentifierKind::Table)?;
        policy.ensure_renamable(table, new_name)?;
        statements.push(DdlStatement::RenameTable {
            table: table.to_string(),
            new_name: new_name.clone(),
        });
    }

    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ReferentialAction;

    fn snapshot(table: &str, user_columns: &[(&str, ColumnType)]) -> TableSnapshot {
        let mut columns = vec![
            SnapshotColumn {
                name: "id".to_string(),
                column_type: Some(ColumnType::Uuid),
            },
            SnapshotColumn {
                name: "created_at".to_string(),
                column_type: Some(ColumnType::DateTime),
            },
            SnapshotColumn {
                name: "updated_at".to_string(),
                column_type: Some(ColumnType::DateTime),
            },
        ];
        columns.extend(user_columns.iter().map(|(name, ty)| SnapshotColumn {
            name: name.to_string(),
            column_type: Some(*ty),
        }));
        TableSnapshot {
            table: table.to_string(),
            columns,
            foreign_keys: vec![],
        }
    }

    #[test]
    fn test_create_table_drops_matching_reserved_columns() -> EngineResult<()> {
        let policy = SystemSchemaPolicy::default();
        let plan = plan_create_table(
            &policy,
            "posts",
            vec![
                ColumnSchema::new("id", ColumnType::Uuid),
                ColumnSchema::new("title", ColumnType::String),
            ],
            true,
        )?;
        let names: Vec<&str> = plan
            .columns
            .iter()
            .map(|c| c.column.column_name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "created_at", "updated_at", "title"]);
        let nullable: Vec<bool> = plan.columns.iter().map(|c| c.column.is_nullable).collect();
        assert_eq!(nullable, vec![false, true, true, true]);
        assert_eq!(plan.statements.len(), 3);
        assert!(matches!(
            &plan.statements[0],
            DdlStatement::CreateTable { columns, .. } if columns.len() == 1
        ));
        assert!(matches!(plan.statements[1], DdlStatement::EnableRls { .. }));
        Ok(())
    }

    #[test]
    fn test_create_table_only_reserved_columns_is_rejected() {
        let policy = SystemSchemaPolicy::default();
        let err = plan_create_table(
            &policy,
            "t",
            vec![
                ColumnSchema::new("id", ColumnType::Uuid),
                ColumnSchema::new("created_at", ColumnType::DateTime),
            ],
            false,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::NoUserColumns { .. }));
    }

    #[test]
    fn test_create_table_reserved_type_mismatch() {
        let policy = SystemSchemaPolicy::default();
        let err = plan_create_table(
            &policy,
            "t",
            vec![ColumnSchema::new("id", ColumnType::String)],
            false,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EngineError::ReservedTypeMismatch {
                expected: ColumnType::Uuid,
                got: ColumnType::String,
                ..
            }
        ));
    }

    #[test]
    fn test_create_system_table_is_forbidden() {
        let policy = SystemSchemaPolicy::default();
        let err = plan_create_table(
            &policy,
            "_internal",
            vec![ColumnSchema::new("title", ColumnType::String)],
            false,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden { .. }));
    }

    #[test]
    fn test_create_table_rejects_duplicate_and_bad_columns() {
        let policy = SystemSchemaPolicy::default();
        let duplicate = plan_create_table(
            &policy,
            "t",
            vec![
                ColumnSchema::new("title", ColumnType::String),
                ColumnSchema::new("title", ColumnType::Integer),
            ],
            false,
        );
        assert!(matches!(duplicate, Err(EngineError::InvalidInput { .. })));

        let bad = plan_create_table(
            &policy,
            "t",
            vec![ColumnSchema::new("bad name", ColumnType::String)],
            false,
        );
        assert!(matches!(bad, Err(EngineError::InvalidInput { .. })));
    }

    #[test]
    fn test_update_orders_operations() -> EngineResult<()> {
        let policy = SystemSchemaPolicy::default();
        let mut snap = snapshot(
            "posts",
            &[("body", ColumnType::String), ("author_id", ColumnType::Uuid)],
        );
        snap.foreign_keys.push(SnapshotForeignKey {
            column: "author_id".to_string(),
            constraint: "posts_author_id_fkey".to_string(),
        });
        let update = TableUpdate {
            rename_table: Some("articles".to_string()),
            add_foreign_keys: vec![ForeignKeyAddition {
                column_name: "editor_id".to_string(),
                foreign_key: ForeignKeySchema {
                    reference_table: "users".to_string(),
                    reference_column: "id".to_string(),
                    on_delete: ReferentialAction::SetNull,
                    on_update: ReferentialAction::Restrict,
                },
            }],
            add_columns: vec![ColumnSchema::new("editor_id", ColumnType::Uuid)],
            update_columns: vec![ColumnUpdate {
                column_name: "body".to_string(),
                new_column_name: Some("content".to_string()),
                default_value: Some("".to_string()),
                column_type: None,
            }],
            drop_columns: vec!["author_id".to_string()],
            drop_foreign_keys: vec!["author_id".to_string()],
        };

        let statements = plan_table_update(&policy, &snap, &update)?;
        let kinds: Vec<&str> = statements
            .iter()
            .map(|s| match s {
                DdlStatement::DropConstraint { .. } => "drop_fk",
                DdlStatement::DropColumn { .. } => "drop_column",
                DdlStatement::DropDefault { .. } => "drop_default",
                DdlStatement::RenameColumn { .. } => "rename_column",
                DdlStatement::AddColumn { .. } => "add_column",
                DdlStatement::AddForeignKey { .. } => "add_fk",
                DdlStatement::RenameTable { .. } => "rename_table",
                _ => "other",
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "drop_fk",
                "drop_column",
                "drop_default",
                "rename_column",
                "add_column",
                "add_fk",
                "rename_table"
            ]
        );
        Ok(())
    }

    #[test]
    fn test_update_rejects_dropping_last_user_column() {
        let policy = SystemSchemaPolicy::default();
        let snap = snapshot("posts", &[("title", ColumnType::String)]);
        let update = TableUpdate {
            drop_columns: vec!["title".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            plan_table_update(&policy, &snap, &update),
            Err(EngineError::NoUserColumns { .. })
        ));

        // Replacing the last column in the same request is fine.
        let update = TableUpdate {
            drop_columns: vec!["title".to_string()],
            add_columns: vec![ColumnSchema::new("headline", ColumnType::String)],
            ..Default::default()
        };
        assert!(plan_table_update(&policy, &snap, &update).is_ok());
    }

    #[test]
    fn test_update_protects_reserved_and_frozen_columns() {
        let policy = SystemSchemaPolicy::default();
        let users = snapshot(
            "users",
            &[("nickname", ColumnType::String), ("bio", ColumnType::String)],
        );
        let drop_frozen = TableUpdate {
            drop_columns: vec!["nickname".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            plan_table_update(&policy, &users, &drop_frozen),
            Err(EngineError::Forbidden { .. })
        ));

        let retype_reserved = TableUpdate {
            update_columns: vec![ColumnUpdate {
                column_name: "created_at".to_string(),
                column_type: Some(ColumnType::Date),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(matches!(
            plan_table_update(&policy, &users, &retype_reserved),
            Err(EngineError::Forbidden { .. })
        ));

        let rename_users = TableUpdate {
            rename_table: Some("members".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            plan_table_update(&policy, &users, &rename_users),
            Err(EngineError::Forbidden { .. })
        ));
    }

    #[test]
    fn test_update_system_table_is_forbidden() {
        let policy = SystemSchemaPolicy::default();
        let snap = snapshot("_internal", &[("secret", ColumnType::String)]);
        let update = TableUpdate {
            drop_columns: vec!["secret".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            plan_table_update(&policy, &snap, &update),
            Err(EngineError::Forbidden { .. })
        ));
    }

    #[test]
    fn test_drop_unknown_foreign_key_is_not_found() {
        let policy = SystemSchemaPolicy::default();
        let snap = snapshot("posts", &[("title", ColumnType::String)]);
        let update = TableUpdate {
            drop_foreign_keys: vec!["title".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            plan_table_update(&policy, &snap, &update),
            Err(EngineError::NotFound { kind: "Foreign key", .. })
        ));
    }

    #[test]
    fn test_rename_table_to_system_prefix_is_forbidden() {
        let policy = SystemSchemaPolicy::default();
        let snap = snapshot("posts", &[("title", ColumnType::String)]);
        let update = TableUpdate {
            rename_table: Some("_posts".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            plan_table_update(&policy, &snap, &update),
            Err(EngineError::Forbidden { .. })
        ));
    }

    #[test]
    fn test_set_default_uses_current_type() -> EngineResult<()> {
        let policy = SystemSchemaPolicy::default();
        let snap = snapshot("posts", &[("published_at", ColumnType::DateTime)]);
        let update = TableUpdate {
            update_columns: vec![ColumnUpdate {
                column_name: "published_at".to_string(),
                default_value: Some("now()".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let statements = plan_table_update(&policy, &snap, &update)?;
        assert!(matches!(
            &statements[0],
            DdlStatement::SetDefault {
                column_type: ColumnType::DateTime,
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn test_table_update_deserializes() -> Result<(), serde_json::Error> {
        let update: TableUpdate = serde_json::from_value(serde_json::json!({
            "dropColumns": ["body"],
            "addForeignKeys": [{
                "columnName": "author_id",
                "referenceTable": "users",
                "referenceColumn": "id",
                "onDelete": "SET NULL"
            }],
            "updateColumns": [{"columnName": "title", "type": "string", "newColumnName": "headline"}]
        }))?;
        assert_eq!(update.drop_columns, vec!["body"]);
        assert_eq!(
            update.add_foreign_keys[0].foreign_key.on_delete,
            ReferentialAction::SetNull
        );
        assert_eq!(update.update_columns[0].column_type, Some(ColumnType::String));
        assert!(update.rename_table.is_none());
        Ok(())
    }
}
