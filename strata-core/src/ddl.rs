//! Typed DDL statements and their PostgreSQL renderer.
//!
//! Services never format DDL by hand. They build [`DdlStatement`] values and
//! hand them to [`PgRenderer`], which owns identifier quoting and default
//! encoding for every statement kind.

use crate::column::{ColumnSchema, ColumnType, ForeignKeySchema};
use crate::default_value::format_default;
use crate::error::EngineResult;
use crate::identifier::{quote_ident, quote_qualified};

/// Name of the shared trigger function that maintains `updated_at`.
pub const UPDATED_AT_FUNCTION: &str = "update_updated_at_column";

/// A single DDL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdlStatement {
    CreateTable {
        table: String,
        columns: Vec<ColumnSchema>,
    },
    EnableRls {
        table: String,
    },
    CreateUpdatedAtTrigger {
        table: String,
    },
    CreateTriggerFunction,
    AddColumn {
        table: String,
        column: ColumnSchema,
    },
    DropColumn {
        table: String,
        column: String,
    },
    AlterColumnType {
        table: String,
        column: String,
        column_type: ColumnType,
    },
    SetDefault {
        table: String,
        column: String,
        column_type: ColumnType,
        default_value: String,
    },
    DropDefault {
        table: String,
        column: String,
    },
    RenameColumn {
        table: String,
        from: String,
        to: String,
    },
    AddForeignKey {
        table: String,
        column: String,
        foreign_key: ForeignKeySchema,
    },
    DropConstraint {
        table: String,
        constraint: String,
    },
    RenameTable {
        table: String,
        new_name: String,
    },
    DropTable {
        table: String,
    },
}

impl DdlStatement {
    /// Human-readable summary, used in the applied-operations list.
    pub fn describe(&self) -> String {
        match self {
            DdlStatement::CreateTable { table, columns } => {
                format!("Created table '{}' with {} user columns", table, columns.len())
            }
            DdlStatement::EnableRls { table } => {
                format!("Enabled row-level security on '{}'", table)
            }
            DdlStatement::CreateUpdatedAtTrigger { table } => {
                format!("Installed updated_at trigger on '{}'", table)
            }
            DdlStatement::CreateTriggerFunction => {
                format!("Installed trigger function '{}'", UPDATED_AT_FUNCTION)
            }
            DdlStatement::AddColumn { column, .. } => format!(
                "Added column '{}' ({})",
                column.column_name, column.column_type
            ),
            DdlStatement::DropColumn { column, .. } => format!("Dropped column '{}'", column),
            DdlStatement::AlterColumnType {
                column,
                column_type,
                ..
            } => format!("Changed type of column '{}' to {}", column, column_type),
            DdlStatement::SetDefault { column, .. } => {
                format!("Set default value of column '{}'", column)
            }
            DdlStatement::DropDefault { column, .. } => {
                format!("Removed default value of column '{}'", column)
            }
            DdlStatement::RenameColumn { from, to, .. } => {
                format!("Renamed column '{}' to '{}'", from, to)
            }
            DdlStatement::AddForeignKey {
                column,
                foreign_key,
                ..
            } => format!(
                "Added foreign key on '{}' referencing {}.{}",
                column, foreign_key.reference_table, foreign_key.reference_column
            ),
            DdlStatement::DropConstraint { constraint, .. } => {
                format!("Dropped constraint '{}'", constraint)
            }
            DdlStatement::RenameTable { table, new_name } => {
                format!("Renamed table '{}' to '{}'", table, new_name)
            }
            DdlStatement::DropTable { table } => format!("Dropped table '{}'", table),
        }
    }
}

/// Renders [`DdlStatement`]s for one PostgreSQL schema.
#[derive(Debug, Clone)]
pub struct PgRenderer {
    schema: String,
}

impl PgRenderer {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    fn relation(&self, table: &str) -> String {
        quote_qualified(&self.schema, table)
    }

    pub fn render(&self, statement: &DdlStatement) -> EngineResult<String> {
        let sql = match statement {
            DdlStatement::CreateTable { table, columns } => self.create_table(table, columns)?,
            DdlStatement::EnableRls { table } => format!(
                "ALTER TABLE {} ENABLE ROW LEVEL SECURITY",
                self.relation(table)
            ),
            DdlStatement::CreateUpdatedAtTrigger { table } => format!(
                "CREATE TRIGGER {} BEFORE UPDATE ON {} FOR EACH ROW EXECUTE FUNCTION {}()",
                quote_ident(&format!("update_{}_updated_at", table)),
                self.relation(table),
                self.relation(UPDATED_AT_FUNCTION)
            ),
            DdlStatement::CreateTriggerFunction => format!(
                "CREATE OR REPLACE FUNCTION {}() RETURNS TRIGGER AS $fn$\n\
                 BEGIN\n    NEW.updated_at = CURRENT_TIMESTAMP;\n    RETURN NEW;\nEND;\n\
                 $fn$ LANGUAGE plpgsql",
                self.relation(UPDATED_AT_FUNCTION)
            ),
            DdlStatement::AddColumn { table, column } => format!(
                "ALTER TABLE {} ADD COLUMN {}",
                self.relation(table),
                self.column_definition(column, true)?
            ),
            DdlStatement::DropColumn { table, column } => format!(
                "ALTER TABLE {} DROP COLUMN {}",
                self.relation(table),
                quote_ident(column)
            ),
            DdlStatement::AlterColumnType {
                table,
                column,
                column_type,
            } => format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{}",
                self.relation(table),
                quote_ident(column),
                column_type.sql_type(),
                quote_ident(column),
                column_type.sql_type()
            ),
            DdlStatement::SetDefault {
                table,
                column,
                column_type,
                default_value,
            } => match format_default(Some(default_value), *column_type, true)? {
                Some(fragment) => format!(
                    "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {}",
                    self.relation(table),
                    quote_ident(column),
                    fragment
                ),
                None => format!(
                    "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT",
                    self.relation(table),
                    quote_ident(column)
                ),
            },
            DdlStatement::DropDefault { table, column } => format!(
                "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT",
                self.relation(table),
                quote_ident(column)
            ),
            DdlStatement::RenameColumn { table, from, to } => format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                self.relation(table),
                quote_ident(from),
                quote_ident(to)
            ),
            DdlStatement::AddForeignKey {
                table,
                column,
                foreign_key,
            } => format!(
                "ALTER TABLE {} ADD FOREIGN KEY ({}) {}",
                self.relation(table),
                quote_ident(column),
                self.references(foreign_key)
            ),
            DdlStatement::DropConstraint { table, constraint } => format!(
                "ALTER TABLE {} DROP CONSTRAINT {}",
                self.relation(table),
                quote_ident(constraint)
            ),
            DdlStatement::RenameTable { table, new_name } => format!(
                "ALTER TABLE {} RENAME TO {}",
                self.relation(table),
                quote_ident(new_name)
            ),
            DdlStatement::DropTable { table } => {
                format!("DROP TABLE {} CASCADE", self.relation(table))
            }
        };
        Ok(sql)
    }

    fn create_table(&self, table: &str, columns: &[ColumnSchema]) -> EngineResult<String> {
        let mut lines = Vec::with_capacity(columns.len() + 3);
        lines.push(format!(
            "{} UUID PRIMARY KEY DEFAULT gen_random_uuid()",
            quote_ident("id")
        ));
        for column in columns {
            lines.push(self.column_definition(column, false)?);
        }
        lines.push(format!(
            "{} TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP",
            quote_ident("created_at")
        ));
        lines.push(format!(
            "{} TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP",
            quote_ident("updated_at")
        ));
        for column in columns {
            if let Some(fk) = &column.foreign_key {
                lines.push(format!(
                    "FOREIGN KEY ({}) {}",
                    quote_ident(&column.column_name),
                    self.references(fk)
                ));
            }
        }
        Ok(format!(
            "CREATE TABLE {} (\n    {}\n)",
            self.relation(table),
            lines.join(",\n    ")
        ))
    }

    /// `"name" TYPE [NOT NULL] [UNIQUE] [DEFAULT ...] [REFERENCES ...]`.
    /// Inline references are only emitted for ADD COLUMN; CREATE TABLE uses
    /// table constraints instead.
    fn column_definition(&self, column: &ColumnSchema, inline_fk: bool) -> EngineResult<String> {
        let mut sql = format!(
            "{} {}",
            quote_ident(&column.column_name),
            column.column_type.sql_type()
        );
        if !column.is_nullable {
            sql.push_str(" NOT NULL");
        }
        if column.is_unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(fragment) = format_default(
            column.default_value.as_deref(),
            column.column_type,
            column.is_nullable,
        )? {
            sql.push_str(" DEFAULT ");
            sql.push_str(&fragment);
        }
        if inline_fk {
            if let Some(fk) = &column.foreign_key {
                sql.push(' ');
                sql.push_str(&self.references(fk));
            }
        }
        Ok(sql)
    }

    fn references(&self, fk: &ForeignKeySchema) -> String {
        format!(
            "REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
            self.relation(&fk.reference_table),
            quote_ident(&fk.reference_column),
            fk.on_delete.sql(),
            fk.on_update.sql()
        )
    }
}

impl Default for PgRenderer {
    fn default() -> Self {
        Self::new("public")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ReferentialAction;
    use crate::default_value::unquote_dollar;

    fn author_fk() -> ForeignKeySchema {
        ForeignKeySchema {
            reference_table: "users".to_string(),
            reference_column: "id".to_string(),
            on_delete: ReferentialAction::Cascade,
            on_update: ReferentialAction::Restrict,
        }
    }

    #[test]
    fn test_create_table_layout() -> EngineResult<()> {
        let renderer = PgRenderer::default();
        let sql = renderer.render(&DdlStatement::CreateTable {
            table: "posts".to_string(),
            columns: vec![
                ColumnSchema::new("title", ColumnType::String).not_null().unique(),
                ColumnSchema::new("author_id", ColumnType::Uuid).references(author_fk()),
            ],
        })?;

        assert!(sql.starts_with("CREATE TABLE \"public\".\"posts\" ("));
        assert!(sql.contains("\"id\" UUID PRIMARY KEY DEFAULT gen_random_uuid()"));
        assert!(sql.contains("\"title\" TEXT NOT NULL UNIQUE"));
        assert!(sql.contains("\"created_at\" TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP"));
        assert!(sql.contains("\"updated_at\" TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP"));
        assert!(sql.contains(
            "FOREIGN KEY (\"author_id\") REFERENCES \"public\".\"users\" (\"id\") ON DELETE CASCADE ON UPDATE RESTRICT"
        ));

        let id_pos = sql.find("\"id\"").unwrap_or_default();
        let title_pos = sql.find("\"title\"").unwrap_or_default();
        let created_pos = sql.find("\"created_at\"").unwrap_or_default();
        assert!(id_pos < title_pos && title_pos < created_pos);
        Ok(())
    }

    #[test]
    fn test_user_default_is_dollar_quoted() -> EngineResult<()> {
        let renderer = PgRenderer::default();
        let sql = renderer.render(&DdlStatement::AddColumn {
            table: "posts".to_string(),
            column: ColumnSchema::new("status", ColumnType::String).with_default("it's $$draft"),
        })?;
        let default = sql.split(" DEFAULT ").nth(1).unwrap_or_default();
        assert_eq!(unquote_dollar(default).as_deref(), Some("it's $$draft"));
        Ok(())
    }

    #[test]
    fn test_add_column_with_reference_is_inline() -> EngineResult<()> {
        let renderer = PgRenderer::new("app");
        let sql = renderer.render(&DdlStatement::AddColumn {
            table: "posts".to_string(),
            column: ColumnSchema::new("author_id", ColumnType::Uuid)
                .not_null()
                .references(author_fk()),
        })?;
        assert_eq!(
            sql,
            "ALTER TABLE \"app\".\"posts\" ADD COLUMN \"author_id\" UUID NOT NULL DEFAULT gen_random_uuid() \
             REFERENCES \"app\".\"users\" (\"id\") ON DELETE CASCADE ON UPDATE RESTRICT"
        );
        Ok(())
    }

    #[test]
    fn test_alter_statements() -> EngineResult<()> {
        let renderer = PgRenderer::default();
        assert_eq!(
            renderer.render(&DdlStatement::AlterColumnType {
                table: "posts".to_string(),
                column: "views".to_string(),
                column_type: ColumnType::Integer,
            })?,
            "ALTER TABLE \"public\".\"posts\" ALTER COLUMN \"views\" TYPE INTEGER USING \"views\"::INTEGER"
        );
        assert_eq!(
            renderer.render(&DdlStatement::RenameTable {
                table: "posts".to_string(),
                new_name: "articles".to_string(),
            })?,
            "ALTER TABLE \"public\".\"posts\" RENAME TO \"articles\""
        );
        assert_eq!(
            renderer.render(&DdlStatement::DropTable {
                table: "posts".to_string(),
            })?,
            "DROP TABLE \"public\".\"posts\" CASCADE"
        );
        assert_eq!(
            renderer.render(&DdlStatement::SetDefault {
                table: "posts".to_string(),
                column: "published_at".to_string(),
                column_type: ColumnType::DateTime,
                default_value: "now()".to_string(),
            })?,
            "ALTER TABLE \"public\".\"posts\" ALTER COLUMN \"published_at\" SET DEFAULT CURRENT_TIMESTAMP"
        );
        Ok(())
    }

    #[test]
    fn test_trigger_binds_shared_function() -> EngineResult<()> {
        let renderer = PgRenderer::default();
        let trigger = renderer.render(&DdlStatement::CreateUpdatedAtTrigger {
            table: "posts".to_string(),
        })?;
        assert!(trigger.contains("BEFORE UPDATE ON \"public\".\"posts\""));
        assert!(trigger.ends_with("EXECUTE FUNCTION \"public\".\"update_updated_at_column\"()"));

        let function = renderer.render(&DdlStatement::CreateTriggerFunction)?;
        assert!(function.starts_with(
            "CREATE OR REPLACE FUNCTION \"public\".\"update_updated_at_column\"()"
        ));
        assert!(function.contains("NEW.updated_at = CURRENT_TIMESTAMP"));
        Ok(())
    }

    #[test]
    fn test_describe_is_human_readable() {
        let statement = DdlStatement::RenameColumn {
            table: "posts".to_string(),
            from: "body".to_string(),
            to: "content".to_string(),
        };
        assert_eq!(statement.describe(), "Renamed column 'body' to 'content'");
    }
}
