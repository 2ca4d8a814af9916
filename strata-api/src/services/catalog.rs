//! Schema Catalog Service
//!
//! Create, introspect, alter and drop tenant tables. Validation and
//! planning happen in `strata-core` before a connection is taken; this
//! service snapshots the catalog, executes the planned statements and
//! signals the schema cache.

use std::collections::HashSet;
use std::sync::Arc;

use strata_core::{
    parse_stored_default, plan_create_table, plan_table_update, quote_qualified,
    validate_identifier, ColumnInfo, ColumnType, DdlStatement, EngineError, ForeignKeySchema,
    IdentifierKind, PgRenderer, ReferentialAction, SnapshotColumn, SnapshotForeignKey,
    SystemSchemaPolicy, TableSchema, TableSnapshot, TableUpdate,
};
use tokio_postgres::error::SqlState;
use tokio_postgres::GenericClient;

use crate::db::{map_db_error, DbClient};
use crate::error::{ApiError, ApiResult};
use crate::notify::{ChangeReason, SchemaChange, SchemaChangeNotifier};
use crate::telemetry::observe;
use crate::types::{
    CreateTableRequest, CreateTableResponse, DatabaseMetadata, DeleteTableResponse,
    UpdateTableResponse,
};

const LIST_TABLES_SQL: &str = "SELECT table_name::text FROM information_schema.tables \
     WHERE table_schema = $1 AND table_type = 'BASE TABLE' ORDER BY table_name";

const TABLE_EXISTS_SQL: &str = "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
     WHERE table_schema = $1 AND table_name = $2)";

const COLUMNS_SQL: &str = "SELECT column_name::text, data_type::text, udt_name::text, \
     is_nullable::text, column_default::text \
     FROM information_schema.columns \
     WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position";

const KEY_COLUMNS_SQL: &str = "SELECT kcu.column_name::text, tc.constraint_type::text \
     FROM information_schema.table_constraints tc \
     JOIN information_schema.key_column_usage kcu \
       ON tc.constraint_name = kcu.constraint_name \
      AND tc.table_schema = kcu.table_schema \
      AND tc.table_name = kcu.table_name \
     WHERE tc.table_schema = $1 AND tc.table_name = $2 \
       AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE')";

const FOREIGN_KEYS_SQL: &str = "SELECT tc.constraint_name::text, kcu.column_name::text, \
     ccu.table_name::text, ccu.column_name::text, rc.delete_rule::text, rc.update_rule::text \
     FROM information_schema.table_constraints tc \
     JOIN information_schema.key_column_usage kcu \
       ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
     JOIN information_schema.constraint_column_usage ccu \
       ON ccu.constraint_name = tc.constraint_name AND ccu.constraint_schema = tc.table_schema \
     JOIN information_schema.referential_constraints rc \
       ON rc.constraint_name = tc.constraint_name AND rc.constraint_schema = tc.table_schema \
     WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = $1 AND tc.table_name = $2 \
     ORDER BY tc.constraint_name";

// ============================================================================
// INTROSPECTION
// ============================================================================

struct CatalogColumn {
    name: String,
    data_type: String,
    udt_name: String,
    is_nullable: bool,
    column_default: Option<String>,
}

struct CatalogForeignKey {
    constraint: String,
    column: String,
    schema: ForeignKeySchema,
}

/// Raw catalog view of one table.
struct Introspection {
    columns: Vec<CatalogColumn>,
    primary_keys: HashSet<String>,
    unique: HashSet<String>,
    foreign_keys: Vec<CatalogForeignKey>,
}

impl Introspection {
    fn snapshot(&self, table: &str) -> TableSnapshot {
        TableSnapshot {
            table: table.to_string(),
            columns: self
                .columns
                .iter()
                .map(|c| SnapshotColumn {
                    name: c.name.clone(),
                    column_type: ColumnType::from_catalog_type(&c.data_type),
                })
                .collect(),
            foreign_keys: self
                .foreign_keys
                .iter()
                .map(|fk| SnapshotForeignKey {
                    column: fk.column.clone(),
                    constraint: fk.constraint.clone(),
                })
                .collect(),
        }
    }

    fn column_infos(&self) -> Vec<ColumnInfo> {
        self.columns
            .iter()
            .map(|c| {
                let sql_type = match c.data_type.as_str() {
                    "ARRAY" | "USER-DEFINED" => c.udt_name.clone(),
                    other => other.to_string(),
                };
                ColumnInfo {
                    column_name: c.name.clone(),
                    column_type: ColumnType::from_catalog_type(&c.data_type),
                    sql_type,
                    is_nullable: c.is_nullable,
                    is_unique: self.unique.contains(&c.name) || self.primary_keys.contains(&c.name),
                    is_primary_key: self.primary_keys.contains(&c.name),
                    default_value: c.column_default.as_deref().and_then(parse_stored_default),
                    foreign_key: self
                        .foreign_keys
                        .iter()
                        .find(|fk| fk.column == c.name)
                        .map(|fk| fk.schema.clone()),
                }
            })
            .collect()
    }
}

async fn introspect<C: GenericClient + Sync>(
    client: &C,
    schema: &str,
    table: &str,
) -> ApiResult<Introspection> {
    let columns = client
        .query(COLUMNS_SQL, &[&schema, &table])
        .await?
        .iter()
        .map(|row| CatalogColumn {
            name: row.get(0),
            data_type: row.get(1),
            udt_name: row.get(2),
            is_nullable: row.get::<_, String>(3) == "YES",
            column_default: row.get(4),
        })
        .collect::<Vec<_>>();

    if columns.is_empty() {
        return Err(EngineError::table_not_found(table).into());
    }

    let mut primary_keys = HashSet::new();
    let mut unique = HashSet::new();
    for row in client.query(KEY_COLUMNS_SQL, &[&schema, &table]).await? {
        let column: String = row.get(0);
        let kind: String = row.get(1);
        if kind == "PRIMARY KEY" {
            primary_keys.insert(column);
        } else {
            unique.insert(column);
        }
    }

    let foreign_keys = client
        .query(FOREIGN_KEYS_SQL, &[&schema, &table])
        .await?
        .iter()
        .map(|row| CatalogForeignKey {
            constraint: row.get(0),
            column: row.get(1),
            schema: ForeignKeySchema {
                reference_table: row.get(2),
                reference_column: row.get(3),
                on_delete: ReferentialAction::from_catalog(&row.get::<_, String>(4)),
                on_update: ReferentialAction::from_catalog(&row.get::<_, String>(5)),
            },
        })
        .collect();

    Ok(Introspection {
        columns,
        primary_keys,
        unique,
        foreign_keys,
    })
}

pub(crate) async fn table_exists<C: GenericClient + Sync>(client: &C, schema: &str, table: &str) -> ApiResult<bool> {
    let row = client.query_one(TABLE_EXISTS_SQL, &[&schema, &table]).await?;
    Ok(row.get(0))
}

async fn count_rows<C: GenericClient + Sync>(
    client: &C,
    schema: &str,
    table: &str,
) -> Result<i64, tokio_postgres::Error> {
    let sql = format!("SELECT count(*) FROM {}", quote_qualified(schema, table));
    let row = client.query_one(sql.as_str(), &[]).await?;
    Ok(row.get(0))
}

/// Only a missing relation means the table went away; every other count
/// failure is reported as is.
fn is_vanished_table(code: Option<&SqlState>) -> bool {
    code == Some(&SqlState::UNDEFINED_TABLE)
}

/// Render and run `statements` in order, returning their descriptions.
async fn execute_statements<C: GenericClient + Sync>(
    client: &C,
    renderer: &PgRenderer,
    statements: &[DdlStatement],
) -> ApiResult<Vec<String>> {
    let mut applied = Vec::with_capacity(statements.len());
    for statement in statements {
        let sql = renderer.render(statement)?;
        tracing::debug!(sql = %sql, "Executing DDL");
        client
            .batch_execute(&sql)
            .await
            .map_err(|e| ApiError::from(map_db_error(&e)))?;
        applied.push(statement.describe());
    }
    Ok(applied)
}

// ============================================================================
// SERVICE
// ============================================================================

/// Table lifecycle operations on the working schema.
pub struct CatalogService {
    db: DbClient,
    policy: SystemSchemaPolicy,
    renderer: PgRenderer,
    notifier: Arc<dyn SchemaChangeNotifier>,
}

impl CatalogService {
    pub fn new(
        db: DbClient,
        policy: SystemSchemaPolicy,
        notifier: Arc<dyn SchemaChangeNotifier>,
    ) -> Self {
        let renderer = PgRenderer::new(db.schema());
        Self {
            db,
            policy,
            renderer,
            notifier,
        }
    }

    pub fn policy(&self) -> &SystemSchemaPolicy {
        &self.policy
    }

    /// Install the shared `updated_at` trigger function. Idempotent.
    pub async fn bootstrap(&self) -> ApiResult<()> {
        let client = self.db.get_conn().await?;
        execute_statements(&**client, &self.renderer, &[DdlStatement::CreateTriggerFunction])
            .await?;
        tracing::info!(schema = %self.db.schema(), "Trigger function installed");
        Ok(())
    }

    /// Visible tables in the working schema.
    pub async fn list_tables(&self) -> ApiResult<Vec<String>> {
        observe("list_tables", async {
            let client = self.db.get_conn().await?;
            let rows = client.query(LIST_TABLES_SQL, &[&self.db.schema()]).await?;
            Ok(rows
                .iter()
                .map(|row| row.get::<_, String>(0))
                .filter(|name| !self.policy.is_system_table(name))
                .collect())
        })
        .await
    }

    pub async fn create_table(&self, req: CreateTableRequest) -> ApiResult<CreateTableResponse> {
        observe("create_table", async {
            let plan = plan_create_table(&self.policy, &req.table_name, req.columns, req.rls_enabled)?;
            let table = req.table_name;

            let mut client = self.db.get_conn().await?;
            if table_exists(&**client, self.db.schema(), &table).await? {
                return Err(EngineError::DuplicateTable { table }.into());
            }

            let tx = client.transaction().await?;
            execute_statements(&*tx, &self.renderer, &plan.statements).await?;
            tx.commit().await?;

            tracing::info!(table = %table, columns = plan.columns.len(), "Table created");
            self.notifier
                .schema_changed(SchemaChange::table(&table, ChangeReason::TableCreated))
                .await;

            Ok(CreateTableResponse {
                table_name: table,
                columns: plan.columns,
                rls_enabled: req.rls_enabled,
            })
        })
        .await
    }

    pub async fn get_table_schema(&self, table: &str) -> ApiResult<TableSchema> {
        validate_identifier(table, IdentifierKind::Table)?;
        self.policy.ensure_not_system(table)?;
        observe("get_table_schema", async {
            let client = self.db.get_conn().await?;
            self.describe_table(&**client, table).await
        })
        .await
    }

    async fn describe_table<C: GenericClient + Sync>(&self, client: &C, table: &str) -> ApiResult<TableSchema> {
        let introspection = introspect(client, self.db.schema(), table).await?;
        // The table may be dropped between the two queries; that surfaces as a 404.
        let record_count = count_rows(client, self.db.schema(), table)
            .await
            .map_err(|e| {
                if is_vanished_table(e.code()) {
                    ApiError::from(EngineError::table_not_found(table))
                } else {
                    ApiError::from(map_db_error(&e))
                }
            })?;
        Ok(TableSchema {
            table_name: table.to_string(),
            columns: introspection.column_infos(),
            record_count,
        })
    }

    /// Apply a compound schema update atomically.
    pub async fn update_table_schema(
        &self,
        table: &str,
        update: TableUpdate,
    ) -> ApiResult<UpdateTableResponse> {
        validate_identifier(table, IdentifierKind::Table)?;
        self.policy.ensure_not_system(table)?;
        if update.is_empty() {
            return Err(ApiError::invalid_input("At least one schema operation is required"));
        }

        observe("update_table_schema", async {
            let mut client = self.db.get_conn().await?;
            let tx = client.transaction().await?;

            let snapshot = introspect(&*tx, self.db.schema(), table).await?.snapshot(table);
            let statements = plan_table_update(&self.policy, &snapshot, &update)?;
            let operations = execute_statements(&*tx, &self.renderer, &statements).await?;
            tx.commit().await?;

            let table_name = update.rename_table.clone().unwrap_or_else(|| table.to_string());
            tracing::info!(table = %table, operations = operations.len(), "Table schema updated");
            self.notifier
                .schema_changed(SchemaChange::table(&table_name, ChangeReason::TableAltered))
                .await;

            Ok(UpdateTableResponse {
                table_name,
                operations,
            })
        })
        .await
    }

    pub async fn delete_table(&self, table: &str) -> ApiResult<DeleteTableResponse> {
        validate_identifier(table, IdentifierKind::Table)?;
        self.policy.ensure_droppable(table)?;

        observe("delete_table", async {
            let client = self.db.get_conn().await?;
            if !table_exists(&**client, self.db.schema(), table).await? {
                return Err(EngineError::table_not_found(table).into());
            }
            execute_statements(
                &**client,
                &self.renderer,
                &[DdlStatement::DropTable {
                    table: table.to_string(),
                }],
            )
            .await?;

            tracing::info!(table = %table, "Table dropped");
            self.notifier
                .schema_changed(SchemaChange::table(table, ChangeReason::TableDropped))
                .await;

            Ok(DeleteTableResponse {
                table_name: table.to_string(),
                deleted: true,
            })
        })
        .await
    }

    /// Schema and record count of every visible table.
    pub async fn describe_database(&self) -> ApiResult<DatabaseMetadata> {
        let tables = self.list_tables().await?;
        observe("describe_database", async {
            let client = self.db.get_conn().await?;
            let mut schemas = Vec::with_capacity(tables.len());
            for table in &tables {
                match self.describe_table(&**client, table).await {
                    Ok(schema) => schemas.push(schema),
                    Err(e) if e.status_code == 404 => {
                        tracing::debug!(table = %table, "Table vanished during describe");
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(DatabaseMetadata {
                schema: self.db.schema().to_string(),
                total_tables: schemas.len(),
                tables: schemas,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConfig;
    use crate::notify::NoopNotifier;
    use strata_core::ColumnSchema;

    fn service() -> CatalogService {
        let config = DbConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..Default::default()
        };
        let db = DbClient::from_config(&config).expect("db client");
        CatalogService::new(db, SystemSchemaPolicy::default(), Arc::new(NoopNotifier))
    }

    #[test]
    fn test_only_undefined_table_counts_as_vanished() {
        assert!(is_vanished_table(Some(&SqlState::UNDEFINED_TABLE)));
        assert!(!is_vanished_table(Some(&SqlState::INSUFFICIENT_PRIVILEGE)));
        assert!(!is_vanished_table(Some(&SqlState::QUERY_CANCELED)));
        assert!(!is_vanished_table(None));
    }

    #[tokio::test]
    async fn test_create_rejects_before_connecting() {
        let svc = service();
        let err = svc
            .create_table(CreateTableRequest {
                table_name: "_internal".to_string(),
                columns: vec![ColumnSchema::new("title", ColumnType::String)],
                rls_enabled: false,
            })
            .await
            .unwrap_err();
        assert_eq!(err.status_code, 403);

        let err = svc
            .create_table(CreateTableRequest {
                table_name: "t".to_string(),
                columns: vec![ColumnSchema::new("id", ColumnType::String)],
                rls_enabled: false,
            })
            .await
            .unwrap_err();
        assert_eq!(err.status_code, 400);
    }

    #[tokio::test]
    async fn test_system_tables_are_immune() {
        let svc = service();
        assert_eq!(svc.delete_table("_internal").await.unwrap_err().status_code, 403);
        assert_eq!(svc.delete_table("users").await.unwrap_err().status_code, 403);
        let update = TableUpdate {
            drop_columns: vec!["x".to_string()],
            ..Default::default()
        };
        assert_eq!(
            svc.update_table_schema("_internal", update).await.unwrap_err().status_code,
            403
        );
        assert_eq!(svc.get_table_schema("_internal").await.unwrap_err().status_code, 403);
    }

    #[tokio::test]
    async fn test_empty_update_is_invalid() {
        let svc = service();
        let err = svc
            .update_table_schema("posts", TableUpdate::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code, 400);
    }

    #[test]
    fn test_column_infos_flag_keys_and_parse_defaults() {
        let introspection = Introspection {
            columns: vec![
                CatalogColumn {
                    name: "id".to_string(),
                    data_type: "uuid".to_string(),
                    udt_name: "uuid".to_string(),
                    is_nullable: false,
                    column_default: Some("gen_random_uuid()".to_string()),
                },
                CatalogColumn {
                    name: "title".to_string(),
                    data_type: "text".to_string(),
                    udt_name: "text".to_string(),
                    is_nullable: true,
                    column_default: Some("'it''s'::text".to_string()),
                },
                CatalogColumn {
                    name: "tags".to_string(),
                    data_type: "ARRAY".to_string(),
                    udt_name: "_text".to_string(),
                    is_nullable: true,
                    column_default: None,
                },
            ],
            primary_keys: HashSet::from(["id".to_string()]),
            unique: HashSet::new(),
            foreign_keys: vec![],
        };
        let infos = introspection.column_infos();
        assert!(infos[0].is_primary_key && infos[0].is_unique);
        assert_eq!(infos[1].default_value.as_deref(), Some("it's"));
        assert_eq!(infos[1].column_type, Some(ColumnType::String));
        assert_eq!(infos[2].sql_type, "_text");
        assert_eq!(infos[2].column_type, None);

        let snapshot = introspection.snapshot("posts");
        assert_eq!(snapshot.columns.len(), 3);
        assert_eq!(snapshot.column("id").and_then(|c| c.column_type), Some(ColumnType::Uuid));
    }
}
