//! Database export.
//!
//! Reconstructs DDL from the catalog and, optionally, row data as INSERT
//! statements (SQL format) or nested objects (JSON format). The SQL script
//! is ordered so it replays cleanly: functions, sequences, tables, data,
//! then indexes, constraints, RLS, policies, triggers and views.

use chrono::Utc;
use serde_json::{Map, Value};
use strata_core::{
    quote_ident, quote_literal, quote_qualified, sql_literal, validate_identifier, IdentifierKind,
    SystemSchemaPolicy,
};
use tokio_postgres::Client;

use crate::db::DbClient;
use crate::error::{ApiError, ApiResult};
use crate::telemetry::observe;
use crate::types::{
    ExportFormat, ExportRequest, ExportResponse, ExportedColumn, ExportedDefinition,
    ExportedPolicy, ExportedSequence, ExportedTable, JsonExport, TruncatedTable,
};

const TABLES_SQL: &str = "SELECT table_name::text FROM information_schema.tables \
     WHERE table_schema = $1 AND table_type = 'BASE TABLE' ORDER BY table_name";

const COLUMNS_SQL: &str = "SELECT a.attname::text, format_type(a.atttypid, a.atttypmod), \
     CASE WHEN t.typcategory = 'A' THEN 'ARRAY' ELSE format_type(a.atttypid, NULL) END, \
     NOT a.attnotnull, pg_get_expr(d.adbin, d.adrelid) \
     FROM pg_attribute a \
     JOIN pg_class c ON c.oid = a.attrelid \
     JOIN pg_namespace n ON n.oid = c.relnamespace \
     JOIN pg_type t ON t.oid = a.atttypid \
     LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
     WHERE n.nspname = $1 AND c.relname = $2 AND a.attnum > 0 AND NOT a.attisdropped \
     ORDER BY a.attnum";

/// `kinds` is a `contype` list such as `{p,u,c}` or `{f}`.
const CONSTRAINTS_SQL: &str = "SELECT con.conname::text, pg_get_constraintdef(con.oid) \
     FROM pg_constraint con \
     JOIN pg_class c ON c.oid = con.conrelid \
     JOIN pg_namespace n ON n.oid = c.relnamespace \
     WHERE n.nspname = $1 AND c.relname = $2 AND con.contype::text = ANY($3) \
     ORDER BY con.contype, con.conname";

/// Indexes that do not back a constraint.
const INDEXES_SQL: &str = "SELECT i.indexname::text, i.indexdef \
     FROM pg_indexes i \
     WHERE i.schemaname = $1 AND i.tablename = $2 \
       AND NOT EXISTS ( \
         SELECT 1 FROM pg_constraint con \
         JOIN pg_class ic ON ic.oid = con.conindid \
         JOIN pg_namespace n ON n.oid = ic.relnamespace \
         WHERE ic.relname = i.indexname AND n.nspname = i.schemaname) \
     ORDER BY i.indexname";

const RLS_SQL: &str = "SELECT c.relrowsecurity FROM pg_class c \
     JOIN pg_namespace n ON n.oid = c.relnamespace \
     WHERE n.nspname = $1 AND c.relname = $2";

const POLICIES_SQL: &str = "SELECT policyname::text, permissive = 'PERMISSIVE', cmd, \
     array_to_string(roles, ','), qual, with_check \
     FROM pg_policies WHERE schemaname = $1 AND tablename = $2 ORDER BY policyname";

const TRIGGERS_SQL: &str = "SELECT t.tgname::text, pg_get_triggerdef(t.oid) \
     FROM pg_trigger t \
     JOIN pg_class c ON c.oid = t.tgrelid \
     JOIN pg_namespace n ON n.oid = c.relnamespace \
     WHERE n.nspname = $1 AND c.relname = $2 AND NOT t.tgisinternal \
     ORDER BY t.tgname";

/// Plain functions in the schema, excluding those owned by extensions.
const FUNCTIONS_SQL: &str = "SELECT p.proname::text, pg_get_functiondef(p.oid) \
     FROM pg_proc p \
     JOIN pg_namespace n ON n.oid = p.pronamespace \
     WHERE n.nspname = $1 AND p.prokind = 'f' \
       AND NOT EXISTS (SELECT 1 FROM pg_depend d WHERE d.objid = p.oid AND d.deptype = 'e') \
     ORDER BY p.proname";

const SEQUENCES_SQL: &str = "SELECT sequence_name::text, data_type::text, start_value::text, \
     minimum_value::text, maximum_value::text, increment::text, cycle_option::text = 'YES' \
     FROM information_schema.sequences WHERE sequence_schema = $1 ORDER BY sequence_name";

const VIEWS_SQL: &str = "SELECT viewname::text, definition FROM pg_views \
     WHERE schemaname = $1 ORDER BY viewname";

// ============================================================================
// CATALOG READS
// ============================================================================

async fn definitions(client: &Client, sql: &str, schema: &str, table: &str) -> ApiResult<Vec<ExportedDefinition>> {
    Ok(client
        .query(sql, &[&schema, &table])
        .await?
        .iter()
        .map(|row| ExportedDefinition {
            name: row.get(0),
            definition: row.get(1),
        })
        .collect())
}

async fn constraints(client: &Client, schema: &str, table: &str, kinds: &[&str]) -> ApiResult<Vec<ExportedDefinition>> {
    let kinds: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
    Ok(client
        .query(CONSTRAINTS_SQL, &[&schema, &table, &kinds])
        .await?
        .iter()
        .map(|row| ExportedDefinition {
            name: row.get(0),
            definition: row.get(1),
        })
        .collect())
}

async fn read_table(
    client: &Client,
    schema: &str,
    table: &str,
    include_data: bool,
    row_limit: Option<u64>,
) -> ApiResult<ExportedTable> {
    let columns: Vec<ExportedColumn> = client
        .query(COLUMNS_SQL, &[&schema, &table])
        .await?
        .iter()
        .map(|row| ExportedColumn {
            column_name: row.get(0),
            sql_type: row.get(1),
            data_type: row.get(2),
            is_nullable: row.get(3),
            column_default: row.get(4),
        })
        .collect();
    if columns.is_empty() {
        return Err(ApiError::table_not_found(table));
    }

    let rls_enabled = client
        .query_opt(RLS_SQL, &[&schema, &table])
        .await?
        .map(|row| row.get::<_, bool>(0))
        .unwrap_or(false);

    let policies = client
        .query(POLICIES_SQL, &[&schema, &table])
        .await?
        .iter()
        .map(|row| ExportedPolicy {
            name: row.get(0),
            permissive: row.get(1),
            command: row.get(2),
            roles: row
                .get::<_, Option<String>>(3)
                .map(|r| r.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect())
                .unwrap_or_default(),
            using: row.get(4),
            with_check: row.get(5),
        })
        .collect();

    let mut exported = ExportedTable {
        table_name: table.to_string(),
        columns,
        constraints: constraints(client, schema, table, &["p", "u", "c"]).await?,
        indexes: definitions(client, INDEXES_SQL, schema, table).await?,
        foreign_keys: constraints(client, schema, table, &["f"]).await?,
        rls_enabled,
        policies,
        triggers: definitions(client, TRIGGERS_SQL, schema, table).await?,
        rows: None,
        truncated: None,
        exported_row_count: None,
        total_row_count: None,
    };

    if include_data {
        let relation = quote_qualified(schema, table);
        let total: i64 = client
            .query_one(format!("SELECT count(*) FROM {}", relation).as_str(), &[])
            .await?
            .get(0);
        let total = total.max(0) as u64;

        let select = rows_query(&relation, &exported.columns, row_limit);
        let rows: Vec<Map<String, Value>> = client
            .query(select.as_str(), &[])
            .await?
            .iter()
            .filter_map(|row| match row.get::<_, Value>(0) {
                Value::Object(object) => Some(object),
                _ => None,
            })
            .collect();

        if let Some(limit) = row_limit.filter(|limit| total > *limit) {
            tracing::info!(table = %table, total, limit, "Export truncated at row limit");
            exported.truncated = Some(true);
            exported.exported_row_count = Some(rows.len() as u64);
            exported.total_row_count = Some(total);
        }
        exported.rows = Some(rows);
    }

    Ok(exported)
}

/// Rows as JSON objects. NUMERIC columns, and arrays of them, are replaced by
/// their text form so no digits are lost to a float.
fn rows_query(relation: &str, columns: &[ExportedColumn], row_limit: Option<u64>) -> String {
    let mut object = String::from("to_jsonb(t)");
    for column in columns.iter().filter(|c| c.sql_type.starts_with("numeric")) {
        object.push_str(&format!(
            " || jsonb_build_object({}, t.{}::text)",
            quote_literal(&column.column_name),
            quote_ident(&column.column_name)
        ));
    }
    match row_limit {
        Some(limit) => format!("SELECT {} FROM {} t LIMIT {}", object, relation, limit),
        None => format!("SELECT {} FROM {} t", object, relation),
    }
}

// ============================================================================
// SQL RENDERING
// ============================================================================

fn render_create_table(schema: &str, table: &ExportedTable) -> String {
    let mut lines: Vec<String> = table
        .columns
        .iter()
        .map(|c| {
            let mut line = format!("    {} {}", quote_ident(&c.column_name), c.sql_type);
            if !c.is_nullable {
                line.push_str(" NOT NULL");
            }
            if let Some(default) = &c.column_default {
                line.push_str(&format!(" DEFAULT {}", default));
            }
            line
        })
        .collect();
    lines.extend(
        table
            .constraints
            .iter()
            .map(|c| format!("    CONSTRAINT {} {}", quote_ident(&c.name), c.definition)),
    );
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
        quote_qualified(schema, &table.table_name),
        lines.join(",\n")
    )
}

fn render_inserts(schema: &str, table: &ExportedTable, out: &mut Vec<String>) {
    let Some(rows) = &table.rows else { return };
    if let (Some(true), Some(exported), Some(total)) =
        (table.truncated, table.exported_row_count, table.total_row_count)
    {
        out.push(format!(
            "-- WARNING: {} truncated to {} of {} rows",
            table.table_name, exported, total
        ));
    }
    let relation = quote_qualified(schema, &table.table_name);
    let column_list = table
        .columns
        .iter()
        .map(|c| quote_ident(&c.column_name))
        .collect::<Vec<_>>()
        .join(", ");
    for row in rows {
        let values = table
            .columns
            .iter()
            .map(|c| sql_literal(row.get(&c.column_name).unwrap_or(&Value::Null), &c.data_type))
            .collect::<Vec<_>>()
            .join(", ");
        out.push(format!("INSERT INTO {} ({}) VALUES ({});", relation, column_list, values));
    }
}

/// `CREATE INDEX name` becomes `CREATE INDEX IF NOT EXISTS name`.
fn idempotent_index(definition: &str) -> String {
    match definition.find("INDEX ") {
        Some(at) if !definition[at..].starts_with("INDEX IF NOT EXISTS") => {
            format!("{}INDEX IF NOT EXISTS {}", &definition[..at], &definition[at + 6..])
        }
        _ => definition.to_string(),
    }
}

fn render_policy(schema: &str, table: &str, policy: &ExportedPolicy) -> Vec<String> {
    let relation = quote_qualified(schema, table);
    let roles = if policy.roles.is_empty() {
        "PUBLIC".to_string()
    } else {
        policy
            .roles
            .iter()
            .map(|r| if r == "public" { "PUBLIC".to_string() } else { quote_ident(r) })
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut create = format!(
        "CREATE POLICY {} ON {} AS {} FOR {} TO {}",
        quote_ident(&policy.name),
        relation,
        if policy.permissive { "PERMISSIVE" } else { "RESTRICTIVE" },
        policy.command,
        roles
    );
    if let Some(using) = &policy.using {
        create.push_str(&format!(" USING ({})", using));
    }
    if let Some(check) = &policy.with_check {
        create.push_str(&format!(" WITH CHECK ({})", check));
    }
    create.push(';');
    vec![
        format!("DROP POLICY IF EXISTS {} ON {};", quote_ident(&policy.name), relation),
        create,
    ]
}

fn render_sequence(schema: &str, seq: &ExportedSequence) -> String {
    format!(
        "CREATE SEQUENCE IF NOT EXISTS {} AS {} INCREMENT BY {} MINVALUE {} MAXVALUE {} START WITH {} {};",
        quote_qualified(schema, &seq.name),
        seq.data_type,
        seq.increment,
        seq.minimum_value,
        seq.maximum_value,
        seq.start_value,
        if seq.cycle { "CYCLE" } else { "NO CYCLE" }
    )
}

fn terminated(definition: &str) -> String {
    let trimmed = definition.trim_end();
    if trimmed.ends_with(';') {
        trimmed.to_string()
    } else {
        format!("{};", trimmed)
    }
}

/// Render a full export as one replayable SQL script.
pub fn render_sql(schema: &str, export: &JsonExport) -> String {
    let mut out = vec![
        format!("-- Strata database export ({})", Utc::now().to_rfc3339()),
        format!("-- Schema: {}", schema),
    ];

    if let Some(functions) = &export.functions {
        out.push(String::new());
        out.push("-- Functions".to_string());
        out.extend(functions.iter().map(|f| terminated(&f.definition)));
    }
    if let Some(sequences) = &export.sequences {
        out.push(String::new());
        out.push("-- Sequences".to_string());
        out.extend(sequences.iter().map(|s| render_sequence(schema, s)));
    }

    for table in &export.tables {
        out.push(String::new());
        out.push(format!("-- Table: {}", table.table_name));
        out.push(render_create_table(schema, table));
    }

    for table in export.tables.iter().filter(|t| t.rows.is_some()) {
        out.push(String::new());
        out.push(format!("-- Data: {}", table.table_name));
        render_inserts(schema, table, &mut out);
    }

    for table in &export.tables {
        let relation = quote_qualified(schema, &table.table_name);
        out.push(String::new());
        out.push(format!("-- Objects: {}", table.table_name));
        out.extend(table.indexes.iter().map(|i| terminated(&idempotent_index(&i.definition))));
        for fk in &table.foreign_keys {
            out.push(format!(
                "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {};",
                relation,
                quote_ident(&fk.name)
            ));
            out.push(format!(
                "ALTER TABLE {} ADD CONSTRAINT {} {};",
                relation,
                quote_ident(&fk.name),
                fk.definition
            ));
        }
        if table.rls_enabled {
            out.push(format!("ALTER TABLE {} ENABLE ROW LEVEL SECURITY;", relation));
        }
        for policy in &table.policies {
            out.extend(render_policy(schema, &table.table_name, policy));
        }
        for trigger in &table.triggers {
            out.push(format!(
                "DROP TRIGGER IF EXISTS {} ON {};",
                quote_ident(&trigger.name),
                relation
            ));
            out.push(terminated(&trigger.definition));
        }
    }

    if let Some(views) = &export.views {
        out.push(String::new());
        out.push("-- Views".to_string());
        out.extend(views.iter().map(|v| {
            format!(
                "CREATE OR REPLACE VIEW {} AS {}",
                quote_qualified(schema, &v.name),
                terminated(&v.definition)
            )
        }));
    }

    out.push(String::new());
    out.join("\n")
}

// ============================================================================
// SERVICE
// ============================================================================

pub struct ExportService {
    db: DbClient,
    policy: SystemSchemaPolicy,
}

impl ExportService {
    pub fn new(db: DbClient, policy: SystemSchemaPolicy) -> Self {
        Self { db, policy }
    }

    /// Resolve and validate the requested table list before connecting.
    fn requested_tables(&self, req: &ExportRequest) -> ApiResult<Option<Vec<String>>> {
        let Some(tables) = &req.tables else {
            return Ok(None);
        };
        for table in tables {
            validate_identifier(table, IdentifierKind::Table)?;
            self.policy.ensure_not_system(table)?;
        }
        Ok(Some(tables.clone()))
    }

    pub async fn export_database(&self, req: ExportRequest) -> ApiResult<ExportResponse> {
        if req.row_limit == Some(0) {
            return Err(ApiError::invalid_input("rowLimit must be greater than zero"));
        }
        let requested = self.requested_tables(&req)?;

        observe("export", async {
            let client = self.db.get_conn().await?;
            let schema = self.db.schema();

            let tables = match requested {
                Some(tables) => tables,
                None => client
                    .query(TABLES_SQL, &[&schema])
                    .await?
                    .iter()
                    .map(|row| row.get::<_, String>(0))
                    .filter(|name| !self.policy.is_system_table(name))
                    .collect(),
            };

            let mut exported_tables = Vec::with_capacity(tables.len());
            for table in &tables {
                exported_tables
                    .push(read_table(&client, schema, table, req.include_data, req.row_limit).await?);
            }

            let prefix_filter = |name: &String| !self.policy.is_system_table(name);

            let functions = if req.include_functions {
                Some(
                    client
                        .query(FUNCTIONS_SQL, &[&schema])
                        .await?
                        .iter()
                        .map(|row| ExportedDefinition {
                            name: row.get(0),
                            definition: row.get(1),
                        })
                        .filter(|f| prefix_filter(&f.name))
                        .collect(),
                )
            } else {
                None
            };

            let sequences = if req.include_sequences {
                Some(
                    client
                        .query(SEQUENCES_SQL, &[&schema])
                        .await?
                        .iter()
                        .map(|row| ExportedSequence {
                            name: row.get(0),
                            data_type: row.get(1),
                            start_value: row.get(2),
                            minimum_value: row.get(3),
                            maximum_value: row.get(4),
                            increment: row.get(5),
                            cycle: row.get(6),
                        })
                        .filter(|s| prefix_filter(&s.name))
                        .collect(),
                )
            } else {
                None
            };

            let views = if req.include_views {
                Some(
                    client
                        .query(VIEWS_SQL, &[&schema])
                        .await?
                        .iter()
                        .map(|row| ExportedDefinition {
                            name: row.get(0),
                            definition: row.get(1),
                        })
                        .filter(|v| prefix_filter(&v.name))
                        .collect(),
                )
            } else {
                None
            };

            let export = JsonExport {
                tables: exported_tables,
                functions,
                sequences,
                views,
            };
            build_response(schema, req.format, req.row_limit, export)
        })
        .await
    }
}

fn build_response(
    schema: &str,
    format: ExportFormat,
    row_limit: Option<u64>,
    export: JsonExport,
) -> ApiResult<ExportResponse> {
    let truncated: Vec<TruncatedTable> = export
        .tables
        .iter()
        .filter(|t| t.truncated == Some(true))
        .map(|t| TruncatedTable {
            table_name: t.table_name.clone(),
            exported_row_count: t.exported_row_count.unwrap_or_default(),
            total_row_count: t.total_row_count.unwrap_or_default(),
        })
        .collect();

    let data = match format {
        ExportFormat::Sql => Value::String(render_sql(schema, &export)),
        ExportFormat::Json => serde_json::to_value(&export)?,
    };

    Ok(ExportResponse {
        format,
        data,
        timestamp: Utc::now(),
        truncated_tables: if truncated.is_empty() { None } else { Some(truncated) },
        row_limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn posts_table() -> ExportedTable {
        let mut row = Map::new();
        row.insert("id".to_string(), json!("0b0e0a0d-0000-4000-8000-000000000001"));
        row.insert("title".to_string(), json!("it's"));
        row.insert("meta".to_string(), json!({"a": 1}));
        ExportedTable {
            table_name: "posts".to_string(),
            columns: vec![
                ExportedColumn {
                    column_name: "id".to_string(),
                    sql_type: "uuid".to_string(),
                    data_type: "uuid".to_string(),
                    is_nullable: false,
                    column_default: Some("gen_random_uuid()".to_string()),
                },
                ExportedColumn {
                    column_name: "title".to_string(),
                    sql_type: "text".to_string(),
                    data_type: "text".to_string(),
                    is_nullable: true,
                    column_default: None,
                },
                ExportedColumn {
                    column_name: "meta".to_string(),
                    sql_type: "jsonb".to_string(),
                    data_type: "jsonb".to_string(),
                    is_nullable: true,
                    column_default: None,
                },
            ],
            constraints: vec![ExportedDefinition {
                name: "posts_pkey".to_string(),
                definition: "PRIMARY KEY (id)".to_string(),
            }],
            indexes: vec![ExportedDefinition {
                name: "posts_title_idx".to_string(),
                definition: "CREATE INDEX posts_title_idx ON public.posts USING btree (title)"
                    .to_string(),
            }],
            foreign_keys: vec![],
            rls_enabled: true,
            policies: vec![ExportedPolicy {
                name: "read_all".to_string(),
                permissive: true,
                command: "SELECT".to_string(),
                roles: vec!["public".to_string()],
                using: Some("true".to_string()),
                with_check: None,
            }],
            triggers: vec![],
            rows: Some(vec![row]),
            truncated: Some(true),
            exported_row_count: Some(1),
            total_row_count: Some(25),
        }
    }

    #[test]
    fn test_create_table_reconstruction() {
        let sql = render_create_table("public", &posts_table());
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"public\".\"posts\" ("));
        assert!(sql.contains("\"id\" uuid NOT NULL DEFAULT gen_random_uuid()"));
        assert!(sql.contains("CONSTRAINT \"posts_pkey\" PRIMARY KEY (id)"));
    }

    #[test]
    fn test_sql_script_orders_objects_for_replay() {
        let export = JsonExport {
            tables: vec![posts_table()],
            functions: None,
            sequences: None,
            views: None,
        };
        let sql = render_sql("public", &export);
        let create = sql.find("CREATE TABLE").unwrap();
        let insert = sql.find("INSERT INTO").unwrap();
        let index = sql.find("CREATE INDEX IF NOT EXISTS posts_title_idx").unwrap();
        let rls = sql.find("ENABLE ROW LEVEL SECURITY").unwrap();
        assert!(create < insert && insert < index && index < rls);
        assert!(sql.contains("'it''s'"));
        assert!(sql.contains("'{\"a\":1}'::jsonb"));
        assert!(sql.contains("-- WARNING: posts truncated to 1 of 25 rows"));
        assert!(sql.contains("AS PERMISSIVE FOR SELECT TO PUBLIC USING (true);"));
    }

    #[test]
    fn test_numeric_columns_are_read_as_text() {
        let mut columns = posts_table().columns;
        columns.push(ExportedColumn {
            column_name: "amount".to_string(),
            sql_type: "numeric(30,20)".to_string(),
            data_type: "numeric".to_string(),
            is_nullable: true,
            column_default: None,
        });
        assert_eq!(
            rows_query("\"public\".\"posts\"", &columns, Some(10)),
            "SELECT to_jsonb(t) || jsonb_build_object('amount', t.\"amount\"::text) \
             FROM \"public\".\"posts\" t LIMIT 10"
        );
        assert_eq!(
            rows_query("\"public\".\"posts\"", &posts_table().columns, None),
            "SELECT to_jsonb(t) FROM \"public\".\"posts\" t"
        );
    }

    #[test]
    fn test_idempotent_index() {
        assert_eq!(
            idempotent_index("CREATE UNIQUE INDEX t_a ON public.t USING btree (a)"),
            "CREATE UNIQUE INDEX IF NOT EXISTS t_a ON public.t USING btree (a)"
        );
        assert_eq!(
            idempotent_index("CREATE INDEX IF NOT EXISTS t_a ON t (a)"),
            "CREATE INDEX IF NOT EXISTS t_a ON t (a)"
        );
    }

    #[test]
    fn test_response_records_truncation() -> ApiResult<()> {
        let export = JsonExport {
            tables: vec![posts_table()],
            functions: None,
            sequences: None,
            views: None,
        };
        let response = build_response("public", ExportFormat::Json, Some(1), export)?;
        let truncated = response.truncated_tables.unwrap();
        assert_eq!(truncated[0].total_row_count, 25);
        assert_eq!(response.data["tables"][0]["truncated"], true);
        assert_eq!(response.data["tables"][0]["totalRowCount"], 25);
        assert_eq!(response.row_limit, Some(1));
        Ok(())
    }

    #[test]
    fn test_sequence_rendering() {
        let seq = ExportedSequence {
            name: "order_no".to_string(),
            data_type: "bigint".to_string(),
            start_value: "1".to_string(),
            minimum_value: "1".to_string(),
            maximum_value: "9223372036854775807".to_string(),
            increment: "1".to_string(),
            cycle: false,
        };
        assert_eq!(
            render_sequence("public", &seq),
            "CREATE SEQUENCE IF NOT EXISTS \"public\".\"order_no\" AS bigint INCREMENT BY 1 MINVALUE 1 MAXVALUE 9223372036854775807 START WITH 1 NO CYCLE;"
        );
    }
}
