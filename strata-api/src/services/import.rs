//! SQL file import.
//!
//! The whole file runs in one transaction: an optional tolerant truncate of
//! every visible table, then each statement in order. Any statement failure
//! rolls everything back, truncates included.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use strata_core::{
    leading_keyword, quote_qualified, strip_comments, EngineError, SqlSanitizer,
    SystemSchemaPolicy,
};

use crate::db::{map_db_error, DbClient};
use crate::error::{ApiError, ApiResult};
use crate::notify::{ChangeReason, SchemaChange, SchemaChangeNotifier};
use crate::telemetry::observe;
use crate::types::ImportResponse;

const LIST_TABLES_SQL: &str = "SELECT table_name::text FROM information_schema.tables \
     WHERE table_schema = $1 AND table_type = 'BASE TABLE' ORDER BY table_name";

/// Longest statement excerpt attached to an import error.
const STATEMENT_EXCERPT_LEN: usize = 200;

static TARGET_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)^\s*(?:INSERT\s+INTO|CREATE\s+(?:(?:TEMP|TEMPORARY|UNLOGGED)\s+)?TABLE(?:\s+IF\s+NOT\s+EXISTS)?)\s+((?:"(?:[^"]|"")+"|[A-Za-z_][A-Za-z0-9_$]*)(?:\s*\.\s*(?:"(?:[^"]|"")+"|[A-Za-z_][A-Za-z0-9_$]*))?)"#,
    )
    .expect("Invalid import target regex")
});

/// Table written by an `INSERT INTO` or `CREATE TABLE` statement.
pub fn target_table(statement: &str) -> Option<String> {
    let text = strip_comments(statement);
    let caps = TARGET_TABLE_RE.captures(&text)?;
    let qualified = caps.get(1)?.as_str();
    let last = split_last_segment(qualified);
    Some(match last.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(quoted) => quoted.replace("\"\"", "\""),
        None => last.to_ascii_lowercase(),
    })
}

/// Last dot-separated segment, ignoring dots inside quotes.
fn split_last_segment(qualified: &str) -> &str {
    let mut in_quotes = false;
    let mut start = 0;
    for (idx, ch) in qualified.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '.' if !in_quotes => start = idx + 1,
            _ => {}
        }
    }
    qualified[start..].trim()
}

fn excerpt(statement: &str) -> String {
    if statement.chars().count() <= STATEMENT_EXCERPT_LEN {
        return statement.to_string();
    }
    let cut: String = statement.chars().take(STATEMENT_EXCERPT_LEN).collect();
    format!("{}...", cut)
}

pub fn is_importable_file(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    lower.ends_with(".sql") || lower.ends_with(".txt")
}

pub struct ImportService {
    db: DbClient,
    policy: SystemSchemaPolicy,
    sanitizer: SqlSanitizer,
    max_bytes: usize,
    notifier: Arc<dyn SchemaChangeNotifier>,
}

impl ImportService {
    pub fn new(
        db: DbClient,
        policy: SystemSchemaPolicy,
        sanitizer: SqlSanitizer,
        max_bytes: usize,
        notifier: Arc<dyn SchemaChangeNotifier>,
    ) -> Self {
        Self {
            db,
            policy,
            sanitizer,
            max_bytes,
            notifier,
        }
    }

    /// Validate and split the file. Runs before any connection is taken.
    pub fn prepare(&self, bytes: &[u8], filename: &str) -> ApiResult<Vec<String>> {
        if !is_importable_file(filename) {
            return Err(ApiError::invalid_input(format!(
                "Unsupported file type '{}': only .sql and .txt files can be imported",
                filename
            )));
        }
        if bytes.len() > self.max_bytes {
            return Err(ApiError::payload_too_large(self.max_bytes));
        }
        let text = std::str::from_utf8(bytes)
            .map_err(|_| EngineError::import("File is not valid UTF-8"))?;
        let statements = self.sanitizer.check_script(text)?;
        if statements.is_empty() {
            return Err(EngineError::import("File contains no SQL statements").into());
        }
        Ok(statements)
    }

    pub async fn import_database(
        &self,
        bytes: &[u8],
        filename: &str,
        truncate: bool,
    ) -> ApiResult<ImportResponse> {
        let statements = self.prepare(bytes, filename)?;
        let file_size = bytes.len();

        observe("import", async {
            let schema = self.db.schema();
            let mut client = self.db.get_conn().await?;
            let mut tx = client.transaction().await?;

            if truncate {
                let tables: Vec<String> = tx
                    .query(LIST_TABLES_SQL, &[&schema])
                    .await?
                    .iter()
                    .map(|row| row.get::<_, String>(0))
                    .filter(|name| !self.policy.is_system_table(name))
                    .collect();
                for table in &tables {
                    let sql = format!("TRUNCATE TABLE {} CASCADE", quote_qualified(schema, table));
                    let savepoint = tx.savepoint("strata_truncate").await?;
                    match savepoint.batch_execute(&sql).await {
                        Ok(()) => savepoint.commit().await?,
                        Err(e) => {
                            tracing::warn!(table = %table, error = %e, "Truncate failed, continuing");
                            savepoint.rollback().await?;
                        }
                    }
                }
            }

            let mut touched: Vec<String> = Vec::new();
            let mut rows_imported: u64 = 0;

            for (idx, statement) in statements.iter().enumerate() {
                let affected = tx.execute(statement.as_str(), &[]).await.map_err(|e| {
                    let reason = match map_db_error(&e) {
                        EngineError::SqlExecution { message, .. } => message,
                        other => other.to_string(),
                    };
                    tracing::warn!(statement_index = idx, reason = %reason, "Import statement failed, rolling back");
                    ApiError::from(EngineError::Import {
                        reason: format!("Statement {} failed: {}", idx + 1, reason),
                        statement: Some(excerpt(statement)),
                    })
                })?;

                if let Some(table) = target_table(statement) {
                    if !touched.contains(&table) {
                        touched.push(table);
                    }
                }
                if leading_keyword(statement).as_deref() == Some("INSERT") {
                    rows_imported += affected;
                }
            }

            tx.commit().await?;

            tracing::info!(
                statements = statements.len(),
                tables = touched.len(),
                rows_imported,
                file_size,
                "Import committed"
            );
            self.notifier
                .schema_changed(SchemaChange::global(ChangeReason::Import))
                .await;

            Ok(ImportResponse {
                success: true,
                tables: touched,
                rows_imported,
                file_size,
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

    fn service(max_bytes: usize) -> ImportService {
        let db = DbClient::from_config(&DbConfig::default()).expect("db client");
        ImportService::new(
            db,
            SystemSchemaPolicy::default(),
            SqlSanitizer::default(),
            max_bytes,
            Arc::new(NoopNotifier),
        )
    }

    #[test]
    fn test_target_table() {
        assert_eq!(target_table("INSERT INTO posts (a) VALUES (1)").as_deref(), Some("posts"));
        assert_eq!(
            target_table("insert into \"public\".\"Posts\" values (1)").as_deref(),
            Some("Posts")
        );
        assert_eq!(
            target_table("CREATE TABLE IF NOT EXISTS public.comments (id uuid)").as_deref(),
            Some("comments")
        );
        assert_eq!(
            target_table("-- seed\nINSERT INTO tags VALUES ('x')").as_deref(),
            Some("tags")
        );
        assert_eq!(target_table("UPDATE posts SET a = 1"), None);
    }

    #[test]
    fn test_prepare_rejects_wrong_extension() {
        let err = service(1024).prepare(b"SELECT 1;", "dump.csv").unwrap_err();
        assert_eq!(err.status_code, 400);
    }

    #[test]
    fn test_prepare_enforces_size_limit() {
        let err = service(4).prepare(b"SELECT 1;", "dump.sql").unwrap_err();
        assert_eq!(err.status_code, 413);
    }

    #[test]
    fn test_prepare_sanitizes_every_statement() {
        let sql = b"INSERT INTO posts VALUES (1);\nINSERT INTO _secrets VALUES (2);";
        let err = service(1024).prepare(sql, "dump.SQL").unwrap_err();
        assert_eq!(err.status_code, 403);
    }

    #[test]
    fn test_prepare_splits_on_real_boundaries() -> ApiResult<()> {
        let sql = b"INSERT INTO posts (t) VALUES ('a;b');\nINSERT INTO posts (t) VALUES ($$c;d$$);";
        let statements = service(1024).prepare(sql, "dump.txt")?;
        assert_eq!(statements.len(), 2);
        Ok(())
    }

    #[test]
    fn test_prepare_rejects_empty_file() {
        let err = service(1024).prepare(b"-- nothing here\n", "dump.sql").unwrap_err();
        assert_eq!(err.status_code, 400);
    }

    #[test]
    fn test_excerpt_truncates_long_statements() {
        let long = "x".repeat(500);
        assert!(excerpt(&long).ends_with("..."));
        assert_eq!(excerpt("short"), "short");
    }
}
