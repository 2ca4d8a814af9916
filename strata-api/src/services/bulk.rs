//! Bulk insert / upsert from uploaded CSV or JSON records.

use std::sync::Arc;

use strata_core::{build_inserts, parse_records, validate_identifier, IdentifierKind, SystemSchemaPolicy};

use super::catalog::table_exists;
use crate::db::{map_db_error, DbClient};
use crate::db_helpers::{as_sql_params, bind_params};
use crate::error::{ApiError, ApiResult};
use crate::notify::{ChangeReason, SchemaChange, SchemaChangeNotifier};
use crate::telemetry::observe;
use crate::types::BulkUpsertResponse;

pub struct BulkUpsertService {
    db: DbClient,
    policy: SystemSchemaPolicy,
    max_bytes: usize,
    notifier: Arc<dyn SchemaChangeNotifier>,
}

impl BulkUpsertService {
    pub fn new(
        db: DbClient,
        policy: SystemSchemaPolicy,
        max_bytes: usize,
        notifier: Arc<dyn SchemaChangeNotifier>,
    ) -> Self {
        Self {
            db,
            policy,
            max_bytes,
            notifier,
        }
    }

    /// Insert every record of the upload into `table`, upserting on
    /// `upsert_key` when given. All statements share one transaction.
    pub async fn bulk_upsert(
        &self,
        table: &str,
        bytes: &[u8],
        filename: &str,
        upsert_key: Option<&str>,
    ) -> ApiResult<BulkUpsertResponse> {
        validate_identifier(table, IdentifierKind::Table)?;
        self.policy.ensure_not_system(table)?;
        if bytes.len() > self.max_bytes {
            return Err(ApiError::payload_too_large(self.max_bytes));
        }
        let upsert_key = upsert_key.map(str::trim).filter(|k| !k.is_empty());

        let batch = parse_records(bytes, filename)?;
        let total_records = batch.len();
        let statements = build_inserts(self.db.schema(), table, &batch, upsert_key)?;

        observe("bulk_upsert", async {
            let mut client = self.db.get_conn().await?;
            let tx = client.transaction().await?;

            if !table_exists(&*tx, self.db.schema(), table).await? {
                return Err(ApiError::table_not_found(table));
            }

            let mut rows_affected = 0;
            for statement in &statements {
                let prepared = tx
                    .prepare(&statement.sql)
                    .await
                    .map_err(|e| ApiError::from(map_db_error(&e)))?;
                let params = bind_params(&statement.params, prepared.params())?;
                rows_affected += tx
                    .execute(&prepared, &as_sql_params(&params))
                    .await
                    .map_err(|e| ApiError::from(map_db_error(&e)))?;
            }

            tx.commit().await?;

            tracing::info!(
                table = %table,
                total_records,
                rows_affected,
                statements = statements.len(),
                upsert = upsert_key.is_some(),
                "Bulk upsert committed"
            );
            self.notifier
                .schema_changed(SchemaChange::table(table, ChangeReason::BulkUpsert))
                .await;

            Ok(BulkUpsertResponse {
                rows_affected,
                total_records,
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

    fn service(max_bytes: usize) -> BulkUpsertService {
        let config = DbConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..Default::default()
        };
        BulkUpsertService::new(
            DbClient::from_config(&config).expect("db client"),
            SystemSchemaPolicy::default(),
            max_bytes,
            Arc::new(NoopNotifier),
        )
    }

    #[tokio::test]
    async fn test_system_table_is_forbidden() {
        let err = service(1024)
            .bulk_upsert("_secrets", b"a\n1\n", "rows.csv", None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code, 403);
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected() {
        let err = service(4)
            .bulk_upsert("posts", b"title\nhello\n", "rows.csv", None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code, 413);
    }

    #[tokio::test]
    async fn test_unknown_format_is_rejected() {
        let err = service(1024)
            .bulk_upsert("posts", b"title\nhello\n", "rows.xlsx", None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code, 400);
    }

    #[tokio::test]
    async fn test_missing_upsert_key_column_is_rejected() {
        let err = service(1024)
            .bulk_upsert("posts", b"title\nhello\n", "rows.csv", Some("slug"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code, 400);
    }

    #[tokio::test]
    async fn test_invalid_table_name_is_rejected() {
        let err = service(1024)
            .bulk_upsert("posts; drop", b"title\nhello\n", "rows.csv", None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code, 400);
    }
}
