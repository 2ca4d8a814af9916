//! Schema-change notification port.
//!
//! Every successful call that changes schema ends with a
//! [`SchemaChangeNotifier::schema_changed`] call so an external row-serving
//! layer reloads its schema cache. Delivery is fire-and-forget: failures are
//! logged and counted, never retried and never surfaced to the caller.

use async_trait::async_trait;
use std::fmt;

use crate::db::DbClient;
use crate::telemetry::METRICS;

/// Why the schema cache should reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    TableCreated,
    TableAltered,
    TableDropped,
    RawSql,
    Import,
    BulkUpsert,
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ChangeReason::TableCreated => "table_created",
            ChangeReason::TableAltered => "table_altered",
            ChangeReason::TableDropped => "table_dropped",
            ChangeReason::RawSql => "raw_sql",
            ChangeReason::Import => "import",
            ChangeReason::BulkUpsert => "bulk_upsert",
        };
        write!(f, "{}", value)
    }
}

/// A schema change event. `table` is `None` when the change is not scoped
/// to a single table (raw SQL, imports).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaChange {
    pub table: Option<String>,
    pub reason: ChangeReason,
}

impl SchemaChange {
    pub fn table(table: impl Into<String>, reason: ChangeReason) -> Self {
        Self {
            table: Some(table.into()),
            reason,
        }
    }

    pub fn global(reason: ChangeReason) -> Self {
        Self {
            table: None,
            reason,
        }
    }
}

/// Outbound port for schema cache invalidation.
#[async_trait]
pub trait SchemaChangeNotifier: Send + Sync {
    async fn schema_changed(&self, change: SchemaChange);
}

/// Sends `NOTIFY <channel>, 'reload schema'` on a pooled connection.
pub struct PgNotifyNotifier {
    db: DbClient,
    channel: String,
}

impl PgNotifyNotifier {
    pub fn new(db: DbClient, channel: impl Into<String>) -> Self {
        Self {
            db,
            channel: channel.into(),
        }
    }

    /// The statement issued on every change.
    pub fn statement(&self) -> String {
        format!("NOTIFY {}, 'reload schema'", strata_core::quote_ident(&self.channel))
    }
}

#[async_trait]
impl SchemaChangeNotifier for PgNotifyNotifier {
    async fn schema_changed(&self, change: SchemaChange) {
        let sent = match self.db.get_conn().await {
            Ok(conn) => match conn.batch_execute(&self.statement()).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(error = %e, channel = %self.channel, "Schema reload notification failed");
                    false
                }
            },
            Err(e) => {
                tracing::warn!(error = %e.message, "No connection for schema reload notification");
                false
            }
        };
        if sent {
            tracing::debug!(table = ?change.table, reason = %change.reason, "Schema reload requested");
        }
        if let Ok(metrics) = METRICS.as_ref() {
            metrics.record_schema_notification(sent);
        }
    }
}

/// Drops every notification. For tooling that runs without a consumer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl SchemaChangeNotifier for NoopNotifier {
    async fn schema_changed(&self, change: SchemaChange) {
        tracing::trace!(table = ?change.table, reason = %change.reason, "Schema change ignored");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConfig;

    #[test]
    fn test_notify_statement_quotes_channel() -> crate::error::ApiResult<()> {
        let db = DbClient::from_config(&DbConfig::default())?;
        let notifier = PgNotifyNotifier::new(db, "pgrst");
        assert_eq!(notifier.statement(), "NOTIFY \"pgrst\", 'reload schema'");
        Ok(())
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(ChangeReason::TableCreated.to_string(), "table_created");
        assert_eq!(SchemaChange::global(ChangeReason::Import).table, None);
    }

    #[tokio::test]
    async fn test_unreachable_database_does_not_fail_caller() -> crate::error::ApiResult<()> {
        let config = DbConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            timeout: std::time::Duration::from_millis(200),
            ..Default::default()
        };
        let notifier = PgNotifyNotifier::new(DbClient::from_config(&config)?, "pgrst");
        notifier
            .schema_changed(SchemaChange::table("posts", ChangeReason::TableCreated))
            .await;
        Ok(())
    }
}
