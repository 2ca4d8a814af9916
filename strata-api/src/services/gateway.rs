//! SQL Execution Gateway
//!
//! Runs caller-supplied SQL after the blocklist sanitizer accepts it, under
//! a hard timeout. Single statements are prepared and bound with typed
//! parameters; parameterless multi-statement scripts go through the simple
//! query protocol and report the last result set. A parameterless statement
//! whose result types have no binary decoding takes the simple protocol too.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use strata_core::{is_ddl, EngineError, SqlSanitizer};
use tokio_postgres::{NoTls, SimpleQueryMessage};

use crate::db::{map_db_error, DbClient};
use crate::db_helpers::{
    as_sql_params, bind_params, decodes, decodes_all, fields_of, row_to_json, FieldInfo,
};
use crate::error::{ApiError, ApiResult};
use crate::notify::{ChangeReason, SchemaChange, SchemaChangeNotifier};
use crate::telemetry::observe;
use crate::types::{RawSqlRequest, RawSqlResponse};

fn db_error(err: tokio_postgres::Error) -> ApiError {
    ApiError::from(map_db_error(&err))
}

pub struct SqlGateway {
    db: DbClient,
    sanitizer: SqlSanitizer,
    timeout: Duration,
    notifier: Arc<dyn SchemaChangeNotifier>,
}

impl SqlGateway {
    pub fn new(
        db: DbClient,
        sanitizer: SqlSanitizer,
        timeout: Duration,
        notifier: Arc<dyn SchemaChangeNotifier>,
    ) -> Self {
        Self {
            db,
            sanitizer,
            timeout,
            notifier,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn execute_raw_sql(&self, req: RawSqlRequest) -> ApiResult<RawSqlResponse> {
        let query = req.query.trim();
        if query.is_empty() {
            return Err(ApiError::missing_field("query"));
        }
        let statements = self.sanitizer.check_script(query)?;
        if statements.is_empty() {
            return Err(ApiError::invalid_input("Query contains no statements"));
        }
        if statements.len() > 1 && !req.params.is_empty() {
            return Err(ApiError::invalid_input(
                "Parameters are only supported for a single statement",
            ));
        }
        let changes_schema = is_ddl(query);

        let response = observe("raw_sql", async {
            let client = self.db.get_conn().await?;
            let cancel_token = client.cancel_token();

            let run = async {
                if statements.len() == 1 {
                    run_prepared(&client, query, &req.params).await
                } else {
                    run_script(&client, query).await
                }
            };

            match tokio::time::timeout(self.timeout, run).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(timeout_secs = self.timeout.as_secs(), "Raw SQL timed out, cancelling");
                    if let Err(e) = cancel_token.cancel_query(NoTls).await {
                        tracing::warn!(error = %e, "Cancel request failed");
                    }
                    Err(EngineError::Timeout {
                        seconds: self.timeout.as_secs(),
                    }
                    .into())
                }
            }
        })
        .await?;

        if changes_schema {
            self.notifier
                .schema_changed(SchemaChange::global(ChangeReason::RawSql))
                .await;
        }
        Ok(response)
    }
}

async fn run_prepared(
    client: &deadpool_postgres::Object,
    query: &str,
    values: &[Value],
) -> ApiResult<RawSqlResponse> {
    let statement = client.prepare(query).await.map_err(db_error)?;
    if !decodes_all(statement.columns()) {
        // Binary results of these types cannot be read; the simple protocol
        // returns every value as text.
        if values.is_empty() {
            return run_script(client, query).await;
        }
        let unreadable: Vec<String> = statement
            .columns()
            .iter()
            .filter(|c| !decodes(c.type_()))
            .map(|c| format!("{} ({})", c.name(), c.type_().name()))
            .collect();
        return Err(ApiError::invalid_input(format!(
            "Result columns {} cannot be returned for a parameterized query; cast them, e.g. ::text",
            unreadable.join(", ")
        )));
    }
    let params = bind_params(values, statement.params())?;
    let params = as_sql_params(&params);

    if statement.columns().is_empty() {
        let affected = client.execute(&statement, &params).await.map_err(db_error)?;
        return Ok(RawSqlResponse {
            rows: Vec::new(),
            row_count: affected,
            fields: Vec::new(),
        });
    }

    let rows = client.query(&statement, &params).await.map_err(db_error)?;
    Ok(RawSqlResponse {
        row_count: rows.len() as u64,
        rows: rows.iter().map(row_to_json).collect::<Result<_, _>>()?,
        fields: fields_of(statement.columns()),
    })
}

/// Run through the simple query protocol. Values come back as text.
async fn run_script(client: &deadpool_postgres::Object, query: &str) -> ApiResult<RawSqlResponse> {
    let messages = client.simple_query(query).await.map_err(db_error)?;

    let mut rows = Vec::new();
    let mut fields: Vec<FieldInfo> = Vec::new();
    let mut row_count = 0;
    let mut finished = false;

    for message in messages {
        match message {
            SimpleQueryMessage::Row(row) => {
                if finished {
                    rows.clear();
                    fields.clear();
                    finished = false;
                }
                if fields.is_empty() {
                    fields = row
                        .columns()
                        .iter()
                        .map(|c| FieldInfo {
                            name: c.name().to_string(),
                            data_type: "text".to_string(),
                        })
                        .collect();
                }
                let mut object = Map::with_capacity(row.len());
                for (idx, column) in row.columns().iter().enumerate() {
                    let value = row
                        .get(idx)
                        .map_or(Value::Null, |v| Value::String(v.to_string()));
                    object.insert(column.name().to_string(), value);
                }
                rows.push(object);
            }
            SimpleQueryMessage::CommandComplete(count) => {
                if finished {
                    rows.clear();
                    fields.clear();
                }
                row_count = count;
                finished = true;
            }
            _ => {}
        }
    }

    Ok(RawSqlResponse {
        rows,
        row_count,
        fields,
    })
}
