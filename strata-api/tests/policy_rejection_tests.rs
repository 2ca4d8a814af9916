//! Rejections that must happen before a connection is acquired.
//!
//! Every service here runs against a pool pointed at a closed port. A test
//! that reached the database would fail with 503 instead of the expected
//! code, and the recording notifier proves nothing was reported as changed.

use std::sync::Arc;

use strata_api::{
    types::{CreateTableRequest, ExportRequest, RawSqlRequest},
    AppState, ErrorCode,
};
use strata_core::{ColumnSchema, ColumnType, TableUpdate};
use strata_test_utils::*;

fn rejecting_state() -> (AppState, Arc<RecordingNotifier>) {
    let notifier = RecordingNotifier::new();
    let db = unreachable_db_client().expect("lazy pool");
    (test_state(db, notifier.clone()), notifier)
}

fn raw(query: &str) -> RawSqlRequest {
    RawSqlRequest {
        query: query.to_string(),
        params: vec![],
    }
}

// ============================================================================
// SYSTEM TABLE IMMUNITY
// ============================================================================

#[tokio::test]
async fn system_table_cannot_be_created() {
    let (state, notifier) = rejecting_state();
    let result = state
        .catalog
        .create_table(CreateTableRequest {
            table_name: "_internal".to_string(),
            columns: post_columns(),
            rls_enabled: false,
        })
        .await;
    assert_forbidden(&result);
    assert_eq!(notifier.count(), 0);
}

#[tokio::test]
async fn system_table_cannot_be_dropped() {
    let (state, _) = rejecting_state();
    assert_forbidden(&state.catalog.delete_table("_internal").await);
}

#[tokio::test]
async fn system_table_cannot_be_altered() {
    let (state, _) = rejecting_state();
    let update = TableUpdate {
        add_columns: vec![ColumnSchema::new("extra", ColumnType::String)],
        ..Default::default()
    };
    assert_forbidden(&state.catalog.update_table_schema("_internal", update).await);
}

#[tokio::test]
async fn system_table_schema_is_hidden() {
    let (state, _) = rejecting_state();
    assert_forbidden(&state.catalog.get_table_schema("_internal").await);
}

#[tokio::test]
async fn users_table_cannot_be_dropped() {
    let (state, _) = rejecting_state();
    assert_forbidden(&state.catalog.delete_table("users").await);
}

// ============================================================================
// CREATE TABLE VALIDATION
// ============================================================================

#[tokio::test]
async fn reserved_column_with_wrong_type_is_rejected() {
    let (state, _) = rejecting_state();
    let result = state
        .catalog
        .create_table(CreateTableRequest {
            table_name: "t".to_string(),
            columns: vec![ColumnSchema::new("id", ColumnType::String)],
            rls_enabled: false,
        })
        .await;
    assert_error_code(&result, ErrorCode::ReservedColumnMismatch);
    assert_status(&result, 400);
}

#[tokio::test]
async fn table_with_only_reserved_columns_is_rejected() {
    let (state, _) = rejecting_state();
    let result = state
        .catalog
        .create_table(CreateTableRequest {
            table_name: "only_reserved".to_string(),
            columns: vec![
                ColumnSchema::new("id", ColumnType::Uuid),
                ColumnSchema::new("created_at", ColumnType::DateTime),
                ColumnSchema::new("updated_at", ColumnType::DateTime),
            ],
            rls_enabled: false,
        })
        .await;
    assert_error_code(&result, ErrorCode::NoUserColumns);
}

#[tokio::test]
async fn injected_table_name_is_rejected() {
    let (state, _) = rejecting_state();
    let result = state
        .catalog
        .create_table(CreateTableRequest {
            table_name: "posts; DROP TABLE users".to_string(),
            columns: post_columns(),
            rls_enabled: false,
        })
        .await;
    assert_error_code(&result, ErrorCode::InvalidInput);
}

#[tokio::test]
async fn empty_update_is_rejected() {
    let (state, _) = rejecting_state();
    let result = state
        .catalog
        .update_table_schema("posts", TableUpdate::default())
        .await;
    assert_status(&result, 400);
}

// ============================================================================
// RAW SQL
// ============================================================================

#[tokio::test]
async fn raw_sql_insert_into_system_table_is_forbidden() {
    let (state, notifier) = rejecting_state();
    let result = state
        .gateway
        .execute_raw_sql(raw("INSERT INTO _secrets (k) VALUES ('v')"))
        .await;
    assert_forbidden(&result);
    assert_eq!(notifier.count(), 0);
}

#[tokio::test]
async fn raw_sql_rename_into_system_prefix_is_forbidden() {
    let (state, _) = rejecting_state();
    let result = state
        .gateway
        .execute_raw_sql(raw("ALTER TABLE posts RENAME TO _evil"))
        .await;
    assert_forbidden(&result);
}

#[tokio::test]
async fn raw_sql_hidden_in_second_statement_is_forbidden() {
    let (state, _) = rejecting_state();
    let result = state
        .gateway
        .execute_raw_sql(raw("SELECT 1; DELETE FROM \"_secrets\""))
        .await;
    assert_forbidden(&result);
}

#[tokio::test]
async fn raw_sql_blank_query_is_rejected() {
    let (state, _) = rejecting_state();
    let result = state.gateway.execute_raw_sql(raw("   ")).await;
    assert_error_code(&result, ErrorCode::MissingField);
}

// ============================================================================
// EXPORT / IMPORT / BULK UPSERT
// ============================================================================

#[tokio::test]
async fn export_of_system_table_is_forbidden() {
    let (state, _) = rejecting_state();
    let result = state
        .exporter
        .export_database(ExportRequest {
            tables: Some(vec!["_secrets".to_string()]),
            ..Default::default()
        })
        .await;
    assert_forbidden(&result);
}

#[tokio::test]
async fn export_with_zero_row_limit_is_rejected() {
    let (state, _) = rejecting_state();
    let result = state
        .exporter
        .export_database(ExportRequest {
            row_limit: Some(0),
            ..Default::default()
        })
        .await;
    assert_status(&result, 400);
}

#[tokio::test]
async fn import_touching_system_table_is_forbidden() {
    let (state, notifier) = rejecting_state();
    let script = b"INSERT INTO posts (title) VALUES ('a');\nDROP TABLE _secrets;\n";
    let result = state.importer.import_database(script, "dump.sql", false).await;
    assert_forbidden(&result);
    assert_eq!(notifier.count(), 0);
}

#[tokio::test]
async fn import_of_unsupported_file_is_rejected() {
    let (state, _) = rejecting_state();
    let result = state
        .importer
        .import_database(b"SELECT 1;", "dump.csv", false)
        .await;
    assert_status(&result, 400);
}

#[tokio::test]
async fn bulk_upsert_into_system_table_is_forbidden() {
    let (state, _) = rejecting_state();
    let result = state
        .bulk
        .bulk_upsert("_secrets", &posts_csv(2), "rows.csv", None)
        .await;
    assert_forbidden(&result);
}

#[tokio::test]
async fn bulk_upsert_with_unknown_upsert_key_is_rejected() {
    let (state, _) = rejecting_state();
    let result = state
        .bulk
        .bulk_upsert("posts", &posts_csv(2), "rows.csv", Some("missing"))
        .await;
    assert_status(&result, 400);
}
