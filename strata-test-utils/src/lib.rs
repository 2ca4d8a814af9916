//! Strata Test Utilities
//!
//! Shared test infrastructure for the Strata workspace:
//! - Proptest generators for identifiers, column types and column sets
//! - Fixtures for database clients, engine state and upload files
//! - A recording schema-change notifier
//! - Assertions on API error codes

pub use strata_api::{
    ApiError, ApiResult, AppState, ChangeReason, DbClient, DbConfig, EngineConfig, ErrorCode,
    SchemaChange, SchemaChangeNotifier,
};
pub use strata_core::{
    ColumnSchema, ColumnType, EngineError, EngineResult, ForeignKeySchema, ReferentialAction,
    SystemSchemaPolicy,
};

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

// ============================================================================
// RECORDING NOTIFIER
// ============================================================================

/// Notifier that keeps every change it receives, in order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    changes: Mutex<Vec<SchemaChange>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn changes(&self) -> Vec<SchemaChange> {
        match self.changes.lock() {
            Ok(changes) => changes.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self) -> usize {
        self.changes().len()
    }

    pub fn last(&self) -> Option<SchemaChange> {
        self.changes().pop()
    }

    /// Number of recorded changes with the given reason.
    pub fn count_of(&self, reason: ChangeReason) -> usize {
        self.changes()
            .iter()
            .filter(|change| change.reason == reason)
            .count()
    }
}

#[async_trait]
impl SchemaChangeNotifier for RecordingNotifier {
    async fn schema_changed(&self, change: SchemaChange) {
        match self.changes.lock() {
            Ok(mut changes) => changes.push(change),
            Err(poisoned) => poisoned.into_inner().push(change),
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for catalog inputs.

    use super::*;
    use proptest::collection::vec;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use strata_core::identifier::is_reserved_keyword;

    /// A name that passes identifier validation and is neither reserved
    /// as a column nor a SQL keyword.
    pub fn arb_identifier() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,24}".prop_filter("keyword or reserved column", |name| {
            !is_reserved_keyword(name) && !SystemSchemaPolicy::default().is_reserved(name)
        })
    }

    /// Strings that must fail identifier validation.
    pub fn arb_invalid_identifier() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            "[0-9][a-z0-9_]{0,10}",
            "[a-z]{1,8}[ ;'\"\\-.()]{1,3}[a-z]{0,8}",
            "[a-z]{64,80}",
            Just("select".to_string()),
        ]
    }

    /// A table name that never collides with the system prefix or with
    /// the protected `users` table.
    pub fn arb_table_name() -> impl Strategy<Value = String> {
        arb_identifier()
            .prop_map(|name| format!("t_{}", name))
            .prop_filter("too long", |name| name.len() <= strata_core::MAX_IDENTIFIER_LEN)
    }

    pub fn arb_column_type() -> impl Strategy<Value = ColumnType> {
        prop::sample::select(ColumnType::ALL.to_vec())
    }

    /// A user column without default or foreign key.
    pub fn arb_user_column() -> impl Strategy<Value = ColumnSchema> {
        (arb_identifier(), arb_column_type(), any::<bool>(), any::<bool>()).prop_map(
            |(name, column_type, is_nullable, is_unique)| {
                let mut column = ColumnSchema::new(name, column_type);
                column.is_nullable = is_nullable;
                column.is_unique = is_unique;
                column
            },
        )
    }

    /// One to six user columns with distinct names.
    pub fn arb_user_columns() -> impl Strategy<Value = Vec<ColumnSchema>> {
        vec(arb_user_column(), 1..6).prop_map(|columns| {
            let mut seen = HashSet::new();
            columns
                .into_iter()
                .filter(|column| seen.insert(column.column_name.clone()))
                .collect()
        })
    }

    /// Default literals full of characters that break naive quoting.
    pub fn arb_tricky_literal() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z' $]{1,24}",
            "\\$[a-z_]{0,6}\\$[a-z' ]{0,10}",
            Just("it's $$ money $q$".to_string()),
            Just("$_$'$".to_string()),
        ]
        .prop_filter("blank", |literal| !literal.trim().is_empty())
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made inputs and state for service and router tests.

    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static TABLE_COUNTER: AtomicU64 = AtomicU64::new(0);

    /// Client for the database named by the `STRATA_DB_*` variables.
    pub fn test_db_client() -> ApiResult<DbClient> {
        DbClient::from_config(&DbConfig::from_env())
    }

    /// Client whose pool points at a closed port. Pools connect lazily, so
    /// this is only safe for paths that reject input before touching it.
    pub fn unreachable_db_client() -> ApiResult<DbClient> {
        let config = DbConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..Default::default()
        };
        DbClient::from_config(&config)
    }

    pub fn test_state(db: DbClient, notifier: Arc<dyn SchemaChangeNotifier>) -> AppState {
        AppState::new(db, EngineConfig::default(), notifier)
    }

    /// A table name unique within this process run.
    pub fn unique_table_name(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or_default();
        let n = TABLE_COUNTER.fetch_add(1, Ordering::Relaxed);
        format!("{}_{}_{}", prefix, nanos, n)
    }

    /// `title STRING NOT NULL, views INTEGER, slug STRING UNIQUE`.
    pub fn post_columns() -> Vec<ColumnSchema> {
        vec![
            ColumnSchema::new("title", ColumnType::String).not_null(),
            ColumnSchema::new("views", ColumnType::Integer),
            ColumnSchema::new("slug", ColumnType::String).unique(),
        ]
    }

    /// CSV body with `count` rows matching [`post_columns`].
    pub fn posts_csv(count: usize) -> Vec<u8> {
        let mut csv = String::from("title,views,slug\n");
        for i in 0..count {
            csv.push_str(&format!("Post {},{},post-{}\n", i, i * 10, i));
        }
        csv.into_bytes()
    }

    /// JSON array body from the given records.
    pub fn records_json(records: &[serde_json::Value]) -> Vec<u8> {
        serde_json::to_vec(records).unwrap_or_default()
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on API results.

    use super::*;

    /// Assert that a result failed with the given error code.
    #[track_caller]
    pub fn assert_error_code<T: std::fmt::Debug>(result: &ApiResult<T>, code: ErrorCode) {
        match result {
            Err(err) => assert_eq!(err.code, code, "unexpected error: {}", err.message),
            Ok(value) => panic!("Expected {:?}, got Ok: {:?}", code, value),
        }
    }

    #[track_caller]
    pub fn assert_forbidden<T: std::fmt::Debug>(result: &ApiResult<T>) {
        assert_error_code(result, ErrorCode::Forbidden);
    }

    /// Assert that a result failed with the given HTTP status.
    #[track_caller]
    pub fn assert_status<T: std::fmt::Debug>(result: &ApiResult<T>, status: u16) {
        match result {
            Err(err) => assert_eq!(err.status_code, status, "unexpected error: {}", err.message),
            Ok(value) => panic!("Expected status {}, got Ok: {:?}", status, value),
        }
    }
}

pub use assertions::*;
pub use fixtures::*;
pub use generators::*;
