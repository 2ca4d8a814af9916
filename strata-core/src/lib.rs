//! Strata Core - Schema Engine Logic
//!
//! I/O-free building blocks for the Strata schema and SQL execution engine:
//! the column-type model, identifier validation, the system-schema policy,
//! default-value encoding, typed DDL and its PostgreSQL renderer, the raw SQL
//! sanitizer and statement splitter, export literals, and upload parsing.
//!
//! Nothing in this crate touches a database. The API crate snapshots the
//! catalog, asks this crate for a plan, and executes what comes back.

pub mod column;
pub mod ddl;
pub mod default_value;
pub mod error;
pub mod identifier;
pub mod literal;
pub mod plan;
pub mod policy;
pub mod records;
pub mod sanitizer;
pub mod splitter;

pub use column::{
    ColumnInfo, ColumnSchema, ColumnType, DefaultFunction, ForeignKeySchema, ReferentialAction,
    ResolvedColumn, TableSchema, TypeMapping,
};
pub use ddl::{DdlStatement, PgRenderer, UPDATED_AT_FUNCTION};
pub use default_value::{format_default, parse_stored_default};
pub use error::{EngineError, EngineResult};
pub use identifier::{
    quote_ident, quote_qualified, validate_identifier, validate_new_identifier, IdentifierKind,
    MAX_IDENTIFIER_LEN,
};
pub use literal::{quote_literal, sql_literal};
pub use plan::{
    plan_create_table, plan_table_update, ColumnUpdate, CreateTablePlan, ForeignKeyAddition,
    SnapshotColumn, SnapshotForeignKey, TableSnapshot, TableUpdate,
};
pub use policy::{PolicyRule, SystemSchemaPolicy, DEFAULT_SYSTEM_PREFIX, RESERVED_COLUMNS};
pub use records::{build_inserts, parse_records, InsertStatement, RecordBatch, UploadFormat};
pub use sanitizer::{is_ddl, SqlSanitizer};
pub use splitter::{leading_keyword, split_statements, strip_comments};
