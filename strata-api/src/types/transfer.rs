//! Export, import and bulk upsert API types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// EXPORT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Sql,
    Json,
}

fn default_true() -> bool {
    true
}

/// Request to export a database snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    /// Tables to export. All visible tables when omitted.
    #[serde(default)]
    pub tables: Option<Vec<String>>,
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default = "default_true")]
    pub include_data: bool,
    #[serde(default)]
    pub include_functions: bool,
    #[serde(default)]
    pub include_sequences: bool,
    #[serde(default)]
    pub include_views: bool,
    /// Maximum rows exported per table
    #[serde(default)]
    pub row_limit: Option<u64>,
}

impl Default for ExportRequest {
    fn default() -> Self {
        Self {
            tables: None,
            format: ExportFormat::Sql,
            include_data: true,
            include_functions: false,
            include_sequences: false,
            include_views: false,
            row_limit: None,
        }
    }
}

/// A table whose rows were cut at the row limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TruncatedTable {
    pub table_name: String,
    pub exported_row_count: u64,
    pub total_row_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub format: ExportFormat,
    /// SQL script text, or a [`JsonExport`] document
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub data: Value,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated_tables: Option<Vec<TruncatedTable>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_limit: Option<u64>,
}

/// Column as written into an export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedColumn {
    pub column_name: String,
    /// Full type with modifiers, e.g. `character varying(64)`
    pub sql_type: String,
    /// Catalog type name used for literal formatting
    pub data_type: String,
    pub is_nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_default: Option<String>,
}

/// Named constraint or object with its catalog definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedDefinition {
    pub name: String,
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedPolicy {
    pub name: String,
    pub permissive: bool,
    pub command: String,
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub using: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with_check: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedSequence {
    pub name: String,
    pub data_type: String,
    pub start_value: String,
    pub minimum_value: String,
    pub maximum_value: String,
    pub increment: String,
    pub cycle: bool,
}

/// One table in a JSON export.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedTable {
    pub table_name: String,
    pub columns: Vec<ExportedColumn>,
    /// Primary key, unique and check constraints
    pub constraints: Vec<ExportedDefinition>,
    pub indexes: Vec<ExportedDefinition>,
    pub foreign_keys: Vec<ExportedDefinition>,
    pub rls_enabled: bool,
    pub policies: Vec<ExportedPolicy>,
    pub triggers: Vec<ExportedDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Map<String, Value>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exported_row_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_row_count: Option<u64>,
}

/// Top-level JSON export document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonExport {
    pub tables: Vec<ExportedTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub functions: Option<Vec<ExportedDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequences: Option<Vec<ExportedSequence>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub views: Option<Vec<ExportedDefinition>>,
}

// ============================================================================
// IMPORT / BULK UPSERT
// ============================================================================

/// Multipart form of `POST /database/import` (documentation only).
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ImportUpload {
    /// `.sql` or `.txt` script
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = Binary))]
    pub file: Vec<u8>,
    /// Truncate every visible table before running the script
    pub truncate: Option<bool>,
}

/// Multipart form of `POST /tables/{table}/bulk-upsert` (documentation only).
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct BulkUpsertUpload {
    /// `.csv` or `.json` records
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = Binary))]
    pub file: Vec<u8>,
    /// Column used as the ON CONFLICT target
    pub upsert_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub success: bool,
    /// Tables touched by `INSERT INTO` or `CREATE TABLE`, in first-seen order
    pub tables: Vec<String>,
    pub rows_imported: u64,
    pub file_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct BulkUpsertResponse {
    pub rows_affected: u64,
    pub total_records: usize,
}
