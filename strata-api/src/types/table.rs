//! Table catalog API types

use serde::{Deserialize, Serialize};
use strata_core::{ColumnSchema, ResolvedColumn, TableSchema};

/// Request to create a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CreateTableRequest {
    pub table_name: String,
    /// User columns. Reserved columns may be listed with their reserved type.
    pub columns: Vec<ColumnSchema>,
    #[serde(default)]
    pub rls_enabled: bool,
}

/// Created table with its final column list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CreateTableResponse {
    pub table_name: String,
    /// Reserved columns followed by user columns, with resolved SQL types
    pub columns: Vec<ResolvedColumn>,
    pub rls_enabled: bool,
}

/// Names of the visible tables in the working schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ListTablesResponse {
    pub tables: Vec<String>,
}

/// Operations applied by a schema update, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UpdateTableResponse {
    /// Table name after the update (differs from the path on rename)
    pub table_name: String,
    pub operations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DeleteTableResponse {
    pub table_name: String,
    pub deleted: bool,
}

/// Every visible table with its introspected schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DatabaseMetadata {
    pub schema: String,
    pub tables: Vec<TableSchema>,
    pub total_tables: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strata_core::ColumnType;

    #[test]
    fn test_create_request_defaults_rls_off() -> Result<(), serde_json::Error> {
        let req: CreateTableRequest = serde_json::from_value(json!({
            "tableName": "posts",
            "columns": [{"columnName": "title", "type": "string", "isNullable": false}]
        }))?;
        assert!(!req.rls_enabled);
        assert_eq!(req.columns[0].column_type, ColumnType::String);
        assert!(!req.columns[0].is_nullable);
        Ok(())
    }

    #[test]
    fn test_update_response_is_camel_case() -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(UpdateTableResponse {
            table_name: "posts".to_string(),
            operations: vec!["Dropped column 'x'".to_string()],
        })?;
        assert_eq!(value["tableName"], "posts");
        Ok(())
    }
}
