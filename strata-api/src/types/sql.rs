//! Raw SQL API types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::db_helpers::FieldInfo;

/// Request to run caller-supplied SQL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RawSqlRequest {
    pub query: String,
    /// Positional parameters for `$1..$n`
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub params: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct RawSqlResponse {
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub rows: Vec<Map<String, Value>>,
    /// Rows returned, or rows affected for statements without a result set
    pub row_count: u64,
    pub fields: Vec<FieldInfo>,
}
