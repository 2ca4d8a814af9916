//! Column type model and table schema shapes.
//!
//! `ColumnType` is the abstract type vocabulary exposed to tenants. Each
//! variant maps 1:1 onto a PostgreSQL type and optionally a canonical
//! default expression.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// COLUMN TYPE
// ============================================================================

/// Abstract column type accepted by the schema API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Boolean,
    Uuid,
    DateTime,
    Date,
    Json,
}

/// Allow-listed function defaults. These are the only function calls the
/// default encoder will ever emit unquoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultFunction {
    RandomUuid,
    CurrentTimestamp,
    CurrentDate,
}

impl DefaultFunction {
    pub const ALL: [DefaultFunction; 3] = [
        DefaultFunction::RandomUuid,
        DefaultFunction::CurrentTimestamp,
        DefaultFunction::CurrentDate,
    ];

    /// SQL text of the function call.
    pub fn sql(&self) -> &'static str {
        match self {
            DefaultFunction::RandomUuid => "gen_random_uuid()",
            DefaultFunction::CurrentTimestamp => "CURRENT_TIMESTAMP",
            DefaultFunction::CurrentDate => "CURRENT_DATE",
        }
    }

    /// Recognize an allow-listed function from user or catalog text.
    ///
    /// Matching is case-insensitive and tolerant of the spellings PostgreSQL
    /// reports back from `information_schema.columns.column_default`.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "gen_random_uuid()" | "uuid_generate_v4()" => Some(DefaultFunction::RandomUuid),
            "current_timestamp" | "current_timestamp()" | "now()" => {
                Some(DefaultFunction::CurrentTimestamp)
            }
            "current_date" | "current_date()" => Some(DefaultFunction::CurrentDate),
            _ => None,
        }
    }
}

/// SQL rendering information for a column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMapping {
    pub sql_type: &'static str,
    pub canonical_default: Option<DefaultFunction>,
}

impl ColumnType {
    pub const ALL: [ColumnType; 8] = [
        ColumnType::String,
        ColumnType::Integer,
        ColumnType::Float,
        ColumnType::Boolean,
        ColumnType::Uuid,
        ColumnType::DateTime,
        ColumnType::Date,
        ColumnType::Json,
    ];

    /// Concrete SQL type and canonical default for this column type.
    pub fn mapping(&self) -> TypeMapping {
        match self {
            ColumnType::String => TypeMapping {
                sql_type: "TEXT",
                canonical_default: None,
            },
            ColumnType::Integer => TypeMapping {
                sql_type: "INTEGER",
                canonical_default: None,
            },
            ColumnType::Float => TypeMapping {
                sql_type: "DOUBLE PRECISION",
                canonical_default: None,
            },
            ColumnType::Boolean => TypeMapping {
                sql_type: "BOOLEAN",
                canonical_default: None,
            },
            ColumnType::Uuid => TypeMapping {
                sql_type: "UUID",
                canonical_default: Some(DefaultFunction::RandomUuid),
            },
            ColumnType::DateTime => TypeMapping {
                sql_type: "TIMESTAMPTZ",
                canonical_default: Some(DefaultFunction::CurrentTimestamp),
            },
            ColumnType::Date => TypeMapping {
                sql_type: "DATE",
                canonical_default: Some(DefaultFunction::CurrentDate),
            },
            ColumnType::Json => TypeMapping {
                sql_type: "JSONB",
                canonical_default: None,
            },
        }
    }

    pub fn sql_type(&self) -> &'static str {
        self.mapping().sql_type
    }

    /// Whether a given allow-listed function is a sensible default for this type.
    pub fn accepts_function(&self, function: DefaultFunction) -> bool {
        matches!(
            (self, function),
            (ColumnType::Uuid, DefaultFunction::RandomUuid)
                | (ColumnType::DateTime, DefaultFunction::CurrentTimestamp)
                | (ColumnType::Date, DefaultFunction::CurrentDate)
                | (ColumnType::Date, DefaultFunction::CurrentTimestamp)
        )
    }

    /// Map a catalog `data_type` (as reported by `information_schema.columns`)
    /// back to the abstract type. Returns `None` for types outside the model,
    /// e.g. tables created through raw SQL.
    pub fn from_catalog_type(data_type: &str) -> Option<Self> {
        match data_type.trim().to_ascii_lowercase().as_str() {
            "text" | "character varying" | "varchar" | "character" | "char" | "bpchar" => {
                Some(ColumnType::String)
            }
            "integer" | "int" | "int4" | "bigint" | "int8" | "smallint" | "int2" => {
                Some(ColumnType::Integer)
            }
            "double precision" | "float8" | "real" | "float4" | "numeric" | "decimal" => {
                Some(ColumnType::Float)
            }
            "boolean" | "bool" => Some(ColumnType::Boolean),
            "uuid" => Some(ColumnType::Uuid),
            "timestamp with time zone"
            | "timestamptz"
            | "timestamp without time zone"
            | "timestamp" => Some(ColumnType::DateTime),
            "date" => Some(ColumnType::Date),
            "jsonb" | "json" => Some(ColumnType::Json),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Uuid => "uuid",
            ColumnType::DateTime => "datetime",
            ColumnType::Date => "date",
            ColumnType::Json => "json",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(ColumnType::String),
            "integer" => Ok(ColumnType::Integer),
            "float" => Ok(ColumnType::Float),
            "boolean" => Ok(ColumnType::Boolean),
            "uuid" => Ok(ColumnType::Uuid),
            "datetime" => Ok(ColumnType::DateTime),
            "date" => Ok(ColumnType::Date),
            "json" => Ok(ColumnType::Json),
            _ => Err(format!("Invalid ColumnType: {}", s)),
        }
    }
}

// ============================================================================
// FOREIGN KEYS
// ============================================================================

/// Referential action for ON DELETE / ON UPDATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum ReferentialAction {
    #[default]
    #[serde(rename = "RESTRICT")]
    Restrict,
    #[serde(rename = "CASCADE")]
    Cascade,
    #[serde(rename = "SET NULL")]
    SetNull,
    #[serde(rename = "SET DEFAULT")]
    SetDefault,
    #[serde(rename = "NO ACTION")]
    NoAction,
}

impl ReferentialAction {
    pub fn sql(&self) -> &'static str {
        match self {
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }

    /// Parse the `delete_rule` / `update_rule` text from
    /// `information_schema.referential_constraints`.
    pub fn from_catalog(rule: &str) -> Self {
        match rule.trim().to_ascii_uppercase().as_str() {
            "CASCADE" => ReferentialAction::Cascade,
            "SET NULL" => ReferentialAction::SetNull,
            "SET DEFAULT" => ReferentialAction::SetDefault,
            "RESTRICT" => ReferentialAction::Restrict,
            _ => ReferentialAction::NoAction,
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql())
    }
}

/// Foreign key reference declared on a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeySchema {
    pub reference_table: String,
    pub reference_column: String,
    #[serde(default)]
    pub on_delete: ReferentialAction,
    #[serde(default)]
    pub on_update: ReferentialAction,
}

// ============================================================================
// COLUMN / TABLE SCHEMA
// ============================================================================

/// A column as declared by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ColumnSchema {
    pub column_name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default = "default_nullable")]
    pub is_nullable: bool,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeySchema>,
}

fn default_nullable() -> bool {
    true
}

impl ColumnSchema {
    pub fn new(column_name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            column_name: column_name.into(),
            column_type,
            is_nullable: true,
            is_unique: false,
            default_value: None,
            foreign_key: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    pub fn references(mut self, foreign_key: ForeignKeySchema) -> Self {
        self.foreign_key = Some(foreign_key);
        self
    }
}

/// A column as it was created, with its resolved SQL type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ResolvedColumn {
    #[serde(flatten)]
    pub column: ColumnSchema,
    pub sql_type: String,
}

/// A column as introspected from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub column_name: String,
    /// Abstract type, when the SQL type is part of the column model
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub column_type: Option<ColumnType>,
    pub sql_type: String,
    pub is_nullable: bool,
    pub is_unique: bool,
    pub is_primary_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeySchema>,
}

/// Read-only introspection view of a table. Recomputed on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
    pub record_count: i64,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.column_name == name)
    }
}
