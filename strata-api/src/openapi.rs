//! OpenAPI Specification for the Strata API
//!
//! Generated with utoipa from the route annotations and the request and
//! response types.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::db_helpers::FieldInfo;
use crate::error::{ApiError, ErrorCode};
use crate::routes::health::{ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::{database, health, tables};
use crate::telemetry::metrics;
use crate::types::*;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Strata API",
        version = "0.1.0",
        description = "Schema definition, introspection, raw SQL execution and data import/export for a managed PostgreSQL database",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Tables", description = "Create, introspect, alter and drop tables; bulk record upload"),
        (name = "Database", description = "Raw SQL, export, import and catalog metadata"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        // === Table Routes ===
        tables::list_tables,
        tables::create_table,
        tables::get_table_schema,
        tables::update_table_schema,
        tables::delete_table,
        tables::bulk_upsert,

        // === Database Routes ===
        database::execute_raw_sql,
        database::export_database,
        database::import_database,
        database::database_metadata,

        // === Health and Metrics ===
        health::ping,
        health::liveness,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(
        schemas(
            // === Error Types ===
            ApiError, ErrorCode,

            // === Catalog Types ===
            ColumnType, ReferentialAction, ForeignKeySchema, ColumnSchema, ResolvedColumn,
            ColumnInfo, TableSchema, ColumnUpdate, ForeignKeyAddition, TableUpdate,
            CreateTableRequest, CreateTableResponse, ListTablesResponse,
            UpdateTableResponse, DeleteTableResponse, DatabaseMetadata,

            // === Raw SQL Types ===
            RawSqlRequest, RawSqlResponse, FieldInfo,

            // === Transfer Types ===
            ExportFormat, ExportRequest, ExportResponse, TruncatedTable,
            ImportUpload, ImportResponse, BulkUpsertUpload, BulkUpsertResponse,

            // === Health Types ===
            HealthResponse, HealthStatus, HealthDetails, ComponentHealth
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security scheme modifier for OpenAPI document.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT carrying the admin role claim"))
                        .build(),
                ),
            );
        }
    }
}

impl ApiDoc {
    /// Generate the OpenAPI document as a JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() -> Result<(), String> {
        let openapi = ApiDoc::openapi();
        assert_eq!(openapi.info.title, "Strata API");

        let tags = openapi
            .tags
            .as_ref()
            .ok_or_else(|| "OpenAPI tags missing".to_string())?;
        assert_eq!(tags.len(), 4);

        let components = openapi
            .components
            .as_ref()
            .ok_or_else(|| "OpenAPI components missing".to_string())?;
        assert!(components.security_schemes.contains_key("api_key"));
        assert!(components.security_schemes.contains_key("bearer_auth"));
        Ok(())
    }

    #[test]
    fn test_openapi_paths_exist() {
        let openapi = ApiDoc::openapi();
        for path in [
            "/tables",
            "/tables/{table}",
            "/tables/{table}/schema",
            "/tables/{table}/bulk-upsert",
            "/database/rawsql",
            "/database/export",
            "/database/import",
            "/database/metadata",
            "/health/ready",
            "/metrics",
        ] {
            assert!(openapi.paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn test_openapi_json_serialization() -> Result<(), String> {
        let json = ApiDoc::to_json().map_err(|e| format!("Failed to serialize OpenAPI: {}", e))?;
        serde_json::from_str::<serde_json::Value>(&json)
            .map_err(|e| format!("Generated JSON invalid: {}", e))?;
        assert!(json.contains("\"bearer_auth\""));
        Ok(())
    }
}
