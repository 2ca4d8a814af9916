//! Database-wide REST API Routes
//!
//! Raw SQL, export, import and the catalog metadata snapshot.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    extractors::UploadForm,
    middleware::AuthExtractor,
    services::{CatalogService, ExportService, ImportService, SqlGateway},
    state::AppState,
    types::{
        DatabaseMetadata, ExportRequest, ExportResponse, ImportResponse, ImportUpload,
        RawSqlRequest, RawSqlResponse,
    },
};

/// POST /database/rawsql - Execute caller-supplied SQL
#[utoipa::path(
    post,
    path = "/database/rawsql",
    tag = "Database",
    request_body = RawSqlRequest,
    responses(
        (status = 200, description = "Rows, row count and field types", body = RawSqlResponse),
        (status = 400, description = "Query failed", body = ApiError),
        (status = 403, description = "Query touches a system table or is blocked", body = ApiError),
        (status = 504, description = "Query exceeded the execution timeout", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn execute_raw_sql(
    State(gateway): State<Arc<SqlGateway>>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<RawSqlRequest>,
) -> ApiResult<Json<RawSqlResponse>> {
    tracing::debug!(subject = %auth.subject, params = req.params.len(), "Raw SQL requested");
    let response = gateway.execute_raw_sql(req).await?;
    Ok(Json(response))
}

/// POST /database/export - Snapshot schema and data
#[utoipa::path(
    post,
    path = "/database/export",
    tag = "Database",
    request_body = ExportRequest,
    responses(
        (status = 200, description = "SQL script or JSON snapshot", body = ExportResponse),
        (status = 400, description = "Invalid table list or row limit", body = ApiError),
        (status = 403, description = "System table requested", body = ApiError),
        (status = 404, description = "Table not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn export_database(
    State(exporter): State<Arc<ExportService>>,
    Json(req): Json<ExportRequest>,
) -> ApiResult<Json<ExportResponse>> {
    let response = exporter.export_database(req).await?;
    Ok(Json(response))
}

/// POST /database/import - Run an uploaded SQL script in one transaction
#[utoipa::path(
    post,
    path = "/database/import",
    tag = "Database",
    request_body(content = ImportUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Import committed", body = ImportResponse),
        (status = 400, description = "Unreadable file or failing statement", body = ApiError),
        (status = 403, description = "Script touches a system table", body = ApiError),
        (status = 413, description = "File too large", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn import_database(
    State(importer): State<Arc<ImportService>>,
    AuthExtractor(auth): AuthExtractor,
    form: UploadForm,
) -> ApiResult<Json<ImportResponse>> {
    let truncate = form.flag("truncate")?;
    tracing::info!(
        subject = %auth.subject,
        file = %form.file_name,
        bytes = form.bytes.len(),
        truncate,
        "Import requested"
    );
    let response = importer
        .import_database(&form.bytes, &form.file_name, truncate)
        .await?;
    Ok(Json(response))
}

/// GET /database/metadata - Every user table with its schema and record count
#[utoipa::path(
    get,
    path = "/database/metadata",
    tag = "Database",
    responses(
        (status = 200, description = "Catalog snapshot", body = DatabaseMetadata),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn database_metadata(
    State(catalog): State<Arc<CatalogService>>,
) -> ApiResult<Json<DatabaseMetadata>> {
    let metadata = catalog.describe_database().await?;
    Ok(Json(metadata))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/rawsql", post(execute_raw_sql))
        .route("/export", post(export_database))
        .route("/import", post(import_database))
        .route("/metadata", get(database_metadata))
}
