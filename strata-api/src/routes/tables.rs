//! Table Catalog REST API Routes
//!
//! Create, introspect, alter and drop tables, plus bulk record upload.
//! Handlers are thin: every rule lives in the catalog and bulk services.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    extractors::UploadForm,
    middleware::AuthExtractor,
    services::{BulkUpsertService, CatalogService},
    state::AppState,
    types::{
        BulkUpsertResponse, BulkUpsertUpload, CreateTableRequest, CreateTableResponse,
        DeleteTableResponse, ListTablesResponse, TableSchema, TableUpdate, UpdateTableResponse,
    },
};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /tables - List user tables
#[utoipa::path(
    get,
    path = "/tables",
    tag = "Tables",
    responses(
        (status = 200, description = "Names of all non-system tables", body = ListTablesResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn list_tables(
    State(catalog): State<Arc<CatalogService>>,
) -> ApiResult<Json<ListTablesResponse>> {
    let tables = catalog.list_tables().await?;
    Ok(Json(ListTablesResponse { tables }))
}

/// POST /tables - Create a table
#[utoipa::path(
    post,
    path = "/tables",
    tag = "Tables",
    request_body = CreateTableRequest,
    responses(
        (status = 201, description = "Table created", body = CreateTableResponse),
        (status = 400, description = "Invalid name, type or column set", body = ApiError),
        (status = 403, description = "System table name", body = ApiError),
        (status = 409, description = "Table already exists", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn create_table(
    State(catalog): State<Arc<CatalogService>>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<CreateTableRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.table_name.trim().is_empty() {
        return Err(ApiError::missing_field("tableName"));
    }
    tracing::info!(table = %req.table_name, subject = %auth.subject, "Create table requested");
    let created = catalog.create_table(req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /tables/{table}/schema - Introspect a table
#[utoipa::path(
    get,
    path = "/tables/{table}/schema",
    tag = "Tables",
    params(
        ("table" = String, Path, description = "Table name")
    ),
    responses(
        (status = 200, description = "Columns, keys and record count", body = TableSchema),
        (status = 403, description = "System table", body = ApiError),
        (status = 404, description = "Table not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn get_table_schema(
    State(catalog): State<Arc<CatalogService>>,
    Path(table): Path<String>,
) -> ApiResult<Json<TableSchema>> {
    let schema = catalog.get_table_schema(&table).await?;
    Ok(Json(schema))
}

/// PATCH /tables/{table} - Apply a compound schema change atomically
#[utoipa::path(
    patch,
    path = "/tables/{table}",
    tag = "Tables",
    params(
        ("table" = String, Path, description = "Table name")
    ),
    request_body = TableUpdate,
    responses(
        (status = 200, description = "Applied operations", body = UpdateTableResponse),
        (status = 400, description = "Invalid operation", body = ApiError),
        (status = 403, description = "System table, reserved or frozen column", body = ApiError),
        (status = 404, description = "Table or column not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn update_table_schema(
    State(catalog): State<Arc<CatalogService>>,
    AuthExtractor(auth): AuthExtractor,
    Path(table): Path<String>,
    Json(update): Json<TableUpdate>,
) -> ApiResult<Json<UpdateTableResponse>> {
    tracing::info!(table = %table, subject = %auth.subject, "Schema update requested");
    let applied = catalog.update_table_schema(&table, update).await?;
    Ok(Json(applied))
}

/// DELETE /tables/{table} - Drop a table
#[utoipa::path(
    delete,
    path = "/tables/{table}",
    tag = "Tables",
    params(
        ("table" = String, Path, description = "Table name")
    ),
    responses(
        (status = 200, description = "Table dropped", body = DeleteTableResponse),
        (status = 403, description = "System or protected table", body = ApiError),
        (status = 404, description = "Table not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn delete_table(
    State(catalog): State<Arc<CatalogService>>,
    AuthExtractor(auth): AuthExtractor,
    Path(table): Path<String>,
) -> ApiResult<Json<DeleteTableResponse>> {
    tracing::info!(table = %table, subject = %auth.subject, "Drop table requested");
    let deleted = catalog.delete_table(&table).await?;
    Ok(Json(deleted))
}

/// POST /tables/{table}/bulk-upsert - Insert or upsert uploaded records
#[utoipa::path(
    post,
    path = "/tables/{table}/bulk-upsert",
    tag = "Tables",
    params(
        ("table" = String, Path, description = "Table name")
    ),
    request_body(content = BulkUpsertUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Records written", body = BulkUpsertResponse),
        (status = 400, description = "Unreadable file or unknown upsert key", body = ApiError),
        (status = 403, description = "System table", body = ApiError),
        (status = 404, description = "Table not found", body = ApiError),
        (status = 413, description = "File too large", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn bulk_upsert(
    State(bulk): State<Arc<BulkUpsertService>>,
    Path(table): Path<String>,
    form: UploadForm,
) -> ApiResult<Json<BulkUpsertResponse>> {
    let response = bulk
        .bulk_upsert(&table, &form.bytes, &form.file_name, form.field("upsertKey"))
        .await?;
    Ok(Json(response))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tables).post(create_table))
        .route("/:table", axum::routing::patch(update_table_schema).delete(delete_table))
        .route("/:table/schema", get(get_table_schema))
        .route("/:table/bulk-upsert", post(bulk_upsert))
}
