//! Strata API - Schema & SQL Execution Engine over REST
//!
//! Axum service exposing table definition, catalog introspection, raw SQL
//! execution, database export/import and bulk upsert against a pooled
//! PostgreSQL connection. Engine rules (identifier validation, the
//! system-schema policy, DDL rendering, SQL sanitizing) come from
//! `strata-core`; this crate adds I/O, HTTP, auth and telemetry.

pub mod auth;
pub mod config;
pub mod db;
pub mod db_helpers;
pub mod error;
pub mod extractors;
mod macros;
pub mod middleware;
pub mod notify;
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use auth::{
    authorize_admin, generate_jwt_token, validate_api_key, validate_jwt_token, AuthConfig,
    AuthContext, AuthMethod, Claims,
};
pub use config::{ApiConfig, EngineConfig};
pub use db::{map_db_error, DbClient, DbConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{admin_auth_middleware, AuthMiddlewareState};
pub use notify::{ChangeReason, NoopNotifier, PgNotifyNotifier, SchemaChange, SchemaChangeNotifier};
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use services::{BulkUpsertService, CatalogService, ExportService, ImportService, SqlGateway};
pub use state::AppState;
pub use types::*;
