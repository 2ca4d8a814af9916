//! Health Endpoints
//!
//! `/health/ping` and `/health/live` never touch the database.
//! `/health/ready` acquires a pooled connection and checks that the working
//! schema is usable: the schema exists and the `updated_at` trigger function
//! that new tables depend on is installed. A missing trigger function makes
//! the engine degraded, not unready.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use strata_core::UPDATED_AT_FUNCTION;

use crate::db::DbClient;
use crate::error::ApiResult;
use crate::state::AppState;

const SCHEMA_PROBE_SQL: &str = "SELECT \
     EXISTS (SELECT 1 FROM pg_namespace WHERE nspname = $1), \
     EXISTS (SELECT 1 FROM pg_proc p JOIN pg_namespace n ON n.oid = p.pronamespace \
             WHERE n.nspname = $1 AND p.proname = $2)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct HealthDetails {
    pub database: ComponentHealth,
    pub schema: String,
    pub pool_size: u64,
    pub pool_available: u64,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Result of probing one dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What the schema probe found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SchemaProbe {
    schema_exists: bool,
    trigger_function_installed: bool,
}

impl SchemaProbe {
    fn status(&self) -> (HealthStatus, Option<String>) {
        match (self.schema_exists, self.trigger_function_installed) {
            (false, _) => (
                HealthStatus::Unhealthy,
                Some("Working schema does not exist".to_string()),
            ),
            (true, false) => (
                HealthStatus::Degraded,
                Some(format!("Trigger function '{}' is not installed", UPDATED_AT_FUNCTION)),
            ),
            (true, true) => (HealthStatus::Healthy, None),
        }
    }
}

async fn probe_schema(db: &DbClient) -> ApiResult<SchemaProbe> {
    let conn = db.get_conn().await?;
    let row = conn
        .query_one(SCHEMA_PROBE_SQL, &[&db.schema(), &UPDATED_AT_FUNCTION])
        .await?;
    Ok(SchemaProbe {
        schema_exists: row.get(0),
        trigger_function_installed: row.get(1),
    })
}

fn http_status(status: HealthStatus) -> StatusCode {
    match status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    }
}

/// GET /health/ping
#[utoipa::path(
    get,
    path = "/health/ping",
    tag = "Health",
    responses((status = 200, description = "Plain-text pong", body = String)),
)]
pub async fn ping() -> impl IntoResponse {
    "pong"
}

/// GET /health/live
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses((status = 200, description = "Process is running", body = HealthResponse)),
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        message: None,
        details: None,
    })
}

/// GET /health/ready
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Ready, possibly degraded", body = HealthResponse),
        (status = 503, description = "Database unreachable or schema missing", body = HealthResponse),
    ),
)]
pub async fn readiness(
    State(db): State<DbClient>,
    State(start_time): State<Instant>,
) -> impl IntoResponse {
    let started = Instant::now();
    let (database, message) = match probe_schema(&db).await {
        Ok(probe) => {
            let (status, message) = probe.status();
            let component = ComponentHealth {
                status,
                latency_ms: Some(started.elapsed().as_millis() as u64),
                error: None,
            };
            (component, message)
        }
        Err(e) => {
            tracing::warn!(error = %e.message, "Readiness probe failed");
            let component = ComponentHealth {
                status: HealthStatus::Unhealthy,
                latency_ms: None,
                error: Some(e.message),
            };
            (component, Some("Database unreachable".to_string()))
        }
    };

    let status = database.status;
    let pool = db.pool_status();
    let response = HealthResponse {
        status,
        message,
        details: Some(HealthDetails {
            database,
            schema: db.schema().to_string(),
            pool_size: pool.size as u64,
            pool_available: pool.available as u64,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: start_time.elapsed().as_secs(),
        }),
    };
    (http_status(status), Json(response))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConfig;

    #[test]
    fn test_missing_schema_is_unhealthy() {
        let probe = SchemaProbe {
            schema_exists: false,
            trigger_function_installed: false,
        };
        let (status, message) = probe.status();
        assert_eq!(status, HealthStatus::Unhealthy);
        assert_eq!(http_status(status), StatusCode::SERVICE_UNAVAILABLE);
        assert!(message.is_some());
    }

    #[test]
    fn test_missing_trigger_function_is_degraded_but_ready() {
        let probe = SchemaProbe {
            schema_exists: true,
            trigger_function_installed: false,
        };
        let (status, message) = probe.status();
        assert_eq!(status, HealthStatus::Degraded);
        assert_eq!(http_status(status), StatusCode::OK);
        assert!(message.is_some_and(|m| m.contains(UPDATED_AT_FUNCTION)));
    }

    #[test]
    fn test_details_serialize_camel_case() -> Result<(), serde_json::Error> {
        let details = HealthDetails {
            database: ComponentHealth {
                status: HealthStatus::Healthy,
                latency_ms: Some(2),
                error: None,
            },
            schema: "public".to_string(),
            pool_size: 4,
            pool_available: 3,
            version: "0.1.0".to_string(),
            uptime_seconds: 12,
        };
        let value = serde_json::to_value(details)?;
        assert_eq!(value["poolAvailable"], 3);
        assert_eq!(value["database"]["latencyMs"], 2);
        assert!(value["database"].get("error").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_readiness_without_database_is_unavailable() {
        let config = DbConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            timeout: std::time::Duration::from_millis(200),
            ..Default::default()
        };
        let db = DbClient::from_config(&config).expect("db client");
        let response = readiness(State(db), State(Instant::now())).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
