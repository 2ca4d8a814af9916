//! REST API Routes Module
//!
//! - Table catalog routes under /tables (admin auth)
//! - Database-wide routes under /database (admin auth)
//! - Health checks at /health/* (public)
//! - Metrics at /metrics and the OpenAPI document at /openapi.json (public)

pub mod database;
pub mod health;
pub mod tables;

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::auth::AuthConfig;
use crate::config::ApiConfig;
use crate::middleware::{admin_auth_middleware, AuthMiddlewareState};
use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

/// Multipart framing allowance on top of the upload limit.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Handler for /openapi.json endpoint.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-api-key"),
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(origins = ?config.cors_origins, "CORS: restricting origins");
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        if config.cors_allow_credentials {
            cors.allow_origin(origins).allow_credentials(true)
        } else {
            cors.allow_origin(origins)
        }
    }
}

/// Create the complete API router.
///
/// # Middleware Order (outer to inner)
/// 1. CORS - handles preflight requests
/// 2. TraceLayer and observability - spans and metrics for every request
/// 3. Body limit - uploads above the configured size are refused early
/// 4. Admin auth (engine routes only)
pub fn create_api_router(
    state: AppState,
    api_config: &ApiConfig,
    auth_config: AuthConfig,
) -> Router {
    let auth_state = AuthMiddlewareState::new(auth_config);
    let body_limit = state.engine_config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    let engine_routes = Router::new()
        .nest("/tables", tables::create_router())
        .nest("/database", database::create_router())
        .layer(from_fn_with_state(auth_state, admin_auth_middleware));

    #[allow(unused_mut)]
    let mut router = Router::new()
        .merge(engine_routes)
        .nest("/health", health::create_router())
        .route("/metrics", get(metrics_handler))
        .route("/openapi.json", get(openapi_json));

    #[cfg(feature = "swagger-ui")]
    {
        use utoipa_swagger_ui::SwaggerUi;
        router = router.merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()));
    }

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(api_config))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::db::{DbClient, DbConfig};
    use crate::notify::NoopNotifier;
    use axum::{body::Body, http::Request, http::StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn router() -> Router {
        let db_config = DbConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..Default::default()
        };
        let db = DbClient::from_config(&db_config).expect("db client");
        let state = AppState::new(db, EngineConfig::default(), Arc::new(NoopNotifier));
        let mut auth = AuthConfig::default();
        auth.add_api_key("router-key".to_string());
        create_api_router(state, &ApiConfig::default(), auth)
    }

    #[tokio::test]
    async fn test_engine_routes_require_auth() {
        let response = router()
            .oneshot(Request::get("/tables").body(Body::empty()).expect("request"))
            .await
            .expect("infallible");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let response = router()
            .oneshot(Request::get("/health/ping").body(Body::empty()).expect("request"))
            .await
            .expect("infallible");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_openapi_is_public() {
        let response = router()
            .oneshot(Request::get("/openapi.json").body(Body::empty()).expect("request"))
            .await
            .expect("infallible");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_forbidden_raw_sql_is_rejected_with_key() {
        let request = Request::post("/database/rawsql")
            .header("x-api-key", "router-key")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"query":"SELECT * FROM _secrets"}"#))
            .expect("request");
        let response = router().oneshot(request).await.expect("infallible");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
