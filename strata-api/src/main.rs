//! Strata API Server Entry Point
//!
//! Bootstraps configuration, builds the pool and the engine services, and
//! starts the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use strata_api::telemetry::{init_tracing, TelemetryConfig};
use strata_api::{
    create_api_router, ApiConfig, ApiError, ApiResult, AppState, AuthConfig, DbClient, DbConfig,
    EngineConfig, PgNotifyNotifier, SchemaChangeNotifier,
};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let auth_config = AuthConfig::from_env();
    auth_config.validate_for_production()?;

    let db_config = DbConfig::from_env();
    let db = DbClient::from_config(&db_config)?;
    let engine_config = EngineConfig::from_env();

    let notifier: Arc<dyn SchemaChangeNotifier> = Arc::new(PgNotifyNotifier::new(
        db.clone(),
        engine_config.reload_channel.clone(),
    ));
    let state = AppState::new(db.clone(), engine_config, notifier);
    state.catalog.bootstrap().await?;

    let app = create_api_router(state, &ApiConfig::from_env(), auth_config);

    let addr = resolve_bind_addr()?;
    tracing::info!(
        %addr,
        service = %telemetry_config.service_name,
        version = %telemetry_config.service_version,
        environment = %telemetry_config.environment,
        schema = %db.schema(),
        "Starting Strata API server"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    db.close();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("STRATA_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("STRATA_API_PORT").ok())
        .unwrap_or_else(|| "3000".to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
