//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling using deadpool-postgres. The pool is built
//! once by the composition root and a cloned [`DbClient`] handle is passed
//! into every service. Connections are acquired per unit of work and
//! returned to the pool when the guard drops, on every exit path.

use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use std::time::Duration;
use strata_core::EngineError;
use tokio_postgres::error::SqlState;
use tokio_postgres::NoTls;

use crate::error::{ApiError, ApiResult};

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Working schema that holds tenant tables
    pub schema: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "strata".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            schema: "public".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("STRATA_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("STRATA_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("STRATA_DB_NAME").unwrap_or_else(|_| "strata".to_string()),
            user: std::env::var("STRATA_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("STRATA_DB_PASSWORD").unwrap_or_default(),
            schema: std::env::var("STRATA_DB_SCHEMA").unwrap_or_else(|_| "public".to_string()),
            max_size: std::env::var("STRATA_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("STRATA_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    ///
    /// No connection is opened here; the first `get()` connects.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.connect_timeout = Some(self.timeout);

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(deadpool_postgres::PoolConfig::new(self.max_size));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// DATABASE CLIENT WRAPPER
// ============================================================================

/// Pooled database handle shared by the engine services.
#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
    schema: String,
}

impl DbClient {
    /// Create a new database client with the given pool.
    pub fn new(pool: Pool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    /// Create a new database client from configuration.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool, config.schema.clone()))
    }

    /// Working schema for tenant tables.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Current pool occupancy.
    pub fn pool_status(&self) -> deadpool_postgres::Status {
        self.pool.status()
    }

    /// Get a connection from the pool.
    pub async fn get_conn(&self) -> ApiResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(ApiError::from)
    }

    /// Verify that a connection can be acquired and used.
    pub async fn health_check(&self) -> ApiResult<()> {
        let conn = self.get_conn().await?;
        conn.query_one("SELECT 1", &[]).await?;
        Ok(())
    }

    /// Close the pool. Outstanding connections are dropped as they return.
    pub fn close(&self) {
        self.pool.close();
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

/// Map a database error to the engine taxonomy, keeping the server message.
///
/// Used where the message is meaningful to the caller (DDL, raw SQL,
/// imports). Plain `?` on a `tokio_postgres::Error` goes through
/// `From<tokio_postgres::Error> for ApiError` instead and stays generic.
pub fn map_db_error(err: &tokio_postgres::Error) -> EngineError {
    match err.as_db_error() {
        Some(db) => {
            tracing::warn!(
                sqlstate = db.code().code(),
                message = db.message(),
                "Statement rejected by database"
            );
            let code = db.code();
            if *code == SqlState::DUPLICATE_TABLE {
                let table = db.table().map(str::to_string).unwrap_or_else(|| {
                    db.message()
                        .split('"')
                        .nth(1)
                        .unwrap_or_default()
                        .to_string()
                });
                return EngineError::DuplicateTable { table };
            }
            if *code == SqlState::UNDEFINED_TABLE {
                let name = db
                    .message()
                    .split('"')
                    .nth(1)
                    .unwrap_or_default()
                    .to_string();
                return EngineError::table_not_found(name);
            }
            let message = match db.detail() {
                Some(detail) => format!("{} ({})", db.message(), detail),
                None => db.message().to_string(),
            };
            EngineError::SqlExecution {
                message,
                sqlstate: Some(code.code().to_string()),
            }
        }
        None => {
            tracing::error!("Database error: {:?}", err);
            EngineError::sql(err.to_string())
        }
    }
}
