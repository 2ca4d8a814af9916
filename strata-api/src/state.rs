//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use crate::config::EngineConfig;
use crate::db::DbClient;
use crate::notify::SchemaChangeNotifier;
use crate::services::{BulkUpsertService, CatalogService, ExportService, ImportService, SqlGateway};

/// Application-wide state shared across all routes.
///
/// Every service holds its own clone of the same pooled [`DbClient`].
#[derive(Clone)]
pub struct AppState {
    pub db: DbClient,
    pub catalog: Arc<CatalogService>,
    pub gateway: Arc<SqlGateway>,
    pub exporter: Arc<ExportService>,
    pub importer: Arc<ImportService>,
    pub bulk: Arc<BulkUpsertService>,
    pub notifier: Arc<dyn SchemaChangeNotifier>,
    pub engine_config: EngineConfig,
    pub start_time: Instant,
}

impl AppState {
    /// Wire every engine service onto one pool and one notifier.
    pub fn new(
        db: DbClient,
        engine_config: EngineConfig,
        notifier: Arc<dyn SchemaChangeNotifier>,
    ) -> Self {
        let policy = engine_config.policy();
        let sanitizer = engine_config.sanitizer();
        Self {
            catalog: Arc::new(CatalogService::new(db.clone(), policy.clone(), notifier.clone())),
            gateway: Arc::new(SqlGateway::new(
                db.clone(),
                sanitizer.clone(),
                engine_config.sql_timeout,
                notifier.clone(),
            )),
            exporter: Arc::new(ExportService::new(db.clone(), policy.clone())),
            importer: Arc::new(ImportService::new(
                db.clone(),
                policy.clone(),
                sanitizer,
                engine_config.max_upload_bytes,
                notifier.clone(),
            )),
            bulk: Arc::new(BulkUpsertService::new(
                db.clone(),
                policy,
                engine_config.max_upload_bytes,
                notifier.clone(),
            )),
            db,
            notifier,
            engine_config,
            start_time: Instant::now(),
        }
    }
}

crate::impl_from_ref!(DbClient, db);
crate::impl_from_ref!(Arc<CatalogService>, catalog);
crate::impl_from_ref!(Arc<SqlGateway>, gateway);
crate::impl_from_ref!(Arc<ExportService>, exporter);
crate::impl_from_ref!(Arc<ImportService>, importer);
crate::impl_from_ref!(Arc<BulkUpsertService>, bulk);
crate::impl_from_ref!(Instant, start_time);
