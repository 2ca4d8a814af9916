//! Service Layer
//!
//! Engine operations behind the REST handlers. Services validate through
//! `strata-core` first and only then take a pooled connection.

mod bulk;
mod catalog;
mod export;
mod gateway;
mod import;

pub use bulk::BulkUpsertService;
pub use catalog::CatalogService;
pub use export::{render_sql, ExportService};
pub use gateway::SqlGateway;
pub use import::{is_importable_file, target_table, ImportService};
