//! API Request and Response Types
//!
//! Request and response bodies for the Strata REST endpoints. Column and
//! schema shapes live in `strata-core` and are re-used here unchanged.

// Table catalog types
mod table;
pub use table::*;

// Raw SQL types
mod sql;
pub use sql::*;

// Export / import / bulk upsert types
mod transfer;
pub use transfer::*;

pub use strata_core::{
    ColumnInfo, ColumnSchema, ColumnType, ColumnUpdate, ForeignKeyAddition, ForeignKeySchema,
    ReferentialAction, ResolvedColumn, TableSchema, TableUpdate,
};
