//! Storage seam. `PgStore` runs against PostgreSQL; `MemoryStore` keeps rows in process and
//! enforces the same key, unique, enum, length and foreign-key rules. Both run values through
//! [`coerce`] before storing or binding them.

pub mod coerce;
mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{ensure_database_exists, PgStore};

use crate::config::ResolvedTable;
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// One stored row, keyed by column name.
pub type Row = Map<String, Value>;

#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Rows matching every filter (exact match), ordered by primary key.
    async fn list(
        &self,
        table: &ResolvedTable,
        filters: &[(String, Value)],
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Row>, AppError>;

    /// Rows whose `column` is one of `values`, ordered by primary key.
    async fn fetch_where_in(&self, table: &ResolvedTable, column: &str, values: &[Value]) -> Result<Vec<Row>, AppError>;

    /// Insert one row; columns with a default may be omitted. Returns the stored row.
    async fn insert(&self, table: &ResolvedTable, row: &Row) -> Result<Row, AppError>;

    /// Delete rows matching every filter. Returns the deleted rows; empty filters delete nothing.
    async fn delete_where(&self, table: &ResolvedTable, filters: &[(String, Value)]) -> Result<Vec<Row>, AppError>;

    /// Cheap liveness check for the readiness endpoint.
    async fn ping(&self) -> Result<(), AppError>;
}
