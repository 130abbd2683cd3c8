//! Persistence contract
//!
//! The engine never talks to a database driver directly. Everything it needs
//! from storage goes through [`Persistence`]: single-row reads keyed by
//! primary key and scope, single-statement writes, and two scans used by
//! search and dependency checks. Connection handling, timeouts and
//! cancellation belong to the implementor.

mod errors;
mod memory;

use serde_json::{Map, Value};

pub use errors::{PersistenceError, PersistenceResult};
pub use memory::{MemoryStore, TableSpec};

/// A storage row: column name to value.
pub type Row = Map<String, Value>;

/// Column holding the tenant / instance partition key.
pub const SCOPE_COLUMN: &str = "instance_id";

/// Storage operations used by resources.
///
/// Implementations must be safe to share between threads; each call is
/// expected to be a single statement.
pub trait Persistence: Send + Sync {
    /// Fetches the row where `key_column = key_value` within `scope_id`.
    fn fetch_row(
        &self,
        table: &str,
        key_column: &str,
        key_value: i64,
        scope_id: i64,
    ) -> PersistenceResult<Option<Row>>;

    /// Inserts `payload`, returning the generated identifier.
    fn insert(&self, table: &str, payload: &Row) -> PersistenceResult<i64>;

    /// Updates the row where `key_column = key_value` with `payload`.
    fn update(
        &self,
        table: &str,
        payload: &Row,
        key_column: &str,
        key_value: i64,
    ) -> PersistenceResult<()>;

    /// Deletes the row where `key_column = key_value` within `scope_id`.
    fn delete(
        &self,
        table: &str,
        key_column: &str,
        key_value: i64,
        scope_id: i64,
    ) -> PersistenceResult<()>;

    /// Inserts `payload`, or updates the row it collides with on a key.
    /// Returns the identifier of the written row.
    fn upsert(&self, table: &str, payload: &Row) -> PersistenceResult<i64>;

    /// Every row of `table` within `scope_id`.
    fn fetch_rows(&self, table: &str, scope_id: i64) -> PersistenceResult<Vec<Row>>;

    /// `key_column` of every row within `scope_id`, ascending by `order_by`
    /// (by key when `None`).
    fn fetch_keys(
        &self,
        table: &str,
        key_column: &str,
        scope_id: i64,
        order_by: Option<&str>,
    ) -> PersistenceResult<Vec<i64>>;
}
