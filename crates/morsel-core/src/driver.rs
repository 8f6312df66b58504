mod capability;
pub use capability::Capability;

use crate::{
    async_trait,
    schema::{Column, ForeignKey, TableRef},
    Record, Result, Value,
};

use std::fmt::Debug;

/// A database driver: a factory for connections plus a description of the
/// dialect's capabilities.
///
/// Two connections exist per run: the source (read-only) and the target
/// (write). Per-dialect quirks — random ordering SQL, sequence advance,
/// identifier quoting, enum-array casting — live entirely behind this
/// boundary; the engine never branches on dialect.
#[async_trait]
pub trait Driver: Debug + Send + Sync + 'static {
    /// Describes the driver's capability, which informs the engine's planning.
    fn capability(&self) -> &'static Capability;

    /// Creates a new connection to the database.
    async fn connect(&self) -> Result<Box<dyn Connection>>;
}

#[async_trait]
pub trait Connection: Debug + Send {
    /// Lists the tables of the given schema, or of the driver's default
    /// schema when `None`.
    async fn list_tables(&mut self, schema: Option<&str>) -> Result<Vec<TableRef>>;

    /// Returns the table's columns, in definition order, with type tags.
    async fn columns(&mut self, table: &TableRef) -> Result<Vec<Column>>;

    /// Returns the table's primary-key column names in key order. Empty when
    /// the table has no primary key.
    async fn primary_key(&mut self, table: &TableRef) -> Result<Vec<String>>;

    /// Returns the table's outgoing foreign keys. Incoming edges are derived
    /// by the schema model.
    async fn foreign_keys(&mut self, table: &TableRef) -> Result<Vec<ForeignKey>>;

    /// Counts the table's rows.
    async fn row_count(&mut self, table: &TableRef) -> Result<u64>;

    /// Returns `(min, max)` of a numeric key column, or `None` when the table
    /// is empty. Feeds the selector's key-range sampling.
    async fn numeric_key_range(
        &mut self,
        table: &TableRef,
        column: &str,
    ) -> Result<Option<(i64, i64)>>;

    /// Fetches up to `limit` rows in the database's random order.
    async fn sample(
        &mut self,
        table: &TableRef,
        columns: &[Column],
        limit: usize,
    ) -> Result<Vec<Record>>;

    /// Fetches a page of rows in a stable order. Used for full-table copies
    /// and as the selector's deterministic fallback.
    async fn scan(
        &mut self,
        table: &TableRef,
        columns: &[Column],
        order_by: &[String],
        limit: usize,
        offset: u64,
    ) -> Result<Vec<Record>>;

    /// Fetches rows whose `filter_columns` tuple equals `filter`, up to
    /// `limit` when given. Used for child expansion and parent resolution.
    async fn fetch_matching(
        &mut self,
        table: &TableRef,
        columns: &[Column],
        filter_columns: &[String],
        filter: &[Value],
        limit: Option<usize>,
    ) -> Result<Vec<Record>>;

    /// Fetches the single row whose key tuple equals `key`, or `None`.
    async fn fetch_by_key(
        &mut self,
        table: &TableRef,
        columns: &[Column],
        key_columns: &[String],
        key: &[Value],
    ) -> Result<Option<Record>> {
        let mut rows = self
            .fetch_matching(table, columns, key_columns, key, Some(1))
            .await?;
        Ok(rows.pop())
    }

    /// Bulk-inserts the rows, preserving column order and NULLs. Returns the
    /// number of rows inserted.
    async fn insert(
        &mut self,
        table: &TableRef,
        columns: &[Column],
        rows: &[Record],
    ) -> Result<u64>;

    /// Returns `MAX(column)` as an integer, or `None` when the table is
    /// empty. Used when finalizing sequences.
    async fn max_key(&mut self, table: &TableRef, column: &str) -> Result<Option<i64>>;

    /// Advances the sequence backing an auto-generated column so its next
    /// value is at least `minimum`. Only called when the driver's capability
    /// reports sequence support.
    async fn advance_sequence(
        &mut self,
        table: &TableRef,
        column: &Column,
        minimum: i64,
    ) -> Result<()>;
}
