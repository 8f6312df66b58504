mod value;
pub(crate) use value::Value;

use rusqlite::Connection as RusqliteConnection;
use std::path::{Path, PathBuf};

use morsel_core::{
    async_trait,
    driver::{Capability, Driver},
    schema::{Column, ForeignKey, TableRef, TypeTag},
    Record, Result, Value as CoreValue,
};
use morsel_sql::{Order, Serializer};
use url::Url;

#[derive(Debug)]
pub enum Sqlite {
    File(PathBuf),
    InMemory,
}

impl Sqlite {
    /// Create a new SQLite driver with an arbitrary connection URL
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url_str = url.into();
        let url = Url::parse(&url_str).map_err(morsel_core::Error::driver_operation_failed)?;

        if url.scheme() != "sqlite" {
            return Err(morsel_core::Error::invalid_connection_url(format!(
                "connection URL does not have a `sqlite` scheme; url={}",
                url_str
            )));
        }

        if url.path() == ":memory:" {
            Ok(Self::InMemory)
        } else {
            Ok(Self::File(PathBuf::from(url.path())))
        }
    }

    /// Create an in-memory SQLite database
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    /// Open a SQLite database at the specified file path
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }
}

#[async_trait]
impl Driver for Sqlite {
    fn capability(&self) -> &'static Capability {
        &Capability::SQLITE
    }

    async fn connect(&self) -> Result<Box<dyn morsel_core::Connection>> {
        let connection = match self {
            Sqlite::File(path) => Connection::open(path)?,
            Sqlite::InMemory => Connection::in_memory()?,
        };
        Ok(Box::new(connection))
    }
}

#[derive(Debug)]
pub struct Connection {
    connection: RusqliteConnection,
    serializer: Serializer,
}

impl Connection {
    pub fn in_memory() -> Result<Self> {
        let connection = RusqliteConnection::open_in_memory()
            .map_err(morsel_core::Error::driver_operation_failed)?;
        Ok(Self {
            connection,
            serializer: Serializer::sqlite(),
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let connection =
            RusqliteConnection::open(path).map_err(morsel_core::Error::driver_operation_failed)?;
        Ok(Self {
            connection,
            serializer: Serializer::sqlite(),
        })
    }

    fn query_records(
        &mut self,
        sql: &str,
        params: &[Value],
        columns: &[Column],
    ) -> Result<Vec<Record>> {
        let mut stmt = self
            .connection
            .prepare_cached(sql)
            .map_err(morsel_core::Error::driver_operation_failed)?;

        let mut rows = stmt
            .query(rusqlite::params_from_iter(params.iter()))
            .map_err(morsel_core::Error::driver_operation_failed)?;

        let mut ret = vec![];
        loop {
            match rows.next() {
                Ok(Some(row)) => {
                    let mut record = Record::with_capacity(columns.len());
                    for (index, column) in columns.iter().enumerate() {
                        let raw = row
                            .get_ref(index)
                            .map_err(morsel_core::Error::driver_operation_failed)?;
                        record.insert(&column.name, Value::from_sql(raw, column));
                    }
                    ret.push(record);
                }
                Ok(None) => break,
                Err(err) => {
                    return Err(morsel_core::Error::driver_operation_failed(err));
                }
            }
        }

        Ok(ret)
    }

    fn query_i64(&mut self, sql: &str) -> Result<Option<i64>> {
        self.connection
            .query_row(sql, [], |row| row.get::<_, Option<i64>>(0))
            .map_err(morsel_core::Error::driver_operation_failed)
    }

    /// Looks the filter columns up in the table's column list so the values
    /// bind with the right semantics.
    fn filter_columns<'a>(
        columns: &'a [Column],
        names: &[String],
    ) -> Result<Vec<&'a Column>> {
        names
            .iter()
            .map(|name| {
                columns
                    .iter()
                    .find(|column| &column.name == name)
                    .ok_or_else(|| {
                        morsel_core::Error::from_args(format_args!(
                            "unknown filter column `{name}`"
                        ))
                    })
            })
            .collect()
    }
}

fn type_tag(declared: &str) -> TypeTag {
    let upper = declared.to_ascii_uppercase();
    if upper.contains("INT") {
        TypeTag::Numeric
    } else if upper.contains("BOOL") {
        TypeTag::Boolean
    } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        TypeTag::Text
    } else if upper.contains("DATE") || upper.contains("TIME") {
        TypeTag::Temporal
    } else if upper.contains("REAL")
        || upper.contains("FLOA")
        || upper.contains("DOUB")
        || upper.contains("NUMERIC")
        || upper.contains("DECIMAL")
    {
        TypeTag::Numeric
    } else if upper.is_empty() || upper.contains("BLOB") {
        TypeTag::Binary
    } else {
        TypeTag::Other
    }
}

/// Raw row of `PRAGMA table_info`.
struct TableInfoRow {
    name: String,
    declared: String,
    notnull: bool,
    pk: i64,
}

impl Connection {
    fn table_info(&mut self, table: &TableRef) -> Result<Vec<TableInfoRow>> {
        let sql = format!("PRAGMA table_info({})", quote(&table.name));
        let mut stmt = self
            .connection
            .prepare(&sql)
            .map_err(morsel_core::Error::driver_operation_failed)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(TableInfoRow {
                    name: row.get("name")?,
                    declared: row.get("type")?,
                    notnull: row.get::<_, i64>("notnull")? != 0,
                    pk: row.get("pk")?,
                })
            })
            .map_err(morsel_core::Error::driver_operation_failed)?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(morsel_core::Error::driver_operation_failed)
    }

    fn primary_key_sync(&mut self, table: &TableRef) -> Result<Vec<String>> {
        let mut keyed: Vec<_> = self
            .table_info(table)?
            .into_iter()
            .filter(|info| info.pk > 0)
            .map(|info| (info.pk, info.name))
            .collect();
        keyed.sort_by_key(|(position, _)| *position);
        Ok(keyed.into_iter().map(|(_, name)| name).collect())
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[async_trait]
impl morsel_core::Connection for Connection {
    async fn list_tables(&mut self, schema: Option<&str>) -> Result<Vec<TableRef>> {
        if let Some(schema) = schema {
            return Err(morsel_core::Error::unsupported_feature(format!(
                "sqlite databases have no schemas; requested `{schema}`"
            )));
        }

        let mut stmt = self
            .connection
            .prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
                 ORDER BY name",
            )
            .map_err(morsel_core::Error::driver_operation_failed)?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(morsel_core::Error::driver_operation_failed)?;

        let names = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(morsel_core::Error::driver_operation_failed)?;

        Ok(names.into_iter().map(TableRef::bare).collect())
    }

    async fn columns(&mut self, table: &TableRef) -> Result<Vec<Column>> {
        let info = self.table_info(table)?;
        let single_pk = info.iter().filter(|c| c.pk > 0).count() == 1;

        Ok(info
            .into_iter()
            .map(|info| {
                // `INTEGER PRIMARY KEY` aliases the rowid, which the database
                // generates when the insert omits it.
                let auto_generated =
                    single_pk && info.pk == 1 && info.declared.eq_ignore_ascii_case("INTEGER");
                Column {
                    type_tag: type_tag(&info.declared),
                    udt: info.declared,
                    nullable: !info.notnull,
                    auto_generated,
                    name: info.name,
                }
            })
            .collect())
    }

    async fn primary_key(&mut self, table: &TableRef) -> Result<Vec<String>> {
        self.primary_key_sync(table)
    }

    async fn foreign_keys(&mut self, table: &TableRef) -> Result<Vec<ForeignKey>> {
        struct FkRow {
            id: i64,
            referred_table: String,
            from: String,
            to: Option<String>,
        }

        let sql = format!("PRAGMA foreign_key_list({})", quote(&table.name));
        let mut stmt = self
            .connection
            .prepare(&sql)
            .map_err(morsel_core::Error::driver_operation_failed)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(FkRow {
                    id: row.get("id")?,
                    referred_table: row.get("table")?,
                    from: row.get("from")?,
                    to: row.get("to")?,
                })
            })
            .map_err(morsel_core::Error::driver_operation_failed)?;

        let rows = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(morsel_core::Error::driver_operation_failed)?;
        drop(stmt);

        // Rows come back one per column pair, grouped by constraint id and
        // ordered by seq within each group.
        let mut edges: Vec<ForeignKey> = vec![];
        let mut last_id = None;
        for row in rows {
            if last_id != Some(row.id) {
                last_id = Some(row.id);
                edges.push(ForeignKey {
                    name: None,
                    table: table.clone(),
                    columns: vec![],
                    referred_table: TableRef::bare(&row.referred_table),
                    referred_columns: vec![],
                    logical: false,
                });
            }
            let edge = edges.last_mut().unwrap();
            edge.columns.push(row.from);
            if let Some(to) = row.to {
                edge.referred_columns.push(to);
            }
        }

        // A missing `to` column means the constraint references the parent's
        // primary key.
        for edge in &mut edges {
            if edge.referred_columns.len() != edge.columns.len() {
                let referred = edge.referred_table.clone();
                edge.referred_columns = self.primary_key_sync(&referred)?;
            }
        }

        Ok(edges)
    }

    async fn row_count(&mut self, table: &TableRef) -> Result<u64> {
        let sql = self.serializer.count(table);
        Ok(self.query_i64(&sql)?.unwrap_or(0) as u64)
    }

    async fn numeric_key_range(
        &mut self,
        table: &TableRef,
        column: &str,
    ) -> Result<Option<(i64, i64)>> {
        let sql = self.serializer.min_max(table, column);
        let range = self
            .connection
            .query_row(&sql, [], |row| {
                Ok((
                    row.get::<_, Option<i64>>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                ))
            })
            .map_err(morsel_core::Error::driver_operation_failed)?;

        Ok(match range {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        })
    }

    async fn sample(
        &mut self,
        table: &TableRef,
        columns: &[Column],
        limit: usize,
    ) -> Result<Vec<Record>> {
        let sql = self.serializer.select(
            table,
            columns,
            &[],
            Order::Random(Capability::SQLITE.random_order_sql),
            Some(limit),
            None,
        );
        self.query_records(&sql, &[], columns)
    }

    async fn scan(
        &mut self,
        table: &TableRef,
        columns: &[Column],
        order_by: &[String],
        limit: usize,
        offset: u64,
    ) -> Result<Vec<Record>> {
        let order = if order_by.is_empty() {
            Order::Unordered
        } else {
            Order::Columns(order_by)
        };
        let sql = self
            .serializer
            .select(table, columns, &[], order, Some(limit), Some(offset));
        self.query_records(&sql, &[], columns)
    }

    async fn fetch_matching(
        &mut self,
        table: &TableRef,
        columns: &[Column],
        filter_columns: &[String],
        filter: &[CoreValue],
        limit: Option<usize>,
    ) -> Result<Vec<Record>> {
        let filter_meta = Self::filter_columns(columns, filter_columns)?;
        let sql = self
            .serializer
            .select(table, columns, &filter_meta, Order::Unordered, limit, None);
        let params: Vec<Value> = filter.iter().cloned().map(Value::from).collect();
        self.query_records(&sql, &params, columns)
    }

    async fn insert(
        &mut self,
        table: &TableRef,
        columns: &[Column],
        rows: &[Record],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let sql = self.serializer.insert(table, columns, rows.len());
        let params: Vec<Value> = rows
            .iter()
            .flat_map(|row| {
                columns.iter().map(|column| {
                    Value::from(row.get(&column.name).cloned().unwrap_or(CoreValue::Null))
                })
            })
            .collect();

        let mut stmt = self
            .connection
            .prepare_cached(&sql)
            .map_err(morsel_core::Error::driver_operation_failed)?;

        let count = stmt
            .execute(rusqlite::params_from_iter(params.iter()))
            .map_err(morsel_core::Error::driver_operation_failed)?;

        Ok(count as u64)
    }

    async fn max_key(&mut self, table: &TableRef, column: &str) -> Result<Option<i64>> {
        let sql = self.serializer.max(table, column);
        self.query_i64(&sql)
    }

    async fn advance_sequence(
        &mut self,
        _table: &TableRef,
        _column: &Column,
        _minimum: i64,
    ) -> Result<()> {
        // SQLite derives the next rowid from MAX(rowid); explicit-id inserts
        // into AUTOINCREMENT tables update sqlite_sequence on their own.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_memory_url() {
        assert!(matches!(
            Sqlite::new("sqlite::memory:").unwrap(),
            Sqlite::InMemory
        ));
    }

    #[test]
    fn parses_file_url() {
        match Sqlite::new("sqlite:/tmp/source.db").unwrap() {
            Sqlite::File(path) => assert_eq!(path, PathBuf::from("/tmp/source.db")),
            Sqlite::InMemory => panic!("expected a file database"),
        }
    }

    #[test]
    fn rejects_foreign_scheme() {
        let err = Sqlite::new("postgresql://localhost/db").unwrap_err();
        assert!(err.is_invalid_connection_url());
    }

    #[test]
    fn declared_type_tags() {
        assert_eq!(type_tag("INTEGER"), TypeTag::Numeric);
        assert_eq!(type_tag("VARCHAR(40)"), TypeTag::Text);
        assert_eq!(type_tag("BOOLEAN"), TypeTag::Boolean);
        assert_eq!(type_tag("DATETIME"), TypeTag::Temporal);
        assert_eq!(type_tag("BLOB"), TypeTag::Binary);
        assert_eq!(type_tag(""), TypeTag::Binary);
        assert_eq!(type_tag("GEOMETRY"), TypeTag::Other);
    }
}
