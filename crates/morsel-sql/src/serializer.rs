mod delim;
use delim::comma;

mod flavor;
pub use flavor::Flavor;

mod ident;
use ident::Ident;

use morsel_core::schema::{Column, TableRef, TypeTag};

use std::fmt::Write;

/// How a SELECT orders its result.
#[derive(Debug, Clone, Copy)]
pub enum Order<'a> {
    /// No ORDER BY clause.
    Unordered,
    /// The dialect's random-order expression, e.g. `random()`.
    Random(&'static str),
    /// Ascending by the named columns.
    Columns(&'a [String]),
}

/// Renders the fixed set of statements the drivers need.
///
/// PostgreSQL enumerated, array-of-enumerated, numeric, and json columns are
/// selected through a text cast and bound back with a cast to the column's
/// own type, so values round-trip without the driver knowing every user type.
#[derive(Debug)]
pub struct Serializer {
    flavor: Flavor,
}

impl Serializer {
    pub fn sqlite() -> Self {
        Self {
            flavor: Flavor::Sqlite,
        }
    }

    pub fn postgresql() -> Self {
        Self {
            flavor: Flavor::PostgreSql,
        }
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// `SELECT <columns> FROM <table> [WHERE ...] [ORDER BY ...] [LIMIT ...]`
    ///
    /// Filters are equality tests against sequential placeholders starting
    /// at 1, one per filter column.
    pub fn select(
        &self,
        table: &TableRef,
        columns: &[Column],
        filter: &[&Column],
        order: Order<'_>,
        limit: Option<usize>,
        offset: Option<u64>,
    ) -> String {
        let mut dst = String::new();
        dst.push_str("SELECT ");
        comma(&mut dst, columns, |dst, column| {
            self.push_select_column(dst, column);
        });
        dst.push_str(" FROM ");
        self.push_table(&mut dst, table);

        if !filter.is_empty() {
            dst.push_str(" WHERE ");
            for (i, column) in filter.iter().enumerate() {
                if i > 0 {
                    dst.push_str(" AND ");
                }
                Ident(&column.name).push(&mut dst);
                dst.push_str(" = ");
                self.push_param(&mut dst, i + 1, column);
            }
        }

        match order {
            Order::Unordered => {}
            Order::Random(expr) => {
                dst.push_str(" ORDER BY ");
                dst.push_str(expr);
            }
            Order::Columns(names) => {
                dst.push_str(" ORDER BY ");
                comma(&mut dst, names, |dst, name| Ident(name).push(dst));
            }
        }

        if let Some(limit) = limit {
            write!(dst, " LIMIT {limit}").unwrap();
        }
        if let Some(offset) = offset {
            write!(dst, " OFFSET {offset}").unwrap();
        }

        dst
    }

    /// `INSERT INTO <table> (<columns>) VALUES (...), (...)`
    ///
    /// Placeholders number sequentially across all rows.
    pub fn insert(&self, table: &TableRef, columns: &[Column], row_count: usize) -> String {
        let mut dst = String::new();
        dst.push_str("INSERT INTO ");
        self.push_table(&mut dst, table);
        dst.push_str(" (");
        comma(&mut dst, columns, |dst, column| {
            Ident(&column.name).push(dst);
        });
        dst.push_str(") VALUES ");

        let width = columns.len();
        for row in 0..row_count {
            if row > 0 {
                dst.push_str(", ");
            }
            dst.push('(');
            for (i, column) in columns.iter().enumerate() {
                if i > 0 {
                    dst.push_str(", ");
                }
                self.push_param(&mut dst, row * width + i + 1, column);
            }
            dst.push(')');
        }

        dst
    }

    /// `SELECT COUNT(*) FROM <table>`
    pub fn count(&self, table: &TableRef) -> String {
        let mut dst = String::from("SELECT COUNT(*) FROM ");
        self.push_table(&mut dst, table);
        dst
    }

    /// `SELECT MIN(<column>), MAX(<column>) FROM <table>`
    ///
    /// The aggregates come back as 64-bit integers whatever the column's
    /// declared width.
    pub fn min_max(&self, table: &TableRef, column: &str) -> String {
        let mut dst = String::from("SELECT MIN(");
        Ident(column).push(&mut dst);
        dst.push(')');
        self.push_int8_cast(&mut dst);
        dst.push_str(", MAX(");
        Ident(column).push(&mut dst);
        dst.push(')');
        self.push_int8_cast(&mut dst);
        dst.push_str(" FROM ");
        self.push_table(&mut dst, table);
        dst
    }

    /// `SELECT MAX(<column>) FROM <table>`
    pub fn max(&self, table: &TableRef, column: &str) -> String {
        let mut dst = String::from("SELECT MAX(");
        Ident(column).push(&mut dst);
        dst.push(')');
        self.push_int8_cast(&mut dst);
        dst.push_str(" FROM ");
        self.push_table(&mut dst, table);
        dst
    }

    fn push_int8_cast(&self, dst: &mut String) {
        if self.flavor == Flavor::PostgreSql {
            dst.push_str("::int8");
        }
    }

    fn push_table(&self, dst: &mut String, table: &TableRef) {
        if let Some(schema) = &table.schema {
            Ident(schema).push(dst);
            dst.push('.');
        }
        Ident(&table.name).push(dst);
    }

    fn push_select_column(&self, dst: &mut String, column: &Column) {
        Ident(&column.name).push(dst);
        if self.flavor == Flavor::PostgreSql {
            match cast_kind(column) {
                CastKind::None => {}
                CastKind::Text => dst.push_str("::text"),
                CastKind::TextArray => dst.push_str("::text[]"),
            }
        }
    }

    fn push_param(&self, dst: &mut String, index: usize, column: &Column) {
        self.flavor.placeholder(dst, index);
        if self.flavor == Flavor::PostgreSql {
            // The chain through text first pins the placeholder's own type to
            // text; a direct cast would type the placeholder as the target
            // type, which text bindings cannot satisfy.
            match cast_kind(column) {
                CastKind::None => {}
                CastKind::Text => {
                    dst.push_str("::text::");
                    Ident(&column.udt).push(dst);
                }
                CastKind::TextArray => {
                    // Array type names carry a leading underscore in the
                    // catalog; the cast needs the element type.
                    let element = column.udt.strip_prefix('_').unwrap_or(&column.udt);
                    dst.push_str("::text[]::");
                    Ident(element).push(dst);
                    dst.push_str("[]");
                }
            }
        }
    }
}

enum CastKind {
    None,
    /// Select as text, bind back with a cast to the column's own type.
    Text,
    /// Select as text[], bind back with a cast to the element's array type.
    TextArray,
}

fn cast_kind(column: &Column) -> CastKind {
    match column.type_tag {
        TypeTag::Enumerated => CastKind::Text,
        TypeTag::EnumeratedArray => CastKind::TextArray,
        TypeTag::Numeric if column.udt == "numeric" => CastKind::Text,
        TypeTag::Other if column.udt == "json" || column.udt == "jsonb" => CastKind::Text,
        _ => CastKind::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, type_tag: TypeTag, udt: &str) -> Column {
        Column {
            name: name.to_string(),
            type_tag,
            udt: udt.to_string(),
            nullable: true,
            auto_generated: false,
        }
    }

    #[test]
    fn select_random_sqlite() {
        let table = TableRef::bare("city");
        let columns = vec![
            column("name", TypeTag::Text, "TEXT"),
            column("state_abbrev", TypeTag::Text, "TEXT"),
        ];
        let sql = Serializer::sqlite().select(
            &table,
            &columns,
            &[],
            Order::Random("random()"),
            Some(3),
            None,
        );
        assert_eq!(
            sql,
            r#"SELECT "name", "state_abbrev" FROM "city" ORDER BY random() LIMIT 3"#
        );
    }

    #[test]
    fn select_filtered_postgresql() {
        let table = TableRef::new(Some("sales"), "orders");
        let columns = vec![column("id", TypeTag::Numeric, "int8")];
        let customer = column("customer_id", TypeTag::Numeric, "int8");
        let sql = Serializer::postgresql().select(
            &table,
            &columns,
            &[&customer],
            Order::Unordered,
            Some(3),
            None,
        );
        assert_eq!(
            sql,
            r#"SELECT "id" FROM "sales"."orders" WHERE "customer_id" = $1 LIMIT 3"#
        );
    }

    #[test]
    fn select_casts_enum_columns() {
        let table = TableRef::bare("profiles");
        let columns = vec![
            column("mood", TypeTag::Enumerated, "mood"),
            column("moods", TypeTag::EnumeratedArray, "_mood"),
        ];
        let sql =
            Serializer::postgresql().select(&table, &columns, &[], Order::Unordered, None, None);
        assert_eq!(
            sql,
            r#"SELECT "mood"::text, "moods"::text[] FROM "profiles""#
        );
    }

    #[test]
    fn insert_multi_row_placeholders() {
        let table = TableRef::bare("state");
        let columns = vec![
            column("abbrev", TypeTag::Text, "TEXT"),
            column("name", TypeTag::Text, "TEXT"),
        ];
        let sql = Serializer::sqlite().insert(&table, &columns, 2);
        assert_eq!(
            sql,
            r#"INSERT INTO "state" ("abbrev", "name") VALUES (?1, ?2), (?3, ?4)"#
        );
    }

    #[test]
    fn insert_casts_enum_params() {
        let table = TableRef::bare("profiles");
        let columns = vec![
            column("mood", TypeTag::Enumerated, "mood"),
            column("moods", TypeTag::EnumeratedArray, "_mood"),
        ];
        let sql = Serializer::postgresql().insert(&table, &columns, 1);
        assert_eq!(
            sql,
            r#"INSERT INTO "profiles" ("mood", "moods") VALUES ($1::text::"mood", $2::text[]::"mood"[])"#
        );
    }

    #[test]
    fn insert_casts_numeric_and_json() {
        let table = TableRef::bare("ledger");
        let columns = vec![
            column("amount", TypeTag::Numeric, "numeric"),
            column("meta", TypeTag::Other, "jsonb"),
        ];
        let sql = Serializer::postgresql().insert(&table, &columns, 1);
        assert_eq!(
            sql,
            r#"INSERT INTO "ledger" ("amount", "meta") VALUES ($1::text::"numeric", $2::text::"jsonb")"#
        );
    }

    #[test]
    fn scan_orders_by_key() {
        let table = TableRef::bare("node");
        let columns = vec![column("id", TypeTag::Numeric, "INTEGER")];
        let order = ["id".to_string()];
        let sql = Serializer::sqlite().select(
            &table,
            &columns,
            &[],
            Order::Columns(&order),
            Some(100),
            Some(200),
        );
        assert_eq!(
            sql,
            r#"SELECT "id" FROM "node" ORDER BY "id" LIMIT 100 OFFSET 200"#
        );
    }

    #[test]
    fn quotes_embedded_quotes() {
        let table = TableRef::bare(r#"odd"name"#);
        let sql = Serializer::sqlite().count(&table);
        assert_eq!(sql, r#"SELECT COUNT(*) FROM "odd""name""#);
    }
}
