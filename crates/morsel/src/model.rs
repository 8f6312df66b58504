use crate::config::Options;

use morsel_core::{
    schema::{Column, ForeignKey, TableRef, TypeTag},
    Connection, Error, Result,
};

use regex::Regex;
use std::collections::HashMap;

/// Index of a table within the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(pub(crate) usize);

/// How a table participates in the copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Counts toward a target and receives primary selection.
    Selected,

    /// Visible only because a foreign key refers to it; inserted into solely
    /// to keep referential closure.
    ClosureOnly,

    /// Deselected by an exclude pattern. Never inserted into; rows that
    /// reference it are unreferentiable.
    Excluded,
}

/// A table in the schema model, with everything the engine derives for it.
#[derive(Debug)]
pub struct Table {
    pub id: TableId,
    pub table: TableRef,
    pub columns: Vec<Column>,
    pub primary_key: Vec<String>,
    pub source_rows: u64,
    pub target_rows: u64,
    pub prioritized: bool,
    pub selection: Selection,

    /// Outgoing edges: this table's rows reference these parents.
    pub foreign_keys: Vec<ForeignKey>,

    /// Incoming edges: rows of these tables reference this one.
    pub child_keys: Vec<ForeignKey>,
}

impl Table {
    /// The single numeric primary-key column, when the table has exactly one.
    /// Enables the selector's key-range sampling.
    pub fn numeric_single_key(&self) -> Option<&str> {
        match self.primary_key.as_slice() {
            [only] => self
                .column(only)
                .filter(|column| column.type_tag == TypeTag::Numeric)
                .map(|column| column.name.as_str()),
            _ => None,
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// How close the table is to its target. Lower scores are picked first
    /// by the coordinator; a zero target scores infinite and is never picked.
    pub fn completeness(&self, copied: u64) -> f64 {
        if self.target_rows == 0 {
            return f64::INFINITY;
        }
        // Incomplete prioritized tables clamp the numerator so they always
        // compare below a non-prioritized table that has met its target.
        let copied = if self.prioritized && copied < self.target_rows {
            copied.min(self.target_rows - 1)
        } else {
            copied
        };
        copied as f64 / self.target_rows as f64
    }
}

/// The immutable schema model a run operates against.
#[derive(Debug)]
pub struct Model {
    tables: Vec<Table>,
    by_ref: HashMap<TableRef, TableId>,
    flush_order: Vec<TableId>,
}

impl Model {
    /// Introspects the source database and derives the run's table set,
    /// merged logical constraints, target sizes, and flush order.
    pub async fn load(conn: &mut dyn Connection, options: &Options) -> Result<Model> {
        let includes = Pattern::compile_all(&options.tables)?;
        let excludes = Pattern::compile_all(&options.exclude_tables)?;

        let mut builder = Builder::default();

        let mut requested: Vec<Option<String>> = vec![None];
        requested.extend(options.schemas.iter().cloned().map(Some));

        for schema in &requested {
            for table_ref in conn.list_tables(schema.as_deref()).await? {
                if builder.by_ref.contains_key(&table_ref) {
                    continue;
                }
                let selection = select(&table_ref, &includes, &excludes);
                builder.introspect(conn, table_ref, selection).await?;
            }
        }

        for pattern in includes.iter().chain(excludes.iter()) {
            if !builder.tables.iter().any(|t| pattern.matches(&t.table)) {
                return Err(Error::configuration(format!(
                    "table pattern `{}` matches no table",
                    pattern.raw
                )));
            }
        }

        builder.merge_constraints(&options.constraints)?;
        builder.discover_closure(conn).await?;
        builder.normalize_edges()?;
        builder.validate_logical_edges()?;
        builder.apply_full_tables(&options.full_tables)?;
        builder.validate_forced_rows(options)?;

        for table in &mut builder.tables {
            table.target_rows = match table.selection {
                Selection::Selected if table.prioritized => table.source_rows,
                Selection::Selected => {
                    target_size(table.source_rows, options.fraction, options.logarithmic)
                }
                Selection::ClosureOnly | Selection::Excluded => 0,
            };
        }

        builder.derive_child_edges();
        let flush_order = flush_order(&builder.tables, &builder.by_ref);

        Ok(Model {
            tables: builder.tables,
            by_ref: builder.by_ref,
            flush_order,
        })
    }

    pub fn table(&self, id: TableId) -> &Table {
        &self.tables[id.0]
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn resolve(&self, table: &TableRef) -> Option<TableId> {
        self.by_ref.get(table).copied()
    }

    /// Resolves a reference exactly, falling back to a unique name match for
    /// bare references (so `orders` finds `public.orders`).
    pub fn resolve_named(&self, table: &TableRef) -> Result<Option<TableId>> {
        if let Some(&id) = self.by_ref.get(table) {
            return Ok(Some(id));
        }
        if table.schema.is_some() {
            return Ok(None);
        }
        let mut candidates = self.tables.iter().filter(|t| t.table.name == table.name);
        let first = candidates.next();
        if candidates.next().is_some() {
            return Err(Error::configuration(format!(
                "table name `{}` is ambiguous across schemas; qualify it",
                table.name
            )));
        }
        Ok(first.map(|t| t.id))
    }

    /// Parents-first table order for buffer flushing.
    pub fn flush_order(&self) -> &[TableId] {
        &self.flush_order
    }

    /// Checks that the target database carries every table and column the
    /// run will insert into.
    pub async fn verify_target(&self, conn: &mut dyn Connection) -> Result<()> {
        for table in &self.tables {
            if table.selection == Selection::Excluded {
                continue;
            }
            let columns = conn.columns(&table.table).await?;
            if columns.is_empty() {
                return Err(Error::schema_mismatch(format!(
                    "table `{}` does not exist in the target database",
                    table.table
                )));
            }
            for column in &table.columns {
                if !columns.iter().any(|c| c.name == column.name) {
                    return Err(Error::schema_mismatch(format!(
                        "column `{}.{}` does not exist in the target database",
                        table.table, column.name
                    )));
                }
            }
        }
        Ok(())
    }
}

fn select(table: &TableRef, includes: &[Pattern], excludes: &[Pattern]) -> Selection {
    if excludes.iter().any(|p| p.matches(table)) {
        return Selection::Excluded;
    }
    if !includes.is_empty() && !includes.iter().any(|p| p.matches(table)) {
        return Selection::ClosureOnly;
    }
    Selection::Selected
}

/// Target size for a table of `n` source rows.
fn target_size(n: u64, fraction: f64, logarithmic: bool) -> u64 {
    if n == 0 {
        return 0;
    }
    if logarithmic {
        10f64.powf((n as f64).log10() * fraction).floor() as u64
    } else {
        (((n as f64) * fraction).floor() as u64).max(1)
    }
}

struct Pattern {
    raw: String,
    qualified: bool,
    regex: Regex,
}

impl Pattern {
    fn compile_all(raws: &[String]) -> Result<Vec<Pattern>> {
        raws.iter().map(|raw| Pattern::compile(raw)).collect()
    }

    fn compile(raw: &str) -> Result<Pattern> {
        let mut expr = String::from("^");
        let mut first = true;
        for literal in raw.split('*') {
            if !first {
                expr.push_str(".*");
            }
            first = false;
            expr.push_str(&regex::escape(literal));
        }
        expr.push('$');

        let regex = Regex::new(&expr)
            .map_err(|err| Error::configuration(format!("bad table pattern `{raw}`: {err}")))?;
        Ok(Pattern {
            raw: raw.to_string(),
            qualified: raw.contains('.'),
            regex,
        })
    }

    fn matches(&self, table: &TableRef) -> bool {
        if self.qualified {
            self.regex.is_match(&table.to_string())
        } else {
            self.regex.is_match(&table.name)
        }
    }
}

#[derive(Default)]
struct Builder {
    tables: Vec<Table>,
    by_ref: HashMap<TableRef, TableId>,
}

impl Builder {
    async fn introspect(
        &mut self,
        conn: &mut dyn Connection,
        table_ref: TableRef,
        selection: Selection,
    ) -> Result<TableId> {
        let id = TableId(self.tables.len());
        let columns = conn.columns(&table_ref).await?;
        let primary_key = conn.primary_key(&table_ref).await?;
        let foreign_keys = conn.foreign_keys(&table_ref).await?;
        let source_rows = if selection == Selection::Selected {
            conn.row_count(&table_ref).await?
        } else {
            0
        };

        self.by_ref.insert(table_ref.clone(), id);
        self.tables.push(Table {
            id,
            table: table_ref,
            columns,
            primary_key,
            source_rows,
            target_rows: 0,
            prioritized: false,
            selection,
            foreign_keys,
            child_keys: vec![],
        });
        Ok(id)
    }

    /// Resolves a reference exactly, falling back to a unique name match for
    /// bare references.
    fn resolve_flexible(&self, table: &TableRef) -> Result<Option<TableId>> {
        if let Some(&id) = self.by_ref.get(table) {
            return Ok(Some(id));
        }
        if table.schema.is_some() {
            return Ok(None);
        }
        let mut candidates = self.tables.iter().filter(|t| t.table.name == table.name);
        let first = candidates.next();
        if candidates.next().is_some() {
            return Err(Error::configuration(format!(
                "table name `{}` is ambiguous across schemas; qualify it",
                table.name
            )));
        }
        Ok(first.map(|t| t.id))
    }

    fn merge_constraints(&mut self, constraints: &[ForeignKey]) -> Result<()> {
        for fk in constraints {
            let Some(child) = self.resolve_flexible(&fk.table)? else {
                return Err(Error::configuration(format!(
                    "constraint references unknown table `{}`",
                    fk.table
                )));
            };
            let mut fk = fk.clone();
            fk.table = self.tables[child.0].table.clone();
            self.tables[child.0].foreign_keys.push(fk);
        }
        Ok(())
    }

    /// Pulls tables referenced by foreign keys but absent from the requested
    /// schemas into the model as closure-only tables, transitively.
    async fn discover_closure(&mut self, conn: &mut dyn Connection) -> Result<()> {
        let mut cursor = 0;
        while cursor < self.tables.len() {
            if self.tables[cursor].selection == Selection::Excluded {
                cursor += 1;
                continue;
            }
            let referred: Vec<TableRef> = self.tables[cursor]
                .foreign_keys
                .iter()
                .map(|fk| fk.referred_table.clone())
                .collect();
            cursor += 1;

            for table_ref in referred {
                if self.resolve_flexible(&table_ref)?.is_none() {
                    self.introspect(conn, table_ref, Selection::ClosureOnly)
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Rewrites every edge's referred reference to the resolved table's
    /// canonical reference, so runtime lookups are exact.
    fn normalize_edges(&mut self) -> Result<()> {
        let mut canonical: Vec<(usize, usize, TableRef)> = vec![];
        for (t, table) in self.tables.iter().enumerate() {
            for (e, fk) in table.foreign_keys.iter().enumerate() {
                if self.by_ref.contains_key(&fk.referred_table) {
                    continue;
                }
                let Some(id) = self.resolve_flexible(&fk.referred_table)? else {
                    if fk.logical {
                        return Err(Error::configuration(format!(
                            "constraint on `{}` refers to unknown table `{}`",
                            table.table, fk.referred_table
                        )));
                    }
                    continue;
                };
                canonical.push((t, e, self.tables[id.0].table.clone()));
            }
        }
        for (t, e, table_ref) in canonical {
            self.tables[t].foreign_keys[e].referred_table = table_ref;
        }
        Ok(())
    }

    fn validate_logical_edges(&self) -> Result<()> {
        for table in &self.tables {
            for fk in &table.foreign_keys {
                if !fk.logical {
                    continue;
                }
                for column in &fk.columns {
                    if table.column(column).is_none() {
                        return Err(Error::configuration(format!(
                            "constraint on `{}` names unknown column `{column}`",
                            table.table
                        )));
                    }
                }
                let Some(parent_id) = self.by_ref.get(&fk.referred_table) else {
                    return Err(Error::configuration(format!(
                        "constraint on `{}` refers to unknown table `{}`",
                        table.table, fk.referred_table
                    )));
                };
                let parent = &self.tables[parent_id.0];
                if parent.columns.is_empty() {
                    return Err(Error::configuration(format!(
                        "constraint on `{}` refers to unknown table `{}`",
                        table.table, fk.referred_table
                    )));
                }
                if parent.primary_key.is_empty() {
                    return Err(Error::configuration(format!(
                        "constraint on `{}` refers to `{}`, which has no primary key",
                        table.table, parent.table
                    )));
                }
                for column in &fk.referred_columns {
                    if parent.column(column).is_none() {
                        return Err(Error::configuration(format!(
                            "constraint on `{}` names unknown column `{}.{column}`",
                            table.table, parent.table
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_full_tables(&mut self, full_tables: &[String]) -> Result<()> {
        for name in full_tables {
            let Some(id) = self.resolve_flexible(&TableRef::parse(name))? else {
                return Err(Error::configuration(format!(
                    "--full-table names unknown table `{name}`"
                )));
            };
            match self.tables[id.0].selection {
                Selection::Excluded => {
                    return Err(Error::configuration(format!(
                        "table `{name}` is both excluded and requested in full; exclusion wins, \
                         drop one of the two"
                    )));
                }
                Selection::ClosureOnly => {
                    return Err(Error::configuration(format!(
                        "--full-table names `{name}`, which the table patterns deselect"
                    )));
                }
                Selection::Selected => self.tables[id.0].prioritized = true,
            }
        }
        Ok(())
    }

    fn validate_forced_rows(&self, options: &Options) -> Result<()> {
        for forced in &options.force_rows {
            let Some(id) = self.resolve_flexible(&forced.table)? else {
                return Err(Error::configuration(format!(
                    "--force names unknown table `{}`",
                    forced.table
                )));
            };
            let table = &self.tables[id.0];
            if table.selection == Selection::Excluded {
                return Err(Error::configuration(format!(
                    "--force names `{}`, which is excluded",
                    forced.table
                )));
            }
            if table.primary_key.len() != 1 {
                return Err(Error::configuration(format!(
                    "--force requires a single-column primary key; `{}` has {}",
                    forced.table,
                    table.primary_key.len()
                )));
            }
        }
        Ok(())
    }

    fn derive_child_edges(&mut self) {
        // Only selected tables receive downward expansion; closure-only and
        // excluded tables are never inserted into on a child's behalf.
        let mut edges: Vec<(TableId, ForeignKey)> = vec![];
        for table in &self.tables {
            if table.selection != Selection::Selected {
                continue;
            }
            for fk in &table.foreign_keys {
                if let Some(&parent) = self.by_ref.get(&fk.referred_table) {
                    edges.push((parent, fk.clone()));
                }
            }
        }
        for (parent, fk) in edges {
            self.tables[parent.0].child_keys.push(fk);
        }
    }
}

/// Parents-first topological order over the foreign-key graph. Cycles are
/// broken by name so the order stays deterministic.
fn flush_order(tables: &[Table], by_ref: &HashMap<TableRef, TableId>) -> Vec<TableId> {
    let n = tables.len();
    let mut indegree = vec![0usize; n];
    let mut children: Vec<Vec<usize>> = vec![vec![]; n];

    for table in tables {
        for fk in &table.foreign_keys {
            let Some(parent) = by_ref.get(&fk.referred_table) else {
                continue;
            };
            if parent.0 == table.id.0 {
                continue;
            }
            children[parent.0].push(table.id.0);
            indegree[table.id.0] += 1;
        }
    }

    let mut order = Vec::with_capacity(n);
    let mut emitted = vec![false; n];

    while order.len() < n {
        let next = (0..n)
            .filter(|&i| !emitted[i] && indegree[i] == 0)
            .min_by(|&a, &b| tables[a].table.cmp(&tables[b].table))
            // Every remaining table is in a cycle; pick one to break it.
            .or_else(|| {
                (0..n)
                    .filter(|&i| !emitted[i])
                    .min_by(|&a, &b| tables[a].table.cmp(&tables[b].table))
            })
            .unwrap();

        emitted[next] = true;
        order.push(TableId(next));
        for &child in &children[next] {
            indegree[child] = indegree[child].saturating_sub(1);
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_size_linear() {
        assert_eq!(target_size(0, 0.25, false), 0);
        assert_eq!(target_size(1, 0.25, false), 1);
        assert_eq!(target_size(2, 0.25, false), 1);
        assert_eq!(target_size(100, 0.25, false), 25);
        assert_eq!(target_size(103, 0.25, false), 25);
    }

    #[test]
    fn target_size_logarithmic() {
        assert_eq!(target_size(0, 0.5, true), 0);
        assert_eq!(target_size(1, 0.5, true), 1);
        assert_eq!(target_size(1_000_000, 0.5, true), 1000);
        let billion = target_size(1_000_000_000, 0.5, true);
        assert!((31_621..=31_623).contains(&billion), "got {billion}");
    }

    #[test]
    fn pattern_wildcards() {
        let p = Pattern::compile("zep*").unwrap();
        assert!(p.matches(&TableRef::bare("zeppelins")));
        assert!(p.matches(&TableRef::bare("zeppos")));
        assert!(!p.matches(&TableRef::bare("state")));
        assert!(!p.matches(&TableRef::bare("graf_zeppelin")));
    }

    #[test]
    fn pattern_qualified() {
        let p = Pattern::compile("sales.ord*").unwrap();
        assert!(p.matches(&TableRef::parse("sales.orders")));
        assert!(!p.matches(&TableRef::parse("archive.orders")));

        // A bare pattern matches the name in any schema.
        let p = Pattern::compile("orders").unwrap();
        assert!(p.matches(&TableRef::parse("sales.orders")));
    }

    #[test]
    fn pattern_escapes_regex_metacharacters() {
        let p = Pattern::compile("ord(ers)").unwrap();
        assert!(p.matches(&TableRef::bare("ord(ers)")));
        assert!(!p.matches(&TableRef::bare("orders")));
    }

    #[test]
    fn selection_rules() {
        let includes = Pattern::compile_all(&["state".into(), "city".into()]).unwrap();
        let excludes = Pattern::compile_all(&["city".into()]).unwrap();

        assert_eq!(
            select(&TableRef::bare("state"), &includes, &excludes),
            Selection::Selected
        );
        // Exclusion wins over inclusion.
        assert_eq!(
            select(&TableRef::bare("city"), &includes, &excludes),
            Selection::Excluded
        );
        // Not matching any include pattern leaves the table visible only.
        assert_eq!(
            select(&TableRef::bare("landmark"), &includes, &excludes),
            Selection::ClosureOnly
        );
        // No include patterns selects everything not excluded.
        assert_eq!(
            select(&TableRef::bare("landmark"), &[], &excludes),
            Selection::Selected
        );
    }

    fn bare_table(id: usize, name: &str, target: u64) -> Table {
        Table {
            id: TableId(id),
            table: TableRef::bare(name),
            columns: vec![],
            primary_key: vec![],
            source_rows: 0,
            target_rows: target,
            prioritized: false,
            selection: Selection::Selected,
            foreign_keys: vec![],
            child_keys: vec![],
        }
    }

    fn edge(child: &str, parent: &str) -> ForeignKey {
        ForeignKey {
            name: None,
            table: TableRef::bare(child),
            columns: vec!["pid".into()],
            referred_table: TableRef::bare(parent),
            referred_columns: vec!["id".into()],
            logical: false,
        }
    }

    #[test]
    fn completeness_scores() {
        let table = bare_table(0, "t", 10);
        assert_eq!(table.completeness(0), 0.0);
        assert_eq!(table.completeness(5), 0.5);
        assert_eq!(table.completeness(10), 1.0);

        let empty = bare_table(1, "empty", 0);
        assert_eq!(empty.completeness(0), f64::INFINITY);
    }

    #[test]
    fn prioritized_scores_below_complete_tables() {
        let mut table = bare_table(0, "t", 10);
        table.prioritized = true;
        assert!(table.completeness(9) < 1.0);
        assert!(table.completeness(10) >= 1.0);
    }

    #[test]
    fn flush_order_parents_first() {
        let mut state = bare_table(0, "state", 1);
        let mut city = bare_table(1, "city", 1);
        let landmark = {
            let mut t = bare_table(2, "landmark", 1);
            t.foreign_keys.push(edge("landmark", "city"));
            t
        };
        city.foreign_keys.push(edge("city", "state"));
        state.foreign_keys.clear();

        let tables = vec![state, city, landmark];
        let by_ref: HashMap<_, _> = tables
            .iter()
            .map(|t| (t.table.clone(), t.id))
            .collect();

        let order = flush_order(&tables, &by_ref);
        let names: Vec<_> = order
            .iter()
            .map(|id| tables[id.0].table.name.as_str())
            .collect();
        assert_eq!(names, ["state", "city", "landmark"]);
    }

    #[test]
    fn flush_order_survives_cycles() {
        let mut a = bare_table(0, "a", 1);
        let mut b = bare_table(1, "b", 1);
        a.foreign_keys.push(edge("a", "b"));
        b.foreign_keys.push(edge("b", "a"));

        let tables = vec![a, b];
        let by_ref: HashMap<_, _> = tables
            .iter()
            .map(|t| (t.table.clone(), t.id))
            .collect();

        let order = flush_order(&tables, &by_ref);
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn flush_order_ignores_self_references() {
        let mut node = bare_table(0, "node", 1);
        node.foreign_keys.push(edge("node", "node"));

        let by_ref: HashMap<_, _> = [(node.table.clone(), node.id)].into();
        let order = flush_order(&[node], &by_ref);
        assert_eq!(order, [TableId(0)]);
    }
}
