use std::fmt;

/// Identifies a table by schema and name.
///
/// The schema component is `None` for databases without schema support and
/// for tables in the driver's default schema.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: Option<impl Into<String>>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.map(Into::into),
            name: name.into(),
        }
    }

    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// Parses `name` or `schema.name`.
    pub fn parse(qualified: &str) -> Self {
        match qualified.split_once('.') {
            Some((schema, name)) => Self::new(Some(schema), name),
            None => Self::bare(qualified),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl fmt::Debug for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableRef({self})")
    }
}

/// Semantic tag for a column's type, from the engine's point of view.
///
/// Drivers derive the tag from the database-native type and use it to
/// round-trip values; the engine never inspects values beyond null checks and
/// key equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Numeric,
    Text,
    Boolean,
    Temporal,
    Binary,
    Enumerated,
    /// An array of an enumerated type. Distinct from `Other` because some
    /// drivers require an explicit cast to the enum array type on insert.
    EnumeratedArray,
    Other,
}

/// A column of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// The name of the column in the database.
    pub name: String,

    /// The column's semantic type tag.
    pub type_tag: TypeTag,

    /// The database-native type name (e.g. `int8`, `mood`, `_mood`). Drivers
    /// need it for enum casts and sequence lookups.
    pub udt: String,

    /// Whether or not the column is nullable.
    pub nullable: bool,

    /// True if the column's value is auto-generated by the database, e.g. by
    /// a serial sequence or rowid. Finalization advances the backing sequence
    /// for such columns.
    pub auto_generated: bool,
}

/// A foreign-key edge from a child table to its referred (parent) table.
///
/// `columns` and `referred_columns` are equal-length and pair up by position.
/// Edges may cross schemas. Logical edges come from user configuration and
/// carry the same force as catalog edges.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    /// Constraint name, when the catalog has one.
    pub name: Option<String>,

    /// The child table holding the constrained columns.
    pub table: TableRef,

    /// Constrained columns on the child table.
    pub columns: Vec<String>,

    /// The parent table.
    pub referred_table: TableRef,

    /// Referred columns on the parent table.
    pub referred_columns: Vec<String>,

    /// True when the edge was supplied by user configuration rather than the
    /// database catalog.
    pub logical: bool,
}
