#[derive(Debug)]
pub struct Capability {
    /// SQL expression that orders rows randomly when placed in ORDER BY.
    pub random_order_sql: &'static str,

    /// When true, the database namespaces tables into schemas.
    pub supports_schemas: bool,

    /// When true, auto-generated keys are backed by sequences that must be
    /// advanced after an out-of-band load. SQLite derives the next rowid from
    /// MAX(rowid), so nothing needs advancing there.
    pub sequences: bool,
}

impl Capability {
    /// SQLite capabilities.
    pub const SQLITE: Capability = Capability {
        random_order_sql: "random()",
        supports_schemas: false,
        sequences: false,
    };

    /// PostgreSQL capabilities.
    pub const POSTGRESQL: Capability = Capability {
        supports_schemas: true,
        sequences: true,
        ..Capability::SQLITE
    };
}
