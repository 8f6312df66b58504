use std::fmt::Write;

/// The SQL dialect being rendered. Handles the differences between
/// placeholder styles and cast requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Sqlite,
    PostgreSql,
}

impl Flavor {
    /// Appends the 1-indexed parameter placeholder for this dialect.
    pub(crate) fn placeholder(self, dst: &mut String, index: usize) {
        match self {
            Flavor::Sqlite => write!(dst, "?{index}").unwrap(),
            Flavor::PostgreSql => write!(dst, "${index}").unwrap(),
        }
    }
}
