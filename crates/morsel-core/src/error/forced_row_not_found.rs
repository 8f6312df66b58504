use super::Error;

/// Error when a `--force`d primary key does not exist in the source database.
#[derive(Debug)]
pub(super) struct ForcedRowNotFound {
    pub(super) table: Box<str>,
    pub(super) key: Box<str>,
}

impl Error {
    pub fn forced_row_not_found(table: impl Into<String>, key: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::ForcedRowNotFound(ForcedRowNotFound {
            table: table.into().into(),
            key: key.into().into(),
        }))
    }

    pub fn is_forced_row_not_found(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::ForcedRowNotFound(_))
    }
}

impl std::fmt::Display for ForcedRowNotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "forced row {}:{} not found in the source database",
            self.table, self.key
        )
    }
}
