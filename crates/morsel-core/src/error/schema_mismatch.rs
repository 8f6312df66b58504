use super::Error;

/// Error when the target database's schema disagrees with the source: a
/// selected table or one of its columns is missing on the target side.
#[derive(Debug)]
pub(super) struct SchemaMismatch {
    pub(super) message: Box<str>,
}

impl Error {
    pub fn schema_mismatch(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::SchemaMismatch(SchemaMismatch {
            message: message.into().into(),
        }))
    }

    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::SchemaMismatch(_))
    }
}

impl std::fmt::Display for SchemaMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "schema mismatch: {}", self.message)
    }
}
