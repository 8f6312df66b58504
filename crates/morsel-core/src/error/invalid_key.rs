use super::Error;

/// Error when a row's key tuple cannot be built: a fetched row is missing
/// one of its table's primary-key columns.
#[derive(Debug)]
pub(super) struct InvalidKey {
    pub(super) message: Box<str>,
}

impl Error {
    pub fn invalid_key(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::InvalidKey(InvalidKey {
            message: message.into().into(),
        }))
    }

    pub fn is_invalid_key(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::InvalidKey(_))
    }
}

impl std::fmt::Display for InvalidKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid key: {}", self.message)
    }
}
