use super::Error;

/// Error for invalid run configuration: malformed config files, unknown
/// tables named by flags, composite keys in `--force`, or include/exclude
/// patterns that match nothing.
#[derive(Debug)]
pub(super) struct Configuration {
    pub(super) message: Box<str>,
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::Configuration(Configuration {
            message: message.into().into(),
        }))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::Configuration(_))
    }
}

impl std::fmt::Display for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid configuration: {}", self.message)
    }
}
