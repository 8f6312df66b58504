mod adhoc;
mod configuration;
mod driver_operation_failed;
mod forced_row_not_found;
mod invalid_connection_url;
mod invalid_key;
mod schema_mismatch;
mod unsupported_feature;

use adhoc::AdhocError;
use configuration::Configuration;
use driver_operation_failed::DriverOperationFailed;
use forced_row_not_found::ForcedRowNotFound;
use invalid_connection_url::InvalidConnectionUrl;
use invalid_key::InvalidKey;
use schema_mismatch::SchemaMismatch;
use unsupported_feature::UnsupportedFeature;

use std::sync::Arc;

/// An error that can occur in morsel.
#[derive(Clone)]
pub struct Error {
    inner: Arc<ErrorInner>,
}

#[derive(Debug)]
struct ErrorInner {
    kind: ErrorKind,
    cause: Option<Error>,
}

#[derive(Debug)]
enum ErrorKind {
    Adhoc(AdhocError),
    Configuration(Configuration),
    DriverOperationFailed(DriverOperationFailed),
    ForcedRowNotFound(ForcedRowNotFound),
    InvalidConnectionUrl(InvalidConnectionUrl),
    InvalidKey(InvalidKey),
    SchemaMismatch(SchemaMismatch),
    UnsupportedFeature(UnsupportedFeature),
}

impl Error {
    /// Adds context to this error.
    ///
    /// Context is displayed in reverse order: the most recently added context
    /// is shown first, ending with the root cause.
    pub fn context(self, consequent: Error) -> Error {
        let mut err = consequent;
        let inner = Arc::get_mut(&mut err.inner).unwrap();
        assert!(
            inner.cause.is_none(),
            "consequent error must not already have a cause"
        );
        inner.cause = Some(self);
        err
    }

    fn chain(&self) -> impl Iterator<Item = &Error> {
        let mut err = self;
        core::iter::once(err).chain(core::iter::from_fn(move || {
            err = err.inner.cause.as_ref()?;
            Some(err)
        }))
    }

    fn kind(&self) -> &ErrorKind {
        &self.inner.kind
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.kind() {
            ErrorKind::DriverOperationFailed(err) => Some(err),
            _ => None,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let mut it = self.chain().peekable();
        while let Some(err) = it.next() {
            core::fmt::Display::fmt(err.kind(), f)?;
            if it.peek().is_some() {
                f.write_str(": ")?;
            }
        }
        Ok(())
    }
}

impl core::fmt::Debug for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if !f.alternate() {
            core::fmt::Display::fmt(self, f)
        } else {
            f.debug_struct("Error")
                .field("kind", &self.inner.kind)
                .field("cause", &self.inner.cause)
                .finish()
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        use self::ErrorKind::*;

        match self {
            Adhoc(err) => core::fmt::Display::fmt(err, f),
            Configuration(err) => core::fmt::Display::fmt(err, f),
            DriverOperationFailed(err) => core::fmt::Display::fmt(err, f),
            ForcedRowNotFound(err) => core::fmt::Display::fmt(err, f),
            InvalidConnectionUrl(err) => core::fmt::Display::fmt(err, f),
            InvalidKey(err) => core::fmt::Display::fmt(err, f),
            SchemaMismatch(err) => core::fmt::Display::fmt(err, f),
            UnsupportedFeature(err) => core::fmt::Display::fmt(err, f),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            inner: Arc::new(ErrorInner { kind, cause: None }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_size() {
        // One word: the Arc pointer
        let expected_size = core::mem::size_of::<usize>();
        assert_eq!(expected_size, core::mem::size_of::<Error>());
    }

    #[test]
    fn error_from_args() {
        let err = Error::from_args(format_args!("bad value: {}", 42));
        assert_eq!(err.to_string(), "bad value: 42");
    }

    #[test]
    fn error_chain_display() {
        let root = Error::from_args(format_args!("root cause"));
        let top = Error::from_args(format_args!("top context"));
        let chained = root.context(top);
        assert_eq!(chained.to_string(), "top context: root cause");
    }

    #[test]
    fn predicates() {
        assert!(Error::configuration("no tables matched").is_configuration());
        assert!(!Error::configuration("x").is_schema_mismatch());
        assert!(Error::invalid_connection_url("nope").is_invalid_connection_url());
        assert!(Error::invalid_key("missing pk column").is_invalid_key());
    }
}
