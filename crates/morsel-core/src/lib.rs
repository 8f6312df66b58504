pub mod driver;
pub use driver::Connection;

mod error;
pub use error::Error;

mod key;
pub use key::Key;

mod record;
pub use record::Record;

pub mod schema;
pub use schema::{Column, ForeignKey, TableRef, TypeTag};

mod value;
pub use value::Value;

/// A Result type alias that uses morsel's [`Error`] type.
pub type Result<T, E = Error> = core::result::Result<T, E>;

pub use async_trait::async_trait;
