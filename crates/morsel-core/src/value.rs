use std::fmt;

/// A dynamically typed database value.
///
/// Rows travel through the engine as maps of these; the engine itself never
/// interprets values beyond null checks and key equality, so each variant only
/// needs to round-trip faithfully between the source and target drivers.
#[derive(Debug, Default, Clone, PartialEq)]
pub enum Value {
    /// Null value
    #[default]
    Null,

    /// Boolean value
    Bool(bool),

    /// Signed 64-bit integer. All integer column widths collapse here; the
    /// column's storage type decides the width on the way back out.
    I64(i64),

    /// 64-bit floating point
    F64(f64),

    /// Fixed-precision decimal, carried as its text form so no precision is
    /// lost in transit.
    Decimal(String),

    /// String value
    String(String),

    /// An array of bytes
    Bytes(Vec<u8>),

    /// 128-bit universally unique identifier (UUID)
    Uuid(uuid::Uuid),

    /// A civil date in the Gregorian calendar.
    /// See [`jiff::civil::Date`].
    Date(jiff::civil::Date),

    /// A civil "wall clock" time.
    /// See [`jiff::civil::Time`].
    Time(jiff::civil::Time),

    /// A civil datetime without a time zone.
    /// See [`jiff::civil::DateTime`].
    DateTime(jiff::civil::DateTime),

    /// An instant in time as nanoseconds since the Unix epoch.
    /// See [`jiff::Timestamp`].
    Timestamp(jiff::Timestamp),

    /// A JSON document, carried as its serialized text.
    Json(String),

    /// A value of an enumerated type, carried as the variant label.
    Enum(String),

    /// An array of enumerated values.
    ///
    /// Kept distinct from a plain array of strings: some drivers must emit an
    /// explicit cast to the enum's array type when inserting.
    EnumArray(Vec<String>),
}

impl Value {
    /// Returns a `Value` representing null
    pub const fn null() -> Self {
        Self::Null
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F64(v) => Some(*v),
            Self::I64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) | Self::Decimal(v) | Self::Enum(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Decimal(v) => f.write_str(v),
            Value::String(v) => f.write_str(v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Uuid(v) => write!(f, "{v}"),
            Value::Date(v) => write!(f, "{v}"),
            Value::Time(v) => write!(f, "{v}"),
            Value::DateTime(v) => write!(f, "{v}"),
            Value::Timestamp(v) => write!(f, "{v}"),
            Value::Json(v) => f.write_str(v),
            Value::Enum(v) => f.write_str(v),
            Value::EnumArray(v) => write!(f, "{{{}}}", v.join(",")),
        }
    }
}

impl From<bool> for Value {
    fn from(src: bool) -> Self {
        Self::Bool(src)
    }
}

impl From<i32> for Value {
    fn from(src: i32) -> Self {
        Self::I64(i64::from(src))
    }
}

impl From<i64> for Value {
    fn from(src: i64) -> Self {
        Self::I64(src)
    }
}

impl From<f64> for Value {
    fn from(src: f64) -> Self {
        Self::F64(src)
    }
}

impl From<&str> for Value {
    fn from(src: &str) -> Self {
        Self::String(src.to_string())
    }
}

impl From<String> for Value {
    fn from(src: String) -> Self {
        Self::String(src)
    }
}

impl From<Vec<u8>> for Value {
    fn from(src: Vec<u8>) -> Self {
        Self::Bytes(src)
    }
}

impl From<uuid::Uuid> for Value {
    fn from(src: uuid::Uuid) -> Self {
        Self::Uuid(src)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(src: Option<T>) -> Self {
        match src {
            Some(value) => value.into(),
            None => Self::Null,
        }
    }
}
