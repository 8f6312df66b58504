use morsel_core::{
    schema::{Column, TypeTag},
    Value as CoreValue,
};
use rusqlite::types::{ToSqlOutput, Value as SqliteValue, ValueRef};

/// Adapter between morsel values and rusqlite's value types.
#[derive(Debug)]
pub(crate) struct Value(pub(crate) CoreValue);

impl From<CoreValue> for Value {
    fn from(value: CoreValue) -> Self {
        Self(value)
    }
}

impl Value {
    /// Converts a SQLite storage value to a morsel value, guided by the
    /// column's semantic tag. SQLite stores temporal and decimal values as
    /// text or numbers; they round-trip untouched.
    pub(crate) fn from_sql(value: ValueRef<'_>, column: &Column) -> CoreValue {
        match value {
            ValueRef::Null => CoreValue::Null,
            ValueRef::Integer(v) => {
                if column.type_tag == TypeTag::Boolean {
                    CoreValue::Bool(v != 0)
                } else {
                    CoreValue::I64(v)
                }
            }
            ValueRef::Real(v) => CoreValue::F64(v),
            ValueRef::Text(v) => CoreValue::String(String::from_utf8_lossy(v).into_owned()),
            ValueRef::Blob(v) => CoreValue::Bytes(v.to_vec()),
        }
    }
}

impl rusqlite::ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match &self.0 {
            CoreValue::Null => ToSqlOutput::Owned(SqliteValue::Null),
            CoreValue::Bool(v) => ToSqlOutput::Owned(SqliteValue::Integer(i64::from(*v))),
            CoreValue::I64(v) => ToSqlOutput::Owned(SqliteValue::Integer(*v)),
            CoreValue::F64(v) => ToSqlOutput::Owned(SqliteValue::Real(*v)),
            CoreValue::Decimal(v) => ToSqlOutput::Owned(SqliteValue::Text(v.clone())),
            CoreValue::String(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            CoreValue::Bytes(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
            CoreValue::Uuid(v) => ToSqlOutput::Owned(SqliteValue::Text(v.to_string())),
            CoreValue::Date(v) => ToSqlOutput::Owned(SqliteValue::Text(v.to_string())),
            CoreValue::Time(v) => ToSqlOutput::Owned(SqliteValue::Text(v.to_string())),
            CoreValue::DateTime(v) => ToSqlOutput::Owned(SqliteValue::Text(v.to_string())),
            CoreValue::Timestamp(v) => ToSqlOutput::Owned(SqliteValue::Text(v.to_string())),
            CoreValue::Json(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            CoreValue::Enum(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            CoreValue::EnumArray(v) => {
                ToSqlOutput::Owned(SqliteValue::Text(format!("{{{}}}", v.join(","))))
            }
        })
    }
}
