use morsel_core::{
    schema::{Column, TypeTag},
    Value as CoreValue,
};
use postgres::{
    types::{private::BytesMut, to_sql_checked, IsNull, ToSql, Type},
    Row,
};

/// Adapter between morsel values and the PostgreSQL wire types.
#[derive(Debug)]
pub(crate) struct Value(pub(crate) CoreValue);

impl From<CoreValue> for Value {
    fn from(value: CoreValue) -> Self {
        Self(value)
    }
}

impl Value {
    pub(crate) fn into_inner(self) -> CoreValue {
        self.0
    }

    /// Converts a PostgreSQL value within a row to a morsel value.
    ///
    /// Enumerated, numeric, and json columns arrive as text because the
    /// serializer casts them on SELECT; the column's tag decides which
    /// variant carries them.
    pub(crate) fn from_sql(
        row: &Row,
        index: usize,
        column: &Column,
    ) -> morsel_core::Result<Self> {
        // Gets the value from the row as Option<T> and returns
        // CoreValue::Null if the Option is None.
        macro_rules! get_or_return_null {
            ($ty:ty) => {{
                match row.get::<usize, Option<$ty>>(index) {
                    Some(inner) => inner,
                    None => return Ok(Self(CoreValue::Null)),
                }
            }};
        }

        let ty = row.columns()[index].type_();

        let core_value = if *ty == Type::BOOL {
            CoreValue::Bool(get_or_return_null!(bool))
        } else if *ty == Type::INT2 {
            CoreValue::I64(i64::from(get_or_return_null!(i16)))
        } else if *ty == Type::INT4 {
            CoreValue::I64(i64::from(get_or_return_null!(i32)))
        } else if *ty == Type::INT8 {
            CoreValue::I64(get_or_return_null!(i64))
        } else if *ty == Type::FLOAT4 {
            CoreValue::F64(f64::from(get_or_return_null!(f32)))
        } else if *ty == Type::FLOAT8 {
            CoreValue::F64(get_or_return_null!(f64))
        } else if *ty == Type::TEXT
            || *ty == Type::VARCHAR
            || *ty == Type::BPCHAR
            || *ty == Type::NAME
        {
            let v = get_or_return_null!(String);
            match column.type_tag {
                TypeTag::Enumerated => CoreValue::Enum(v),
                TypeTag::Numeric => CoreValue::Decimal(v),
                TypeTag::Other if is_json(&column.udt) => CoreValue::Json(v),
                _ => CoreValue::String(v),
            }
        } else if *ty == Type::TEXT_ARRAY {
            let v = get_or_return_null!(Vec<String>);
            match column.type_tag {
                TypeTag::EnumeratedArray => CoreValue::EnumArray(v),
                _ => {
                    return Err(morsel_core::Error::from_args(format_args!(
                        "unexpected text array for column `{}`",
                        column.name
                    )))
                }
            }
        } else if *ty == Type::UUID {
            CoreValue::Uuid(get_or_return_null!(uuid::Uuid))
        } else if *ty == Type::BYTEA {
            CoreValue::Bytes(get_or_return_null!(Vec<u8>))
        } else if *ty == Type::TIMESTAMPTZ {
            CoreValue::Timestamp(get_or_return_null!(jiff::Timestamp))
        } else if *ty == Type::TIMESTAMP {
            CoreValue::DateTime(get_or_return_null!(jiff::civil::DateTime))
        } else if *ty == Type::DATE {
            CoreValue::Date(get_or_return_null!(jiff::civil::Date))
        } else if *ty == Type::TIME {
            CoreValue::Time(get_or_return_null!(jiff::civil::Time))
        } else {
            return Err(morsel_core::Error::from_args(format_args!(
                "no PostgreSQL conversion for type `{ty}` in column `{}`",
                column.name
            )));
        };

        Ok(Self(core_value))
    }
}

fn is_json(udt: &str) -> bool {
    udt == "json" || udt == "jsonb"
}

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match (&self.0, ty) {
            (CoreValue::Null, _) => Ok(IsNull::Yes),
            (CoreValue::Bool(value), _) => value.to_sql(ty, out),
            (CoreValue::I64(value), &Type::INT2) => (*value as i16).to_sql(ty, out),
            (CoreValue::I64(value), &Type::INT4) => (*value as i32).to_sql(ty, out),
            (CoreValue::I64(value), &Type::INT8) => value.to_sql(ty, out),
            (CoreValue::F64(value), &Type::FLOAT4) => (*value as f32).to_sql(ty, out),
            (CoreValue::F64(value), &Type::FLOAT8) => value.to_sql(ty, out),
            // Decimal, json, and enum values bind as text; the statement
            // carries the cast back to the column's own type.
            (CoreValue::Decimal(value), _) => value.to_sql(ty, out),
            (CoreValue::String(value), _) => value.to_sql(ty, out),
            (CoreValue::Json(value), _) => value.to_sql(ty, out),
            (CoreValue::Enum(value), _) => value.to_sql(ty, out),
            (CoreValue::EnumArray(value), _) => value.to_sql(ty, out),
            (CoreValue::Bytes(value), &Type::BYTEA) => value.to_sql(ty, out),
            (CoreValue::Uuid(value), &Type::UUID) => value.to_sql(ty, out),
            (CoreValue::Uuid(value), _) => value.to_string().to_sql(ty, out),
            (CoreValue::Timestamp(value), _) => value.to_sql(ty, out),
            (CoreValue::DateTime(value), _) => value.to_sql(ty, out),
            (CoreValue::Date(value), _) => value.to_sql(ty, out),
            (CoreValue::Time(value), _) => value.to_sql(ty, out),
            (value, _) => Err(format!(
                "unsupported value for PostgreSQL type {ty}: {value:?}"
            )
            .into()),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // Mismatches surface from to_sql with the offending pair named.
        true
    }

    to_sql_checked!();
}
