use crate::Value;

use std::hash::{Hash, Hasher};

/// A primary-key tuple, in primary-key column order.
///
/// `Value` itself is not `Eq` because it can carry floats; keys wrap a value
/// tuple and compare floats by bit pattern so they can live in hash sets. The
/// presence index relies on this.
#[derive(Debug, Clone)]
pub struct Key(Vec<Value>);

impl Key {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Value>> for Key {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        write!(f, "(")?;
        for value in &self.0 {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{value}")?;
        }
        write!(f, ")")
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
        _ => a == b,
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self.0.iter().zip(&other.0).all(|(a, b)| value_eq(a, b))
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for value in &self.0 {
            std::mem::discriminant(value).hash(state);
            match value {
                Value::Null => {}
                Value::Bool(v) => v.hash(state),
                Value::I64(v) => v.hash(state),
                Value::F64(v) => v.to_bits().hash(state),
                Value::Decimal(v) => v.hash(state),
                Value::String(v) => v.hash(state),
                Value::Bytes(v) => v.hash(state),
                Value::Uuid(v) => v.hash(state),
                Value::Date(v) => v.hash(state),
                Value::Time(v) => v.hash(state),
                Value::DateTime(v) => v.hash(state),
                Value::Timestamp(v) => v.hash(state),
                Value::Json(v) => v.hash(state),
                Value::Enum(v) => v.hash(state),
                Value::EnumArray(v) => v.hash(state),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_compare_by_value() {
        let a = Key::new(vec![Value::I64(1), Value::String("x".into())]);
        let b = Key::new(vec![Value::I64(1), Value::String("x".into())]);
        let c = Key::new(vec![Value::I64(2), Value::String("x".into())]);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn float_keys_use_bit_equality() {
        let a = Key::new(vec![Value::F64(1.5)]);
        let b = Key::new(vec![Value::F64(1.5)]);
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn set_membership() {
        let mut set = HashSet::new();
        set.insert(Key::new(vec![Value::I64(7)]));
        set.insert(Key::new(vec![Value::I64(7)]));

        assert_eq!(set.len(), 1);
        assert!(set.contains(&Key::new(vec![Value::I64(7)])));
        assert!(!set.contains(&Key::new(vec![Value::I64(8)])));
    }

    #[test]
    fn width_matters() {
        let narrow = Key::new(vec![Value::I64(1)]);
        let wide = Key::new(vec![Value::I64(1), Value::Null]);
        assert_ne!(narrow, wide);
    }
}
