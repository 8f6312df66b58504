use crate::{Key, Value};

use indexmap::IndexMap;

/// A single row in flight: an ordered map from column name to value.
///
/// Column order is the order the driver returned the columns in, which the
/// drivers keep aligned with the schema model's column order. Insertion
/// renders values in this order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: IndexMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            values: IndexMap::with_capacity(n),
        }
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.values.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Extracts the tuple of the named columns, in the given order.
    ///
    /// Returns `None` if any named column is absent from the record.
    pub fn key(&self, columns: &[String]) -> Option<Key> {
        let mut values = Vec::with_capacity(columns.len());
        for column in columns {
            values.push(self.values.get(column)?.clone());
        }
        Some(Key::new(values))
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        let mut row = Record::new();
        row.insert("id", Value::I64(1));
        row.insert("name", Value::String("Duluth".into()));
        row.insert("state", Value::Null);
        row
    }

    #[test]
    fn preserves_column_order() {
        let row = record();
        let columns: Vec<_> = row.columns().collect();
        assert_eq!(columns, ["id", "name", "state"]);
    }

    #[test]
    fn lookup_by_name() {
        let row = record();
        assert_eq!(row.get("id"), Some(&Value::I64(1)));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn key_extraction() {
        let row = record();
        let key = row.key(&["id".to_string()]).unwrap();
        assert_eq!(key, Key::new(vec![Value::I64(1)]));
    }

    #[test]
    fn key_extraction_missing_column() {
        let row = record();
        assert!(row.key(&["nope".to_string()]).is_none());
    }

    #[test]
    fn composite_key_order_follows_request() {
        let row = record();
        let key = row.key(&["name".to_string(), "id".to_string()]).unwrap();
        assert_eq!(
            key,
            Key::new(vec![Value::String("Duluth".into()), Value::I64(1)])
        );
    }
}
