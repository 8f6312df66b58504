use morsel_core::{Key, Record, Value};

use std::collections::HashSet;

// ---------------------------------------------------------------------------
// Value conversions
// ---------------------------------------------------------------------------

#[test]
fn from_bool() {
    assert_eq!(Value::from(true), Value::Bool(true));
}

#[test]
fn from_i32_widens() {
    assert_eq!(Value::from(42i32), Value::I64(42));
}

#[test]
fn from_i64() {
    assert_eq!(Value::from(42i64), Value::I64(42));
}

#[test]
fn from_f64() {
    assert_eq!(Value::from(1.5f64), Value::F64(1.5));
}

#[test]
fn from_str() {
    assert_eq!(Value::from("hi"), Value::String("hi".to_string()));
}

#[test]
fn from_bytes() {
    assert_eq!(Value::from(vec![1u8, 2]), Value::Bytes(vec![1, 2]));
}

#[test]
fn from_none_is_null() {
    assert_eq!(Value::from(Option::<i64>::None), Value::Null);
}

#[test]
fn default_is_null() {
    assert_eq!(Value::default(), Value::Null);
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

#[test]
fn display_null() {
    assert_eq!(Value::Null.to_string(), "NULL");
}

#[test]
fn display_enum_array() {
    let value = Value::EnumArray(vec!["sad".into(), "ok".into()]);
    assert_eq!(value.to_string(), "{sad,ok}");
}

#[test]
fn display_bytes_redacts_content() {
    assert_eq!(Value::Bytes(vec![0; 16]).to_string(), "<16 bytes>");
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

#[test]
fn key_display() {
    let key = Key::new(vec![Value::I64(1), Value::String("x".into())]);
    assert_eq!(key.to_string(), "(1, x)");
}

#[test]
fn keys_from_different_records_compare_equal() {
    let mut a = Record::new();
    a.insert("id", Value::I64(7));
    a.insert("name", Value::String("left".into()));

    let mut b = Record::new();
    b.insert("name", Value::String("right".into()));
    b.insert("id", Value::I64(7));

    let columns = vec!["id".to_string()];
    assert_eq!(a.key(&columns), b.key(&columns));
}

#[test]
fn key_set_distinguishes_types() {
    let mut set = HashSet::new();
    set.insert(Key::new(vec![Value::I64(1)]));
    set.insert(Key::new(vec![Value::String("1".into())]));
    assert_eq!(set.len(), 2);
}

#[test]
fn uuid_keys_round_trip_through_sets() {
    let id = uuid::Uuid::new_v4();
    let mut set = HashSet::new();
    set.insert(Key::new(vec![Value::Uuid(id)]));
    assert!(set.contains(&Key::new(vec![Value::Uuid(id)])));
}
