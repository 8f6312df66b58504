use crate::model::TableId;

use morsel_core::Key;

use std::collections::HashSet;

/// Per-table record of which key tuples have already been committed to (or
/// buffered for) the target. Entries are only ever added; nothing is evicted.
///
/// Tables without a primary key have no stable keys; their copies are only
/// counted.
#[derive(Debug)]
pub(crate) struct Presence {
    tables: Vec<Entry>,
}

#[derive(Debug, Default)]
struct Entry {
    keys: HashSet<Key>,
    copied: u64,
}

impl Presence {
    pub(crate) fn new(table_count: usize) -> Self {
        Self {
            tables: (0..table_count).map(|_| Entry::default()).collect(),
        }
    }

    pub(crate) fn contains(&self, id: TableId, key: &Key) -> bool {
        self.tables[id.0].keys.contains(key)
    }

    /// Records a key. Idempotent; returns whether the key was new. New keys
    /// bump the table's copied count.
    pub(crate) fn add(&mut self, id: TableId, key: Key) -> bool {
        let entry = &mut self.tables[id.0];
        let added = entry.keys.insert(key);
        if added {
            entry.copied += 1;
        }
        added
    }

    /// Counts a copy into a table without a primary key.
    pub(crate) fn add_keyless(&mut self, id: TableId) {
        self.tables[id.0].copied += 1;
    }

    /// Rolls the copied count back for a row that failed to insert. The key
    /// stays recorded so the row is not retried.
    pub(crate) fn discount(&mut self, id: TableId) {
        let entry = &mut self.tables[id.0];
        entry.copied = entry.copied.saturating_sub(1);
    }

    pub(crate) fn copied(&self, id: TableId) -> u64 {
        self.tables[id.0].copied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use morsel_core::Value;

    fn key(v: i64) -> Key {
        Key::new(vec![Value::I64(v)])
    }

    #[test]
    fn add_is_idempotent() {
        let mut presence = Presence::new(1);
        let id = TableId(0);

        assert!(presence.add(id, key(1)));
        assert!(!presence.add(id, key(1)));
        assert_eq!(presence.copied(id), 1);
        assert!(presence.contains(id, &key(1)));
        assert!(!presence.contains(id, &key(2)));
    }

    #[test]
    fn keyless_counting() {
        let mut presence = Presence::new(1);
        let id = TableId(0);

        presence.add_keyless(id);
        presence.add_keyless(id);
        assert_eq!(presence.copied(id), 2);
    }

    #[test]
    fn discount_keeps_key() {
        let mut presence = Presence::new(1);
        let id = TableId(0);

        presence.add(id, key(1));
        presence.discount(id);
        assert_eq!(presence.copied(id), 0);
        assert!(presence.contains(id, &key(1)));
    }

    #[test]
    fn tables_are_independent() {
        let mut presence = Presence::new(2);
        presence.add(TableId(0), key(1));
        assert!(!presence.contains(TableId(1), &key(1)));
        assert_eq!(presence.copied(TableId(1)), 0);
    }
}
