use morsel_core::{Record, TableRef};

use tracing::warn;

/// Event delivered synchronously for every row committed to the target.
#[derive(Debug)]
pub struct RowAdded<'a> {
    /// The table the row was inserted into.
    pub table: &'a TableRef,

    /// The source row as fetched.
    pub row: &'a Record,

    /// Whether the row was copied as priority work (forced rows, full
    /// tables, and their descendants).
    pub prioritized: bool,
}

/// A row-added subscriber. Errors are logged and swallowed; they never abort
/// the copy.
pub type Observer =
    Box<dyn Fn(&RowAdded<'_>) -> Result<(), Box<dyn std::error::Error>> + Send>;

#[derive(Default)]
pub(crate) struct Observers {
    list: Vec<Observer>,
}

impl Observers {
    pub(crate) fn subscribe(&mut self, observer: Observer) {
        self.list.push(observer);
    }

    pub(crate) fn notify(&self, event: &RowAdded<'_>) {
        for observer in &self.list {
            if let Err(err) = observer(event) {
                warn!(table = %event.table, error = %err, "row-added observer failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use morsel_core::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn observers_run_in_subscription_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut observers = Observers::default();

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            observers.subscribe(Box::new(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }));
        }

        let table = TableRef::bare("state");
        let mut row = Record::new();
        row.insert("abbrev", Value::String("MN".into()));
        observers.notify(&RowAdded {
            table: &table,
            row: &row,
            prioritized: false,
        });

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn observer_errors_are_swallowed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut observers = Observers::default();

        observers.subscribe(Box::new(|_| Err("boom".into())));
        {
            let calls = Arc::clone(&calls);
            observers.subscribe(Box::new(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }));
        }

        let table = TableRef::bare("state");
        let row = Record::new();
        observers.notify(&RowAdded {
            table: &table,
            row: &row,
            prioritized: true,
        });

        // The failing observer did not stop the one after it.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
