use crate::model::{Model, TableId};
use crate::presence::Presence;

use morsel_core::{Connection, Record, Result};

use tracing::{debug, warn};

/// Per-table insert batches for the target database.
///
/// Rows stay in append order within a table, which is already
/// parent-before-child because the propagator commits parents first. Flushing
/// walks the model's parents-first table order for the same reason.
#[derive(Debug)]
pub(crate) struct Buffers {
    pending: Vec<Vec<Record>>,
    total: usize,
    flush_size: usize,
}

impl Buffers {
    pub(crate) fn new(table_count: usize, flush_size: usize) -> Self {
        Self {
            pending: (0..table_count).map(|_| vec![]).collect(),
            total: 0,
            flush_size,
        }
    }

    /// Queues a row. Returns true when the buffered total has reached the
    /// flush threshold.
    pub(crate) fn push(&mut self, id: TableId, row: Record) -> bool {
        self.pending[id.0].push(row);
        self.total += 1;
        self.total > self.flush_size
    }

    /// Writes every pending batch to the target, parents first.
    ///
    /// A failing batch is retried row-by-row to isolate the offender; bad
    /// rows are logged, discounted, and skipped while the rest proceed.
    pub(crate) async fn flush(
        &mut self,
        model: &Model,
        conn: &mut dyn Connection,
        presence: &mut Presence,
    ) -> Result<()> {
        for &id in model.flush_order() {
            if self.pending[id.0].is_empty() {
                continue;
            }
            let rows = std::mem::take(&mut self.pending[id.0]);
            self.total -= rows.len();

            let table = model.table(id);
            debug!(table = %table.table, rows = rows.len(), "flushing batch");

            match conn.insert(&table.table, &table.columns, &rows).await {
                Ok(_) => {}
                Err(batch_err) => {
                    warn!(
                        table = %table.table,
                        error = %batch_err,
                        "bulk insert failed, isolating row by row"
                    );
                    for row in &rows {
                        if let Err(row_err) = conn
                            .insert(&table.table, &table.columns, std::slice::from_ref(row))
                            .await
                        {
                            warn!(
                                table = %table.table,
                                error = %row_err,
                                "skipping row that failed to insert"
                            );
                            presence.discount(id);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
