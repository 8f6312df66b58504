use crate::model::Table;

use morsel_core::{Connection, Record, Result, Value};

use rand::Rng;
use tracing::debug;

/// How many key-range probes to issue before judging the hit rate.
const PROBE_WINDOW: u32 = 32;

/// Tables below this size skip key-range sampling entirely.
const KEY_RANGE_FLOOR: u64 = 1000;

/// Produces randomized candidate rows for one table.
///
/// Strategy ladder: uniform sampling over a numeric key range when the table
/// is big and dense enough, the database's own random ordering otherwise, and
/// an ordered scan once random batches stop producing new rows, so exhaustion
/// is detectable and the walk terminates.
#[derive(Debug)]
pub(crate) struct Selector {
    strategy: Option<Strategy>,
    exhausted: bool,
}

#[derive(Debug)]
enum Strategy {
    KeyRange {
        column: String,
        min: i64,
        max: i64,
        probes: u32,
        hits: u32,
    },
    Random,
    Scan {
        offset: u64,
    },
}

impl Selector {
    pub(crate) fn new(table: &Table) -> Self {
        Self {
            strategy: None,
            exhausted: table.source_rows == 0,
        }
    }

    pub(crate) fn exhausted(&self) -> bool {
        self.exhausted
    }

    /// Reports how many of the last batch's candidates actually inserted.
    /// A fruitless random batch degrades the strategy to an ordered scan.
    pub(crate) fn note_progress(&mut self, inserted: usize) {
        if inserted == 0
            && matches!(
                self.strategy,
                Some(Strategy::KeyRange { .. }) | Some(Strategy::Random)
            )
        {
            debug!("random batch produced nothing new, degrading to scan");
            self.strategy = Some(Strategy::Scan { offset: 0 });
        }
    }

    pub(crate) async fn next_batch(
        &mut self,
        conn: &mut dyn Connection,
        table: &Table,
        want: usize,
    ) -> Result<Vec<Record>> {
        if self.exhausted || want == 0 {
            return Ok(vec![]);
        }

        let mut strategy = match self.strategy.take() {
            Some(strategy) => strategy,
            None => self.pick_strategy(conn, table).await?,
        };

        let batch = match &mut strategy {
            Strategy::KeyRange {
                column,
                min,
                max,
                probes,
                hits,
            } => {
                let mut too_sparse = false;
                let mut batch = Vec::with_capacity(want);
                let mut rng = rand::rng();

                while batch.len() < want {
                    let candidate = rng.random_range(*min..=*max);
                    let row = conn
                        .fetch_by_key(
                            &table.table,
                            &table.columns,
                            std::slice::from_ref(column),
                            &[Value::I64(candidate)],
                        )
                        .await?;

                    *probes += 1;
                    if let Some(row) = row {
                        *hits += 1;
                        batch.push(row);
                    }

                    // A sparse id space wastes most probes; fall back to the
                    // database's random ordering.
                    if *probes >= PROBE_WINDOW && *hits * 4 < *probes {
                        debug!(
                            table = %table.table,
                            probes = *probes,
                            hits = *hits,
                            "key space too sparse, sampling by random order"
                        );
                        too_sparse = true;
                        break;
                    }
                }

                if too_sparse {
                    strategy = Strategy::Random;
                }

                if batch.len() < want {
                    let mut rest = conn
                        .sample(&table.table, &table.columns, want - batch.len())
                        .await?;
                    batch.append(&mut rest);
                }
                batch
            }
            Strategy::Random => conn.sample(&table.table, &table.columns, want).await?,
            Strategy::Scan { offset } => {
                let rows = conn
                    .scan(&table.table, &table.columns, &table.primary_key, want, *offset)
                    .await?;
                *offset += rows.len() as u64;
                if rows.len() < want {
                    self.exhausted = true;
                }
                rows
            }
        };

        self.strategy = Some(strategy);
        Ok(batch)
    }

    /// Fetches the specific row whose single-column key parses from `text`.
    /// The key text is interpreted against the key column's type.
    pub(crate) async fn fetch_forced(
        conn: &mut dyn Connection,
        table: &Table,
        text: &str,
    ) -> Result<Option<Record>> {
        let column = &table.primary_key[0];
        let value = match text.parse::<i64>() {
            Ok(number) => Value::I64(number),
            Err(_) => Value::String(text.to_string()),
        };
        conn.fetch_by_key(
            &table.table,
            &table.columns,
            std::slice::from_ref(column),
            &[value],
        )
        .await
    }

    async fn pick_strategy(
        &self,
        conn: &mut dyn Connection,
        table: &Table,
    ) -> Result<Strategy> {
        if table.source_rows >= KEY_RANGE_FLOOR {
            if let Some(column) = table.numeric_single_key() {
                if let Some((min, max)) = conn.numeric_key_range(&table.table, column).await? {
                    return Ok(Strategy::KeyRange {
                        column: column.to_string(),
                        min,
                        max,
                        probes: 0,
                        hits: 0,
                    });
                }
            }
        }
        Ok(Strategy::Random)
    }
}
