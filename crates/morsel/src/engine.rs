use crate::buffer::Buffers;
use crate::config::Options;
use crate::model::{Model, Selection, TableId};
use crate::observe::{Observer, Observers};
use crate::presence::Presence;
use crate::select::Selector;

use morsel_core::{driver::Driver, Connection, Error, Key, Result, TableRef};

use std::collections::HashSet;
use tracing::{debug, info};

/// Candidate rows pulled per main-loop turn.
const BATCH: usize = 64;

/// Rows per page when copying a table in full.
const FULL_PAGE: usize = 256;

/// One subsetting run: both connections, the schema model, and all mutable
/// engine state. Owning the connections guarantees they drop on every exit
/// path.
pub struct Engine {
    pub(crate) options: Options,
    pub(crate) model: Model,
    pub(crate) source: Box<dyn Connection>,
    pub(crate) target: Box<dyn Connection>,
    pub(crate) target_sequences: bool,
    pub(crate) presence: Presence,
    pub(crate) buffers: Buffers,
    pub(crate) selectors: Vec<Selector>,
    pub(crate) observers: Observers,

    /// Keys whose parent closure is currently being resolved, up the active
    /// recursion chain. A foreign-key cycle that arrives back at one of
    /// these must not recurse into it again.
    pub(crate) resolving: HashSet<(TableId, Key)>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

/// One line of the pre-run plan.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub table: TableRef,
    pub source_rows: u64,
    pub target_rows: u64,
}

/// Per-table outcome of a completed run.
#[derive(Debug, Clone)]
pub struct Summary {
    pub entries: Vec<SummaryEntry>,
}

#[derive(Debug, Clone)]
pub struct SummaryEntry {
    pub table: TableRef,
    pub copied: u64,
    pub target_rows: u64,
}

impl Summary {
    /// The copied count for a table, by bare or qualified name.
    pub fn copied(&self, table: &str) -> u64 {
        let table = TableRef::parse(table);
        self.entries
            .iter()
            .find(|entry| entry.table == table || entry.table.name == table.name)
            .map(|entry| entry.copied)
            .unwrap_or(0)
    }
}

impl Engine {
    /// Connects to both databases, introspects the source, and checks the
    /// target's schema agrees.
    pub async fn new(
        source: &dyn Driver,
        target: &dyn Driver,
        options: Options,
    ) -> Result<Engine> {
        if !source.capability().supports_schemas && !options.schemas.is_empty() {
            return Err(Error::configuration(
                "the source database does not support schemas",
            ));
        }

        let mut source_conn = source.connect().await?;
        let mut target_conn = target.connect().await?;

        let model = Model::load(source_conn.as_mut(), &options).await?;
        model.verify_target(target_conn.as_mut()).await?;

        let table_count = model.len();
        let selectors = model.tables().map(Selector::new).collect();

        Ok(Engine {
            presence: Presence::new(table_count),
            buffers: Buffers::new(table_count, options.buffer),
            selectors,
            observers: Observers::default(),
            resolving: HashSet::new(),
            target_sequences: target.capability().sequences,
            options,
            model,
            source: source_conn,
            target: target_conn,
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// What the run would copy, for display before confirmation.
    pub fn plan(&self) -> Vec<PlanEntry> {
        let mut entries: Vec<PlanEntry> = self
            .model
            .tables()
            .filter(|table| table.selection == Selection::Selected)
            .map(|table| PlanEntry {
                table: table.table.clone(),
                source_rows: table.source_rows,
                target_rows: table.target_rows,
            })
            .collect();
        entries.sort_by(|a, b| a.table.cmp(&b.table));
        entries
    }

    /// Registers a row-added observer. Observers run synchronously as each
    /// row commits; their errors are logged and swallowed.
    pub fn subscribe(&mut self, observer: Observer) {
        self.observers.subscribe(observer);
    }

    /// Runs the copy to completion and finalizes sequences.
    pub async fn run(mut self) -> Result<Summary> {
        self.run_forced().await?;
        self.run_full_tables().await?;
        self.run_main_loop().await?;
        self.flush_all().await?;
        self.finalize_sequences().await?;
        Ok(self.summary())
    }

    async fn run_forced(&mut self) -> Result<()> {
        let forced = self.options.force_rows.clone();
        for directive in forced {
            let Some(id) = self.model.resolve_named(&directive.table)? else {
                return Err(Error::configuration(format!(
                    "--force names unknown table `{}`",
                    directive.table
                )));
            };
            info!(table = %directive.table, key = %directive.key, "forcing row");

            let row = {
                let table = self.model.table(id);
                Selector::fetch_forced(self.source.as_mut(), table, &directive.key).await?
            };
            let Some(row) = row else {
                return Err(Error::forced_row_not_found(
                    directive.table.to_string(),
                    directive.key,
                ));
            };

            let depth = self.options.max_depth;
            self.propagate(id, row, true, depth).await?;
        }
        Ok(())
    }

    async fn run_full_tables(&mut self) -> Result<()> {
        let ids: Vec<TableId> = self
            .model
            .tables()
            .filter(|table| table.prioritized && table.selection == Selection::Selected)
            .map(|table| table.id)
            .collect();

        for id in ids {
            info!(table = %self.model.table(id).table, "copying table in full");
            let depth = self.options.max_depth;
            let mut offset = 0u64;
            loop {
                let rows = {
                    let table = self.model.table(id);
                    self.source
                        .scan(
                            &table.table,
                            &table.columns,
                            &table.primary_key,
                            FULL_PAGE,
                            offset,
                        )
                        .await?
                };
                let fetched = rows.len();
                offset += fetched as u64;

                for row in rows {
                    self.propagate(id, row, true, depth).await?;
                }
                if fetched < FULL_PAGE {
                    break;
                }
            }
        }
        Ok(())
    }

    async fn run_main_loop(&mut self) -> Result<()> {
        loop {
            let mut best: Option<(f64, TableId)> = None;
            for table in self.model.tables() {
                if table.selection != Selection::Selected || table.target_rows == 0 {
                    continue;
                }
                let copied = self.presence.copied(table.id);
                if copied >= table.target_rows || self.selectors[table.id.0].exhausted() {
                    continue;
                }
                let score = table.completeness(copied);
                let better = match best {
                    None => true,
                    Some((best_score, best_id)) => {
                        score < best_score
                            || (score == best_score
                                && table.table < self.model.table(best_id).table)
                    }
                };
                if better {
                    best = Some((score, table.id));
                }
            }

            let Some((score, id)) = best else { break };
            debug!(
                table = %self.model.table(id).table,
                score, "lowest completeness"
            );

            let batch = {
                let table = self.model.table(id);
                let gap = table.target_rows - self.presence.copied(id);
                let want = (gap as usize).min(BATCH);
                self.selectors[id.0]
                    .next_batch(self.source.as_mut(), table, want)
                    .await?
            };

            let depth = self.options.max_depth;
            let mut inserted = 0;
            for row in batch {
                if self.propagate(id, row, false, depth).await? {
                    inserted += 1;
                }
            }
            self.selectors[id.0].note_progress(inserted);
        }
        Ok(())
    }

    pub(crate) async fn flush_all(&mut self) -> Result<()> {
        self.buffers
            .flush(&self.model, self.target.as_mut(), &mut self.presence)
            .await
    }

    async fn finalize_sequences(&mut self) -> Result<()> {
        if !self.target_sequences {
            return Ok(());
        }

        let generated: Vec<(TableId, morsel_core::Column)> = self
            .model
            .tables()
            .filter(|table| table.selection != Selection::Excluded)
            .flat_map(|table| {
                table
                    .columns
                    .iter()
                    .filter(|column| {
                        column.auto_generated
                            && column.type_tag == morsel_core::TypeTag::Numeric
                    })
                    .map(move |column| (table.id, column.clone()))
            })
            .collect();

        for (id, column) in generated {
            if self.presence.copied(id) == 0 {
                continue;
            }
            let table_ref = self.model.table(id).table.clone();
            if let Some(max) = self.target.max_key(&table_ref, &column.name).await? {
                debug!(table = %table_ref, column = %column.name, max, "advancing sequence");
                self.target
                    .advance_sequence(&table_ref, &column, max + 1)
                    .await?;
            }
        }
        Ok(())
    }

    fn summary(&self) -> Summary {
        let mut entries: Vec<SummaryEntry> = self
            .model
            .tables()
            .filter(|table| table.selection != Selection::Excluded)
            .map(|table| SummaryEntry {
                table: table.table.clone(),
                copied: self.presence.copied(table.id),
                target_rows: table.target_rows,
            })
            .collect();
        entries.sort_by(|a, b| a.table.cmp(&b.table));
        Summary { entries }
    }
}
