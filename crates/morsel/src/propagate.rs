use crate::engine::Engine;
use crate::model::{Selection, TableId};
use crate::observe::RowAdded;

use futures::future::BoxFuture;
use morsel_core::{Error, Key, Record, Result, TableRef, Value};

use tracing::{debug, warn};

/// A parent that must exist in the target before the row commits.
struct ParentFetch {
    referred_table: TableRef,
    referred_columns: Vec<String>,
    values: Vec<Value>,
}

/// A child-expansion query to run after the row commits.
struct ChildFetch {
    child_table: TableRef,
    filter_columns: Vec<String>,
    filter: Vec<Value>,
}

impl Engine {
    /// The central recursive routine: dedup, close over parents, commit the
    /// row, then expand a bounded set of children.
    ///
    /// Returns whether the row was newly committed. Termination in cyclic
    /// graphs rests on four legs: the presence check is unconditional, a
    /// parent chase that cycles back to a row whose own closure is still in
    /// progress short-circuits instead of recursing, parent fetches carry a
    /// child budget of zero, and child expansion spends the depth budget.
    /// Dropping any one admits unbounded recursion on interlinked rows.
    pub(crate) fn propagate(
        &mut self,
        id: TableId,
        row: Record,
        prioritized: bool,
        child_budget: u32,
    ) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let (key, parents, children) = {
                let table = self.model.table(id);
                if table.selection == Selection::Excluded {
                    warn!(table = %table.table, "refusing to copy into an excluded table");
                    return Ok(false);
                }

                let key = if table.primary_key.is_empty() {
                    None
                } else {
                    Some(row.key(&table.primary_key).ok_or_else(|| {
                        Error::invalid_key(format!(
                            "row from `{}` is missing a primary-key column",
                            table.table
                        ))
                    })?)
                };

                let parents: Vec<ParentFetch> = table
                    .foreign_keys
                    .iter()
                    .filter_map(|fk| {
                        let values: Vec<Value> = fk
                            .columns
                            .iter()
                            .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                            .collect();
                        // A null anywhere in the tuple means the reference is
                        // absent; there is no parent to require.
                        if values.iter().any(Value::is_null) {
                            return None;
                        }
                        Some(ParentFetch {
                            referred_table: fk.referred_table.clone(),
                            referred_columns: fk.referred_columns.clone(),
                            values,
                        })
                    })
                    .collect();

                let children: Vec<ChildFetch> = if child_budget > 0 {
                    table
                        .child_keys
                        .iter()
                        .filter_map(|fk| {
                            let values: Vec<Value> = fk
                                .referred_columns
                                .iter()
                                .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                                .collect();
                            if values.iter().any(Value::is_null) {
                                return None;
                            }
                            Some(ChildFetch {
                                child_table: fk.table.clone(),
                                filter_columns: fk.columns.clone(),
                                filter: values,
                            })
                        })
                        .collect()
                } else {
                    vec![]
                };

                (key, parents, children)
            };

            if let Some(key) = &key {
                if self.presence.contains(id, key) {
                    return Ok(false);
                }
                // A row-level cycle resolves this same key again before its
                // closure finishes; treat the back edge as satisfied, the
                // row commits when its own closure completes.
                if !self.resolving.insert((id, key.clone())) {
                    return Ok(false);
                }
            }

            let committed = self
                .close_parents_and_commit(id, key.clone(), row, prioritized, parents)
                .await;
            if let Some(key) = key {
                self.resolving.remove(&(id, key));
            }
            if !committed? {
                return Ok(false);
            }

            for spec in children {
                let Some(child_id) = self.model.resolve(&spec.child_table) else {
                    continue;
                };
                if self.model.table(child_id).selection == Selection::Excluded {
                    continue;
                }

                // Prioritized rows pull every child; otherwise the cap is the
                // configured limit or the remaining depth, whichever is less.
                let limit = if prioritized {
                    None
                } else {
                    Some(self.options.children.min(child_budget as usize))
                };

                let child_rows = {
                    let child = self.model.table(child_id);
                    self.source
                        .fetch_matching(
                            &child.table,
                            &child.columns,
                            &spec.filter_columns,
                            &spec.filter,
                            limit,
                        )
                        .await?
                };

                for child_row in child_rows {
                    self.propagate(child_id, child_row, prioritized, child_budget - 1)
                        .await?;
                }
            }

            Ok(true)
        })
    }

    /// Resolves every required parent, then commits the row. Returns false
    /// when a parent could not be satisfied and the row must be dropped.
    async fn close_parents_and_commit(
        &mut self,
        id: TableId,
        key: Option<Key>,
        row: Record,
        prioritized: bool,
        parents: Vec<ParentFetch>,
    ) -> Result<bool> {
        for parent in parents {
            if !self.require_parent(id, &parent, prioritized).await? {
                return Ok(false);
            }
        }

        // Guard against any path that committed this key while the closure
        // ran; committing twice would double-count the copy.
        if let Some(key) = &key {
            if self.presence.contains(id, key) {
                return Ok(false);
            }
        }
        self.commit_row(id, key, row, prioritized).await?;
        Ok(true)
    }

    /// Ensures one foreign-key parent exists in the target, fetching and
    /// propagating it from the source when absent. Returns false when the
    /// child row must be dropped.
    async fn require_parent(
        &mut self,
        child: TableId,
        parent: &ParentFetch,
        prioritized: bool,
    ) -> Result<bool> {
        let Some(parent_id) = self.model.resolve(&parent.referred_table) else {
            warn!(
                child = %self.model.table(child).table,
                parent = %parent.referred_table,
                "row references a table outside the model, dropping it"
            );
            return Ok(false);
        };

        let (selection, referred_is_key) = {
            let table = self.model.table(parent_id);
            (
                table.selection,
                table.primary_key == parent.referred_columns,
            )
        };

        if selection == Selection::Excluded {
            warn!(
                child = %self.model.table(child).table,
                parent = %parent.referred_table,
                "row references an excluded table, dropping it"
            );
            return Ok(false);
        }

        if referred_is_key
            && self
                .presence
                .contains(parent_id, &Key::new(parent.values.clone()))
        {
            return Ok(true);
        }

        let fetched = {
            let table = self.model.table(parent_id);
            self.source
                .fetch_matching(
                    &table.table,
                    &table.columns,
                    &parent.referred_columns,
                    &parent.values,
                    Some(1),
                )
                .await?
        };
        let Some(parent_row) = fetched.into_iter().next() else {
            warn!(
                child = %self.model.table(child).table,
                parent = %parent.referred_table,
                "referenced parent no longer exists in the source, dropping child"
            );
            return Ok(false);
        };

        // Child budget zero: pulled parents never expand downward, or densely
        // interlinked graphs would never terminate.
        self.propagate(parent_id, parent_row, prioritized, 0).await?;
        Ok(true)
    }

    async fn commit_row(
        &mut self,
        id: TableId,
        key: Option<Key>,
        row: Record,
        prioritized: bool,
    ) -> Result<()> {
        match key {
            Some(key) => {
                debug!(table = %self.model.table(id).table, %key, "copying row");
                self.presence.add(id, key);
            }
            None => {
                debug!(table = %self.model.table(id).table, "copying keyless row");
                self.presence.add_keyless(id);
            }
        }

        {
            let table = &self.model.table(id).table;
            self.observers.notify(&RowAdded {
                table,
                row: &row,
                prioritized,
            });
        }

        if self.buffers.push(id, row) {
            self.flush_all().await?;
        }
        Ok(())
    }
}
