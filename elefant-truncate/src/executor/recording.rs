//! An in memory stand-in for a database, recording the statements the deletion runs.

use crate::{
    DeletePriority, DeleteStatement, ElefantTruncateError, IdentifierQuoter, Result, RowFilter,
    StatementExecutor, TableName,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// The number of steps a delete is split into, each reporting progress.
const DELETE_STEPS: u32 = 4;

#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum Event {
    Count(TableName),
    CountCancelled(TableName),
    DeleteStarted {
        table: TableName,
        predicate: Option<String>,
        priority: DeletePriority,
    },
    DeleteFinished(TableName),
}

#[derive(Default)]
struct FakeTable {
    /// The value of the filter column of every row.
    rows: Vec<String>,
    /// Tables whose rows are removed together with the rows of this table.
    cascading_children: Vec<TableName>,
    /// Tables that prevent this table from being deleted while they have rows.
    restricting_children: Vec<TableName>,
    delete_duration: Duration,
    count_duration: Duration,
    fail_count: bool,
    fail_delete: bool,
}

#[derive(Default)]
pub(crate) struct RecordingExecutor {
    tables: Mutex<HashMap<TableName, FakeTable>>,
    events: Mutex<Vec<Event>>,
}

pub(crate) fn name(table: &str) -> TableName {
    TableName::parse(table)
}

fn row_selected(filter: &RowFilter, value: &str) -> bool {
    match filter {
        RowFilter::All => true,
        RowFilter::Values { values, .. } => values.iter().any(|v| v == value),
        RowFilter::Range { lower, upper, .. } => {
            lower.as_deref().map_or(true, |l| value >= l) && upper.as_deref().map_or(true, |u| value < u)
        }
    }
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(self, table: &str, update: impl FnOnce(&mut FakeTable)) -> Self {
        update(
            self.tables
                .lock()
                .unwrap()
                .entry(name(table))
                .or_default(),
        );
        self
    }

    /// Adds a table holding rows with the given filter column values.
    pub fn with_rows(self, table: &str, rows: &[&str]) -> Self {
        let rows = rows.iter().map(|r| r.to_string()).collect();
        self.update(table, |t| t.rows = rows)
    }

    /// Adds a table with `count` rows, all with the same filter column value.
    pub fn with_row_count(self, table: &str, count: usize) -> Self {
        self.update(table, |t| t.rows = vec!["row".to_string(); count])
    }

    pub fn with_cascade(self, parent: &str, child: &str) -> Self {
        self.update(parent, |t| t.cascading_children.push(name(child)))
    }

    pub fn with_restriction(self, parent: &str, child: &str) -> Self {
        self.update(parent, |t| t.restricting_children.push(name(child)))
    }

    pub fn with_delete_duration(self, table: &str, duration: Duration) -> Self {
        self.update(table, |t| t.delete_duration = duration)
    }

    /// Changes how long counting the rows of a table takes, also while a deletion is running.
    pub fn set_count_duration(&self, table: &str, duration: Duration) {
        self.tables
            .lock()
            .unwrap()
            .entry(name(table))
            .or_default()
            .count_duration = duration;
    }

    pub fn with_failing_count(self, table: &str) -> Self {
        self.update(table, |t| t.fail_count = true)
    }

    pub fn with_failing_delete(self, table: &str) -> Self {
        self.update(table, |t| t.fail_delete = true)
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn deleted_tables(&self) -> Vec<TableName> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::DeleteStarted { table, .. } => Some(table),
                _ => None,
            })
            .collect()
    }

    pub fn rows(&self, table: &str) -> usize {
        self.tables
            .lock()
            .unwrap()
            .get(&name(table))
            .map_or(0, |t| t.rows.len())
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    fn selected_rows(&self, table: &TableName, filter: &RowFilter) -> u64 {
        self.tables.lock().unwrap().get(table).map_or(0, |t| {
            t.rows.iter().filter(|r| row_selected(filter, r)).count() as u64
        })
    }

    /// Removes up to `limit` selected rows and returns how many were removed.
    fn remove_rows(&self, table: &TableName, filter: &RowFilter, limit: u64) -> u64 {
        let mut tables = self.tables.lock().unwrap();
        let Some(table) = tables.get_mut(table) else {
            return 0;
        };

        let mut removed = 0;
        table.rows.retain(|r| {
            if removed < limit && row_selected(filter, r) {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    fn cascade(&self, table: &TableName, filter: &RowFilter) {
        let children = self
            .tables
            .lock()
            .unwrap()
            .get(table)
            .map(|t| t.cascading_children.clone())
            .unwrap_or_default();

        for child in children {
            self.remove_rows(&child, filter, u64::MAX);
            self.cascade(&child, filter);
        }
    }

    /// Fails if the delete, or a delete it cascades to, would leave rows referencing nothing.
    fn check_restrictions(&self, table: &TableName, filter: &RowFilter) -> Result {
        let (restricting, cascading) = self
            .behaviour(table, |t| {
                (t.restricting_children.clone(), t.cascading_children.clone())
            })
            .unwrap_or_default();

        for child in cascading {
            self.check_restrictions(&child, filter)?;
        }

        for child in restricting {
            if self.selected_rows(&child, filter) > 0 {
                return Err(ElefantTruncateError::IoError(std::io::Error::other(format!(
                    "delete on {table} violates foreign key constraint of {child}"
                ))));
            }
        }

        Ok(())
    }

    fn behaviour<T>(&self, table: &TableName, get: impl FnOnce(&FakeTable) -> T) -> Option<T> {
        self.tables.lock().unwrap().get(table).map(get)
    }
}

impl StatementExecutor for Arc<RecordingExecutor> {
    fn get_identifier_quoter(&self) -> Arc<IdentifierQuoter> {
        Arc::new(IdentifierQuoter::empty())
    }

    async fn count_rows(
        &self,
        statement: &DeleteStatement,
        cancellation: &CancellationToken,
    ) -> Result<u64> {
        self.record(Event::Count(statement.table.clone()));
        tokio::task::yield_now().await;

        let duration = self
            .behaviour(&statement.table, |t| t.count_duration)
            .unwrap_or_default();
        tokio::select! {
            _ = tokio::time::sleep(duration) => {},
            _ = cancellation.cancelled() => {
                self.record(Event::CountCancelled(statement.table.clone()));
                return Err(ElefantTruncateError::Cancelled);
            }
        }

        if cancellation.is_cancelled() {
            return Err(ElefantTruncateError::Cancelled);
        }

        if self.behaviour(&statement.table, |t| t.fail_count).unwrap_or(false) {
            return Err(ElefantTruncateError::IoError(std::io::Error::other(
                "count failed",
            )));
        }

        Ok(self.selected_rows(&statement.table, &statement.filter))
    }

    async fn execute_delete(
        &self,
        statement: &DeleteStatement,
        priority: DeletePriority,
        progress: &(dyn Fn(u64) + Send + Sync),
        cancellation: &CancellationToken,
    ) -> Result<u64> {
        let table = &statement.table;
        self.record(Event::DeleteStarted {
            table: table.clone(),
            predicate: statement.predicate().map(str::to_string),
            priority,
        });

        let (duration, fail) = self
            .behaviour(table, |t| (t.delete_duration, t.fail_delete))
            .unwrap_or_default();

        if fail {
            return Err(ElefantTruncateError::IoError(std::io::Error::other(
                "delete failed",
            )));
        }
        self.check_restrictions(table, &statement.filter)?;

        let selected = self.selected_rows(table, &statement.filter);
        let step_size = selected.div_ceil(DELETE_STEPS as u64).max(1);
        let mut deleted = 0;

        for _ in 0..DELETE_STEPS {
            tokio::select! {
                _ = tokio::time::sleep(duration / DELETE_STEPS) => {},
                _ = cancellation.cancelled() => return Err(ElefantTruncateError::Cancelled),
            }

            deleted += self.remove_rows(table, &statement.filter, step_size);
            progress(deleted);
        }

        self.cascade(table, &statement.filter);
        self.record(Event::DeleteFinished(table.clone()));

        Ok(deleted)
    }
}
