use crate::{ElefantTruncateError, Result, TableName};
use std::fmt::{Display, Formatter};

/// Where a table is in its deletion.
///
/// ```text
/// Analyzing ─┬─> Waiting ──> Deleting ──> Completed
///            ├─> Deleting ──> Completed
///            └─> CascadeDeleting ──> Completed
/// ```
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TableStatus {
    /// Counting the rows to delete and working out how the table gets deleted.
    Analyzing,
    /// Waiting for referencing tables to be emptied first.
    Waiting,
    /// The delete statement of the table is running.
    Deleting,
    /// The rows are removed by the `on delete cascade` of a parent table being deleted.
    CascadeDeleting,
    Completed,
}

impl TableStatus {
    pub fn can_transition_to(self, next: TableStatus) -> bool {
        use TableStatus::*;

        matches!(
            (self, next),
            (Analyzing, Waiting | Deleting | CascadeDeleting)
                | (Waiting, Deleting)
                | (Deleting | CascadeDeleting, Completed)
        )
    }

    pub fn is_completed(self) -> bool {
        self == TableStatus::Completed
    }

    /// If rows of the table are being removed, or already have been.
    pub fn has_started_deleting(self) -> bool {
        matches!(
            self,
            TableStatus::Deleting | TableStatus::CascadeDeleting | TableStatus::Completed
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            TableStatus::Analyzing => "analyzing",
            TableStatus::Waiting => "waiting",
            TableStatus::Deleting | TableStatus::CascadeDeleting => "deleting",
            TableStatus::Completed => "completed",
        }
    }
}

impl Display for TableStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A point in time view of the deletion of a single table.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TableSnapshot {
    pub table_name: TableName,
    pub status: TableStatus,
    /// The number of rows to delete. Known once analysis has finished, and never changed after.
    pub total_rows: Option<u64>,
    /// The number of rows still to delete. Never increases, and is 0 once completed.
    ///
    /// A table that had rows reports at least 1 until it is completed. A table without any rows
    /// reports 0 from the end of analysis, before its delete statement has run.
    pub remained_rows: Option<u64>,
}

impl TableSnapshot {
    pub fn new(table_name: TableName) -> Self {
        TableSnapshot {
            table_name,
            status: TableStatus::Analyzing,
            total_rows: None,
            remained_rows: None,
        }
    }

    pub fn deleted_rows(&self) -> u64 {
        match (self.total_rows, self.remained_rows) {
            (Some(total), Some(remained)) => total.saturating_sub(remained),
            _ => 0,
        }
    }

    /// Moves to the next status, failing if the transition is not allowed.
    pub fn transition(&mut self, next: TableStatus) -> Result {
        if !self.status.can_transition_to(next) {
            return Err(ElefantTruncateError::InvalidStatusTransition {
                table: self.table_name.to_string(),
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        if next.is_completed() {
            self.remained_rows = Some(0);
        }

        Ok(())
    }

    /// Records the row count found during analysis.
    pub(crate) fn set_total_rows(&mut self, total_rows: u64) {
        if self.total_rows.is_none() {
            self.total_rows = Some(total_rows);
            self.remained_rows = Some(total_rows);
        }
    }

    /// Lowers the number of remaining rows. Returns if anything changed.
    ///
    /// Until the table is completed at least one row is reported as remaining, so for a table
    /// that had rows 0 is only ever seen together with `Completed`.
    pub(crate) fn lower_remained_rows(&mut self, remained_rows: u64) -> bool {
        if self.status.is_completed() {
            return false;
        }

        match self.remained_rows {
            Some(current) if current > 0 => {
                let remained_rows = remained_rows.max(1);
                if remained_rows < current {
                    self.remained_rows = Some(remained_rows);
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }
}
