use crate::parallel_runner::ParallelRunner;
use crate::{
    DeletePriority, DeleteStatement, ElefantTruncateError, Result, StatementExecutor, TableSnapshot,
    TableStatus,
};
use futures::future::{select_all, try_join_all};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Deletes the rows of a single table, publishing its progress through a watch channel.
///
/// The channel doubles as the completion signal other tables wait for.
pub(crate) struct TableDeleter<E: StatementExecutor> {
    pub statement: DeleteStatement,
    pub executor: Arc<E>,
    pub snapshot: watch::Sender<TableSnapshot>,
    /// The parents whose delete removes the rows of this table.
    pub cascade_cover: Vec<watch::Receiver<TableSnapshot>>,
    /// The tables that have to be completed before this table can be deleted.
    pub wait_for: Vec<watch::Receiver<TableSnapshot>>,
    pub runner: ParallelRunner,
    pub cancellation: CancellationToken,
    pub priority: DeletePriority,
    pub row_count_interval: Duration,
}

impl<E: StatementExecutor> TableDeleter<E> {
    #[instrument(skip_all, fields(table = %self.statement.table))]
    pub async fn run(self) -> Result {
        self.analyze().await?;

        if !self.cascade_cover.is_empty() {
            return self.delete_by_cascade().await;
        }

        let pending = self
            .wait_for
            .iter()
            .filter(|r| !r.borrow().status.is_completed())
            .cloned()
            .collect::<Vec<_>>();

        if !pending.is_empty() {
            self.transition(TableStatus::Waiting)?;
            debug!("Waiting for {} referencing tables", pending.len());
            self.cancellable(try_join_all(
                pending
                    .into_iter()
                    .map(|r| wait_for_status(r, TableStatus::is_completed)),
            ))
            .await?;
        }

        self.transition(TableStatus::Deleting)?;
        self.delete().await?;
        self.transition(TableStatus::Completed)?;
        info!("All rows deleted");

        Ok(())
    }

    fn transition(&self, next: TableStatus) -> Result {
        let mut result = Ok(());
        self.snapshot.send_if_modified(|s| match s.transition(next) {
            Ok(()) => true,
            Err(e) => {
                result = Err(e);
                false
            }
        });

        if result.is_ok() {
            debug!("Status changed to {next}");
        }

        result
    }

    async fn analyze(&self) -> Result {
        let count = self
            .runner
            .run(
                &self.cancellation,
                self.executor.count_rows(&self.statement, &self.cancellation),
            )
            .await
            .and_then(|r| r)
            .map_err(|e| self.wrap_error(e, |table, source| ElefantTruncateError::Analysis { table, source }))?;

        debug!(rows = count, "Counted rows to delete");
        self.snapshot.send_modify(|s| s.set_total_rows(count));

        Ok(())
    }

    async fn delete_by_cascade(&self) -> Result {
        let parent = self
            .cancellable(wait_for_any(&self.cascade_cover, TableStatus::has_started_deleting))
            .await?;

        self.transition(TableStatus::CascadeDeleting)?;
        info!("Rows are being deleted by cascade");

        let parent = self.cascade_cover[parent].clone();
        self.while_tracking_rows(self.cancellable(wait_for_status(parent, TableStatus::is_completed)))
            .await?;

        self.transition(TableStatus::Completed)?;
        info!("All rows deleted by cascade");

        Ok(())
    }

    async fn delete(&self) -> Result {
        let total = self.snapshot.borrow().total_rows.unwrap_or(0);
        let progress = |deleted: u64| {
            self.snapshot
                .send_if_modified(|s| s.lower_remained_rows(total.saturating_sub(deleted)));
        };

        let delete = self.runner.run(
            &self.cancellation,
            self.executor.execute_delete(
                &self.statement,
                self.priority,
                &progress,
                &self.cancellation,
            ),
        );

        let deleted = self.while_tracking_rows(delete).await.and_then(|r| r).map_err(|e| {
            self.wrap_error(e, |table, source| ElefantTruncateError::DeleteExecution { table, source })
        })?;
        debug!(deleted, "Delete statement finished");

        Ok(())
    }

    /// Runs `work` while recounting the remaining rows. Once `work` is done the recount is
    /// cancelled and awaited, so no count statement is left running on the server.
    async fn while_tracking_rows<T>(&self, work: impl Future<Output = Result<T>>) -> Result<T> {
        let tracking = self.cancellation.child_token();

        let (result, ()) = tokio::join!(
            async {
                let result = work.await;
                tracking.cancel();
                result
            },
            self.track_remaining_rows(&tracking),
        );

        result
    }

    /// Keeps lowering the remaining rows by recounting them until `tracking` is cancelled.
    async fn track_remaining_rows(&self, tracking: &CancellationToken) {
        let period = self.row_count_interval.max(Duration::from_millis(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = tracking.cancelled() => return,
            }

            match self.executor.count_rows(&self.statement, tracking).await {
                Ok(remaining) => {
                    self.snapshot
                        .send_if_modified(|s| s.lower_remained_rows(remaining));
                }
                Err(e) if e.is_cancelled() => return,
                Err(e) => debug!("Failed to count remaining rows: {e}"),
            }
        }
    }

    async fn cancellable<T>(&self, future: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            result = future => result,
            _ = self.cancellation.cancelled() => Err(ElefantTruncateError::Cancelled),
        }
    }

    fn wrap_error(
        &self,
        error: ElefantTruncateError,
        wrap: impl FnOnce(String, Box<ElefantTruncateError>) -> ElefantTruncateError,
    ) -> ElefantTruncateError {
        if error.is_cancelled() {
            error
        } else {
            wrap(self.statement.table.to_string(), Box::new(error))
        }
    }
}

/// Waits until the table reaches a status. Fails with `Cancelled` if the worker of the table
/// stopped without reaching it.
async fn wait_for_status(
    mut receiver: watch::Receiver<TableSnapshot>,
    reached: fn(TableStatus) -> bool,
) -> Result {
    loop {
        if reached(receiver.borrow_and_update().status) {
            return Ok(());
        }

        if receiver.changed().await.is_err() {
            return if reached(receiver.borrow().status) {
                Ok(())
            } else {
                Err(ElefantTruncateError::Cancelled)
            };
        }
    }
}

/// Waits until any of the tables reaches a status and returns its position.
async fn wait_for_any(
    receivers: &[watch::Receiver<TableSnapshot>],
    reached: fn(TableStatus) -> bool,
) -> Result<usize> {
    let waits = receivers
        .iter()
        .cloned()
        .map(|r| Box::pin(wait_for_status(r, reached)));

    let (result, index, _) = select_all(waits).await;
    result.map(|_| index)
}
