use crate::deleter::TableDeleter;
use crate::parallel_runner::ParallelRunner;
use crate::{
    DeletePriority, DeleteStatement, DependencyForest, ElefantTruncateError, Result, RowFilter,
    StatementExecutor, TableSchema, TableSnapshot,
};
use itertools::Itertools;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_ROW_COUNT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct TruncateOptions {
    /// Which rows to delete from every table.
    pub filter: RowFilter,
    pub priority: DeletePriority,
    /// How long the whole deletion may take before it is cancelled.
    pub timeout: Duration,
    /// How many count or delete statements may run at the same time.
    pub max_parallelism: NonZeroUsize,
    /// How often the remaining rows of tables being deleted are recounted.
    pub row_count_interval: Duration,
}

impl Default for TruncateOptions {
    fn default() -> Self {
        Self {
            filter: RowFilter::All,
            priority: DeletePriority::Unspecified,
            timeout: DEFAULT_TIMEOUT,
            max_parallelism: std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
            row_count_interval: DEFAULT_ROW_COUNT_INTERVAL,
        }
    }
}

/// Deletes the rows of a set of tables, running a worker per table.
///
/// Tables are deleted after every table referencing them, unless the rows are removed by an
/// `on delete cascade` anyway. Independent tables are deleted in parallel.
pub struct Coordinator<E: StatementExecutor> {
    forest: DependencyForest,
    statements: Vec<DeleteStatement>,
    executor: Arc<E>,
    options: TruncateOptions,
    /// Handed to the workers when started.
    senders: Vec<watch::Sender<TableSnapshot>>,
    receivers: Vec<watch::Receiver<TableSnapshot>>,
    cancellation: CancellationToken,
    workers: JoinSet<(usize, Result)>,
    deadline: Option<Instant>,
}

impl<E: StatementExecutor> Coordinator<E> {
    pub fn new(mut schemas: Vec<TableSchema>, executor: E, options: TruncateOptions) -> Result<Self> {
        schemas.sort_by(|a, b| a.name.cmp(&b.name));

        let forest = DependencyForest::build(schemas, options.filter.is_all())?;

        let quoter = executor.get_identifier_quoter();
        let statements = forest
            .nodes()
            .iter()
            .map(|n| DeleteStatement::new(&n.schema, &options.filter, &quoter))
            .collect_vec();

        let (senders, receivers) = forest
            .nodes()
            .iter()
            .map(|n| watch::channel(TableSnapshot::new(n.schema.name.clone())))
            .unzip();

        Ok(Coordinator {
            forest,
            statements,
            executor: Arc::new(executor),
            options,
            senders,
            receivers,
            cancellation: CancellationToken::new(),
            workers: JoinSet::new(),
            deadline: None,
        })
    }

    /// The statements that will be executed, one per table, sorted by table name.
    pub fn delete_statements(&self) -> &[DeleteStatement] {
        &self.statements
    }

    pub fn snapshots(&self) -> Vec<TableSnapshot> {
        self.receivers.iter().map(|r| r.borrow().clone()).collect()
    }

    /// Live progress of every table, in the same order as `delete_statements`.
    pub fn subscribe(&self) -> Vec<watch::Receiver<TableSnapshot>> {
        self.receivers.clone()
    }

    /// Cancelling the token stops the deletion. Tables already deleted stay deleted.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Starts a worker for every table. Does nothing if already started.
    #[instrument(skip_all)]
    pub fn start(&mut self) {
        if self.deadline.is_some() {
            return;
        }

        let now = Instant::now();
        self.deadline = Some(
            now.checked_add(self.options.timeout)
                .unwrap_or_else(|| now + DEFAULT_TIMEOUT * 365 * 100),
        );

        let runner = ParallelRunner::new(self.options.max_parallelism);
        let senders = std::mem::take(&mut self.senders);

        info!("Starting deletion of {} tables", senders.len());

        for (index, sender) in senders.into_iter().enumerate() {
            let node = self.forest.node(index);

            let deleter = TableDeleter {
                statement: self.statements[index].clone(),
                executor: self.executor.clone(),
                snapshot: sender,
                cascade_cover: node
                    .cascade_cover
                    .iter()
                    .map(|&i| self.receivers[i].clone())
                    .collect(),
                wait_for: node
                    .wait_set
                    .iter()
                    .map(|&i| self.receivers[i].clone())
                    .collect(),
                runner: runner.clone(),
                cancellation: self.cancellation.clone(),
                priority: self.options.priority,
                row_count_interval: self.options.row_count_interval,
            };

            self.workers
                .spawn(async move { (index, deleter.run().await) });
        }
    }

    /// Waits until every table is deleted.
    ///
    /// On the first failure every other worker is cancelled and that failure is returned once
    /// all workers have stopped. Tables that completed before stay deleted.
    #[instrument(skip_all)]
    pub async fn wait_completed(mut self) -> Result {
        self.start();
        let deadline = self.deadline.unwrap_or_else(Instant::now);

        let mut failure = None;
        let mut cancelled = false;
        let mut timed_out = false;

        loop {
            let next = if timed_out {
                self.workers.join_next().await
            } else {
                match tokio::time::timeout_at(deadline, self.workers.join_next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!("Deletion did not finish within {:?}, cancelling", self.options.timeout);
                        timed_out = true;
                        self.cancellation.cancel();
                        failure.get_or_insert(ElefantTruncateError::Timeout(self.options.timeout));
                        continue;
                    }
                }
            };

            let Some(joined) = next else {
                break;
            };

            let error = match joined {
                Ok((_, Ok(()))) => continue,
                Ok((index, Err(e))) => {
                    let table = &self.forest.node(index).schema.name;
                    if e.is_cancelled() {
                        debug!(%table, "Worker was cancelled");
                        cancelled = true;
                        continue;
                    }
                    error!(%table, "Failed to delete rows: {e}");
                    e
                }
                Err(e) => ElefantTruncateError::WorkerPanicked(e.to_string()),
            };

            if failure.is_none() {
                failure = Some(error);
                self.cancellation.cancel();
            }
        }

        if let Some(failure) = failure {
            return Err(failure);
        }

        if cancelled {
            return Err(ElefantTruncateError::Cancelled);
        }

        info!("All tables have been deleted");
        Ok(())
    }
}
