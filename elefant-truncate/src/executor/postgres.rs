use crate::executor::connection_pool::ConnectionPool;
use crate::{
    DeletePriority, DeleteStatement, ElefantTruncateError, IdentifierQuoter, PostgresClientWrapper,
    Result, StatementExecutor,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Runs the deletion against a Postgres database.
///
/// Every statement runs on its own connection, so tables can be processed in parallel. Deletes
/// of tables with a primary key are split into batches, which reports progress along the way
/// and keeps the individual transactions short.
pub struct PostgresStatementExecutor {
    main_connection: PostgresClientWrapper,
    connection_pool: ConnectionPool,
    identifier_quoter: Arc<IdentifierQuoter>,
    batch_size: usize,
}

impl PostgresStatementExecutor {
    pub async fn new(connection: &PostgresClientWrapper) -> Result<Self> {
        let main_connection = connection.create_another_connection().await?;
        let identifier_quoter = Arc::new(IdentifierQuoter::load(&main_connection).await?);

        Ok(PostgresStatementExecutor {
            main_connection,
            connection_pool: ConnectionPool::new(),
            identifier_quoter,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Sets the maximum number of rows removed by a single delete statement.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn get_connection(&self) -> Result<PostgresClientWrapper> {
        self.connection_pool
            .get_connection(&self.main_connection)
            .await
    }

    /// Hands the connection back to the pool once the statement finished. If the statement was
    /// interrupted by cancellation it is cancelled on the server as well, and the connection is
    /// closed instead.
    async fn finish<T>(
        &self,
        connection: PostgresClientWrapper,
        result: Option<Result<T>>,
    ) -> Result<T> {
        match result {
            Some(result) => {
                self.connection_pool.release_connection(connection).await;
                result
            }
            None => {
                if let Err(e) = connection.cancel_running_statement().await {
                    debug!("Failed to cancel running statement: {e}");
                }
                Err(ElefantTruncateError::Cancelled)
            }
        }
    }
}

impl StatementExecutor for PostgresStatementExecutor {
    fn get_identifier_quoter(&self) -> Arc<IdentifierQuoter> {
        self.identifier_quoter.clone()
    }

    #[instrument(skip_all, fields(table = %statement.table))]
    async fn count_rows(
        &self,
        statement: &DeleteStatement,
        cancellation: &CancellationToken,
    ) -> Result<u64> {
        let sql = statement.count_sql();
        let connection = self.get_connection().await?;

        let result = tokio::select! {
            count = connection.get_single_result::<i64>(&sql) => Some(count),
            _ = cancellation.cancelled() => None,
        };

        let count = self.finish(connection, result).await?;
        Ok(count.max(0) as u64)
    }

    #[instrument(skip_all, fields(table = %statement.table, ?priority))]
    async fn execute_delete(
        &self,
        statement: &DeleteStatement,
        priority: DeletePriority,
        progress: &(dyn Fn(u64) + Send + Sync),
        cancellation: &CancellationToken,
    ) -> Result<u64> {
        let batch_size = priority.batch_size(self.batch_size);
        let connection = self.get_connection().await?;

        let result = match statement.batch_delete_sql(batch_size) {
            Some(batch_sql) => {
                tokio::select! {
                    deleted = delete_in_batches(&connection, &batch_sql, priority, progress) => Some(deleted),
                    _ = cancellation.cancelled() => None,
                }
            }
            None => {
                debug!("Table has no primary key, deleting in a single statement");
                let sql = statement.delete_sql();
                tokio::select! {
                    deleted = connection.execute(&sql) => Some(deleted),
                    _ = cancellation.cancelled() => None,
                }
            }
        };

        let deleted = self.finish(connection, result).await?;
        progress(deleted);
        Ok(deleted)
    }
}

/// Repeats the batch statement until it no longer finds anything to delete.
async fn delete_in_batches(
    connection: &PostgresClientWrapper,
    batch_sql: &str,
    priority: DeletePriority,
    progress: &(dyn Fn(u64) + Send + Sync),
) -> Result<u64> {
    let pause = priority.batch_pause();
    let mut deleted = 0;

    loop {
        let affected = connection.execute(batch_sql).await?;
        if affected == 0 {
            break;
        }

        deleted += affected;
        progress(deleted);

        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }

    debug!(deleted, "Finished deleting batches");
    Ok(deleted)
}
