use crate::{ElefantTruncateError, Result};
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Limits how many statements run against the database at the same time.
#[derive(Clone)]
pub(crate) struct ParallelRunner {
    permits: Arc<Semaphore>,
}

impl ParallelRunner {
    pub fn new(max_parallelism: NonZeroUsize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_parallelism.get())),
        }
    }

    /// Runs `run` once a permit is available. Waiting for the permit stops when cancelled.
    pub async fn run<F: Future>(&self, cancellation: &CancellationToken, run: F) -> Result<F::Output> {
        let permit = tokio::select! {
            permit = self.permits.acquire() => permit.map_err(|_| ElefantTruncateError::Cancelled)?,
            _ = cancellation.cancelled() => return Err(ElefantTruncateError::Cancelled),
        };

        let result = run.await;

        drop(permit);

        Ok(result)
    }
}
