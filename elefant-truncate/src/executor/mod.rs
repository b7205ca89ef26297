use crate::{DeleteStatement, ElefantTruncateError, IdentifierQuoter, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mod connection_pool;
mod postgres;
#[cfg(test)]
pub(crate) mod recording;

pub use postgres::PostgresStatementExecutor;

/// How eagerly deletes should compete with the rest of the load on the database.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd)]
pub enum DeletePriority {
    #[default]
    Unspecified,
    Low,
    Medium,
    High,
}

impl DeletePriority {
    /// The pause between two delete batches.
    pub fn batch_pause(self) -> Duration {
        match self {
            DeletePriority::Unspecified | DeletePriority::High => Duration::ZERO,
            DeletePriority::Medium => Duration::from_millis(50),
            DeletePriority::Low => Duration::from_millis(250),
        }
    }

    /// The batch size to use for this priority.
    pub fn batch_size(self, batch_size: usize) -> usize {
        match self {
            DeletePriority::Low => (batch_size / 2).max(1),
            _ => batch_size,
        }
    }
}

impl TryFrom<i32> for DeletePriority {
    type Error = ElefantTruncateError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(DeletePriority::Unspecified),
            1 => Ok(DeletePriority::Low),
            2 => Ok(DeletePriority::Medium),
            3 => Ok(DeletePriority::High),
            _ => Err(ElefantTruncateError::InvalidPriority(value)),
        }
    }
}

impl From<DeletePriority> for i32 {
    fn from(value: DeletePriority) -> Self {
        match value {
            DeletePriority::Unspecified => 0,
            DeletePriority::Low => 1,
            DeletePriority::Medium => 2,
            DeletePriority::High => 3,
        }
    }
}

/// Runs the statements of the deletion against a database.
pub trait StatementExecutor: Send + Sync + 'static {
    fn get_identifier_quoter(&self) -> Arc<IdentifierQuoter>;

    /// Counts the rows the statement would delete.
    fn count_rows(
        &self,
        statement: &DeleteStatement,
        cancellation: &CancellationToken,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Deletes the rows selected by the statement and returns how many were deleted.
    ///
    /// `progress` is called with the number of rows deleted so far whenever that is known.
    /// When `cancellation` is cancelled the running work is aborted and `Cancelled` is returned.
    fn execute_delete(
        &self,
        statement: &DeleteStatement,
        priority: DeletePriority,
        progress: &(dyn Fn(u64) + Send + Sync),
        cancellation: &CancellationToken,
    ) -> impl Future<Output = Result<u64>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_priorities() {
        assert_eq!(DeletePriority::try_from(0).unwrap(), DeletePriority::Unspecified);
        assert_eq!(DeletePriority::try_from(3).unwrap(), DeletePriority::High);
        assert_eq!(i32::from(DeletePriority::Medium), 2);
        assert!(matches!(
            DeletePriority::try_from(4),
            Err(ElefantTruncateError::InvalidPriority(4))
        ));
        assert!(matches!(
            DeletePriority::try_from(-1),
            Err(ElefantTruncateError::InvalidPriority(-1))
        ));
    }

    #[test]
    fn low_priority_uses_smaller_batches() {
        assert_eq!(DeletePriority::Low.batch_size(1000), 500);
        assert_eq!(DeletePriority::Low.batch_size(1), 1);
        assert_eq!(DeletePriority::High.batch_size(1000), 1000);
        assert!(DeletePriority::Low.batch_pause() > DeletePriority::Medium.batch_pause());
    }
}
