use crate::TableStatus;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ElefantTruncateError {
    #[error("Error from postgres: `{0}`")]
    PostgresError(#[from] tokio_postgres::Error),

    #[error("Error from postgres: `{source}` when executing query: `{query}`")]
    PostgresErrorWithQuery {
        query: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("Invalid number of results returned from query. Expected `{expected}`, got `{actual}`")]
    InvalidNumberOfResults { actual: usize, expected: usize },

    #[error("Unknown foreign key reference action '{0}'")]
    UnknownReferenceAction(String),

    #[error("Unknown keyword category '{0}'")]
    InvalidKeywordType(String),

    #[error("Failed to fetch table schemas: {0}")]
    SchemaFetch(#[source] Box<ElefantTruncateError>),

    #[error("Tables not found: {}", .0.join(", "))]
    TablesNotFound(Vec<String>),

    #[error("Priority must be in [0, 3], got {0}")]
    InvalidPriority(i32),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Dependency cycle detected between tables: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("Table `{table}` cannot go from {from} to {to}")]
    InvalidStatusTransition {
        table: String,
        from: TableStatus,
        to: TableStatus,
    },

    #[error("Failed to count rows of `{table}`: {source}")]
    Analysis {
        table: String,
        #[source]
        source: Box<ElefantTruncateError>,
    },

    #[error("Failed to delete rows from `{table}`: {source}")]
    DeleteExecution {
        table: String,
        #[source]
        source: Box<ElefantTruncateError>,
    },

    #[error("The deletion was cancelled")]
    Cancelled,

    #[error("The deletion did not complete within {0:?}")]
    Timeout(Duration),

    #[error("A table worker stopped unexpectedly: {0}")]
    WorkerPanicked(String),

    #[error("io error: `{0}`")]
    IoError(#[from] std::io::Error),
}

impl ElefantTruncateError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ElefantTruncateError::Cancelled)
    }
}

pub type Result<T = ()> = std::result::Result<T, ElefantTruncateError>;
