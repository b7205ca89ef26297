use crate::{ElefantTruncateError, Result};
use itertools::Itertools;
use std::fmt::Display;
use tokio::task::JoinHandle;
use tokio_postgres::row::RowIndex;
use tokio_postgres::types::FromSqlOwned;
use tokio_postgres::{Client, NoTls, Row};
use tracing::debug;

pub struct PostgresClientWrapper {
    client: Client,
    join_handle: JoinHandle<Result<()>>,
    connection_string: String,
}

impl PostgresClientWrapper {
    pub async fn new(connection_string: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(connection_string, NoTls).await?;

        // The connection object performs the actual communication with the database,
        // so spawn it off to run on its own.
        let join_handle = tokio::spawn(async move {
            match connection.await {
                Err(e) => Err(ElefantTruncateError::PostgresError(e)),
                Ok(_) => Ok(()),
            }
        });

        Ok(PostgresClientWrapper {
            client,
            join_handle,
            connection_string: connection_string.to_string(),
        })
    }

    /// Opens a new connection to the same database. Used when statements have to run in parallel,
    /// as a single connection only executes one statement at a time.
    pub async fn create_another_connection(&self) -> Result<Self> {
        Self::new(&self.connection_string).await
    }

    pub async fn execute_non_query(&self, sql: &str) -> Result {
        self.client
            .batch_execute(sql)
            .await
            .map_err(|e| ElefantTruncateError::PostgresErrorWithQuery {
                source: e,
                query: sql.to_string(),
            })?;

        Ok(())
    }

    /// Executes a single statement and returns the number of affected rows.
    pub async fn execute(&self, sql: &str) -> Result<u64> {
        self.client
            .execute(sql, &[])
            .await
            .map_err(|e| ElefantTruncateError::PostgresErrorWithQuery {
                source: e,
                query: sql.to_string(),
            })
    }

    pub async fn get_results<T: FromRow>(&self, sql: &str) -> Result<Vec<T>> {
        let query_results = self.client.query(sql, &[]).await.map_err(|e| {
            ElefantTruncateError::PostgresErrorWithQuery {
                source: e,
                query: sql.to_string(),
            }
        })?;

        let mut output = Vec::with_capacity(query_results.len());

        for row in query_results.into_iter() {
            output.push(T::from_row(row)?);
        }

        Ok(output)
    }

    pub async fn get_result<T: FromRow>(&self, sql: &str) -> Result<T> {
        let results = self.get_results(sql).await?;
        let actual = results.len();

        results
            .into_iter()
            .exactly_one()
            .map_err(|_| ElefantTruncateError::InvalidNumberOfResults {
                actual,
                expected: 1,
            })
    }

    pub async fn get_single_results<T: FromSqlOwned>(&self, sql: &str) -> Result<Vec<T>> {
        let r = self
            .get_results::<(T,)>(sql)
            .await?
            .into_iter()
            .map(|t| t.0)
            .collect();

        Ok(r)
    }

    pub async fn get_single_result<T: FromSqlOwned>(&self, sql: &str) -> Result<T> {
        let result = self.get_result::<(T,)>(sql).await?;
        Ok(result.0)
    }

    /// Asks the server to abort whatever statement is currently running on this connection.
    pub async fn cancel_running_statement(&self) -> Result {
        debug!("Requesting cancellation of the running statement");
        self.client.cancel_token().cancel_query(NoTls).await?;
        Ok(())
    }
}

impl Drop for PostgresClientWrapper {
    fn drop(&mut self) {
        self.join_handle.abort();
    }
}

pub trait FromRow: Sized {
    fn from_row(row: Row) -> Result<Self>;
}

impl<T1: FromSqlOwned> FromRow for (T1,) {
    fn from_row(row: Row) -> Result<Self> {
        Ok((row.try_get(0)?,))
    }
}

pub(crate) trait FromPgChar: Sized {
    fn from_pg_char(c: char) -> Result<Self>;
}

pub(crate) trait RowEnumExt {
    fn try_get_enum_value<T: FromPgChar, I: RowIndex + Display>(&self, idx: I) -> Result<T>;
}

impl RowEnumExt for Row {
    fn try_get_enum_value<T: FromPgChar, I: RowIndex + Display>(&self, idx: I) -> Result<T> {
        let value: i8 = self.try_get(idx)?;
        let c = value as u8 as char;
        T::from_pg_char(c)
    }
}
