use crate::{PostgresClientWrapper, Result};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Idle connections to the target database, so every table doesn't need to connect on its own.
#[derive(Clone)]
pub(crate) struct ConnectionPool {
    connection_pool: Arc<Mutex<Vec<PostgresClientWrapper>>>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self {
            connection_pool: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Takes an idle connection, or opens a new one like `template`.
    pub async fn get_connection(&self, template: &PostgresClientWrapper) -> Result<PostgresClientWrapper> {
        let idle = {
            let mut pool = self.connection_pool.lock().await;
            pool.pop()
        };

        match idle {
            Some(connection) => Ok(connection),
            None => template.create_another_connection().await,
        }
    }

    pub async fn release_connection(&self, connection: PostgresClientWrapper) {
        let mut pool = self.connection_pool.lock().await;
        pool.push(connection);
    }

    #[cfg(test)]
    pub async fn idle_connections(&self) -> usize {
        self.connection_pool.lock().await.len()
    }
}
