use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use anyhow::Result;
use sqlx::{
    MySql, MySqlConnection, MySqlPool,
    mysql::MySqlPoolOptions,
    pool::PoolConnection,
};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::config::DatabaseConfig;

/// Hands out one [`DbConnection`] per request scope. Pooling is left to the
/// driver; the pool is created lazily so startup does not wait on MySQL.
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    pool: MySqlPool,
    next_id: Arc<AtomicU64>,
}

impl ConnectionFactory {
    pub fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let mut options = MySqlPoolOptions::new();
        if let Some(max) = config.max_connections {
            options = options.max_connections(max);
        }
        if let Some(timeout) = config.connection_timeout_seconds {
            options = options.acquire_timeout(Duration::from_secs(timeout));
        }
        Ok(Self {
            pool: options.connect_lazy(&config.uri)?,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// A fresh, not yet opened connection.
    pub fn create(&self) -> DbConnection {
        DbConnection {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            pool: self.pool.clone(),
            conn: Mutex::new(None),
        }
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }
}

/// A connection owned by one request scope. The physical connection is
/// checked out of the pool on first use and returned when the scope drops.
pub struct DbConnection {
    id: u64,
    pool: MySqlPool,
    conn: Mutex<Option<PoolConnection<MySql>>>,
}

impl DbConnection {
    /// Process-unique id of this connection object.
    pub fn id(&self) -> u64 {
        self.id
    }

    #[cfg(test)]
    async fn is_open(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Exclusive access to the underlying connection, opening it if needed.
    pub async fn acquire(&self) -> Result<MappedMutexGuard<'_, MySqlConnection>, sqlx::Error> {
        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            debug!(connection = self.id, "opening database connection");
            *guard = Some(self.pool.acquire().await?);
        }
        MutexGuard::try_map(guard, |conn| conn.as_deref_mut()).map_err(|_| sqlx::Error::PoolClosed)
    }
}
