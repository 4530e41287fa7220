use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::MySqlPool;

use crate::store::{LedgerStore, MemoryStore, MySqlStore};

pub const MEMORY_URL: &str = "memory://";

pub async fn init_db(database_url: &str) -> Result<MySqlPool> {
    let pool = MySqlPool::connect(database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(pool)
}

/// `memory://` selects the in-process store; anything else is a MySQL URL.
pub async fn init_store(database_url: &str) -> Result<Arc<dyn LedgerStore>> {
    if database_url == MEMORY_URL {
        tracing::warn!("Using in-memory store; data is lost on shutdown");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let pool = init_db(database_url).await?;
    Ok(Arc::new(MySqlStore::new(pool)))
}
