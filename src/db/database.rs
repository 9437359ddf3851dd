use std::sync::Arc;

use anyhow::Result;
use sqlx::{Pool, Sqlite};
use tokio::sync::{Mutex, MutexGuard};

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
    phrase_writes: Arc<Mutex<()>>,
}

impl Database {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self {
            pool,
            phrase_writes: Arc::new(Mutex::new(())),
        }
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Apply the embedded migrations and make sure the settings row exists.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(self.pool()).await?;
        self.ensure_settings().await?;
        Ok(())
    }

    /// Serialises phrase inserts so duplicate checks see a stable snapshot.
    pub(crate) async fn lock_phrase_writes(&self) -> MutexGuard<'_, ()> {
        self.phrase_writes.lock().await
    }
}
