use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::history::insert_history;
use super::phrases::insert_phrase;
use super::prompts::insert_prompt;
use super::settings::write_settings;
use super::{Category, Database, HistoryRecord, Phrase, PromptRecord, Settings};

/// Full snapshot of the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub categories: Vec<Category>,
    pub phrases: Vec<Phrase>,
    pub prompts: Vec<PromptRecord>,
    pub history: Vec<HistoryRecord>,
    /// Missing fields fall back to the defaults on import.
    #[serde(default)]
    pub settings: Option<Settings>,
}

impl Database {
    pub async fn export_backup(&self) -> Result<Backup> {
        let backup = Backup {
            categories: self.list_categories().await?,
            phrases: self.list_phrases(None).await?,
            prompts: self.list_prompts().await?,
            history: sqlx::query_as(
                "SELECT id, content, tokens_json, created_at, source FROM prompt_history \
                 ORDER BY created_at ASC, rowid ASC",
            )
            .fetch_all(self.pool())
            .await?,
            settings: Some(self.get_settings().await?),
        };
        tracing::debug!(
            categories = backup.categories.len(),
            phrases = backup.phrases.len(),
            prompts = backup.prompts.len(),
            history = backup.history.len(),
            "Exported backup"
        );
        Ok(backup)
    }

    /// Replace every table with the contents of `backup`.
    ///
    /// Runs in a single transaction; on error nothing is changed.
    pub async fn import_backup(&self, backup: &Backup) -> Result<()> {
        let _guard = self.lock_phrase_writes().await;
        let mut tx = self.pool().begin().await?;
        for table in ["phrases", "categories", "saved_prompts", "prompt_history"] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await?;
        }

        for category in &backup.categories {
            sqlx::query(
                "INSERT INTO categories (id, name, order_index, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&category.id)
            .bind(&category.name)
            .bind(category.order_index)
            .bind(&category.created_at)
            .bind(&category.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        for phrase in &backup.phrases {
            insert_phrase(&mut *tx, phrase).await?;
        }
        for prompt in &backup.prompts {
            insert_prompt(&mut *tx, prompt).await?;
        }
        for entry in &backup.history {
            insert_history(&mut *tx, entry).await?;
        }
        if let Some(settings) = &backup.settings {
            write_settings(&mut *tx, settings).await?;
        }
        tx.commit().await?;

        tracing::info!(
            categories = backup.categories.len(),
            phrases = backup.phrases.len(),
            prompts = backup.prompts.len(),
            history = backup.history.len(),
            "Imported backup"
        );
        Ok(())
    }
}
