use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::prompts::resolve_content;
use super::types::{encode_tokens, new_id, now_iso, parse_tokens};
use super::Database;
use crate::join::{normalize_tokens, restore_tokens, JoinMode};

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub tokens_json: Option<String>,
    pub created_at: String,
    pub source: String,
}

impl HistoryRecord {
    pub fn tokens(&self) -> Vec<String> {
        parse_tokens(self.tokens_json.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewHistory {
    pub content: Option<String>,
    pub source: String,
    pub tokens: Option<Vec<String>>,
}

impl Database {
    /// Most recent history entries first.
    pub async fn list_history(&self, limit: i64) -> Result<Vec<HistoryRecord>> {
        tracing::trace!(limit, "Listing history");
        sqlx::query_as(
            "SELECT id, content, tokens_json, created_at, source FROM prompt_history \
             ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(Into::into)
    }

    pub async fn get_history(&self, id: &str) -> Result<Option<HistoryRecord>> {
        sqlx::query_as(
            "SELECT id, content, tokens_json, created_at, source FROM prompt_history WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(Into::into)
    }

    /// Record an entry. Returns `None` when neither content nor tokens were
    /// supplied. A token list that is blank after normalisation counts as
    /// no tokens, so blank content plus blank tokens is rejected too.
    pub async fn add_history(
        &self,
        new: NewHistory,
        mode: JoinMode,
    ) -> Result<Option<HistoryRecord>> {
        let tokens = new.tokens.as_deref().map(normalize_tokens);
        let Some(content) = resolve_content(new.content.as_deref(), tokens.as_deref(), mode) else {
            return Ok(None);
        };
        let entry = HistoryRecord {
            id: new_id(),
            content,
            tokens_json: tokens.as_deref().map(encode_tokens),
            created_at: now_iso(),
            source: new.source,
        };
        insert_history(self.pool(), &entry).await?;
        tracing::debug!(history_id = %entry.id, source = %entry.source, "Recorded history entry");
        Ok(Some(entry))
    }

    /// Record `content` as-is, even when it is empty.
    pub async fn record_history(
        &self,
        content: String,
        source: &str,
        tokens: &[String],
    ) -> Result<HistoryRecord> {
        let entry = HistoryRecord {
            id: new_id(),
            content,
            tokens_json: Some(encode_tokens(tokens)),
            created_at: now_iso(),
            source: source.to_string(),
        };
        insert_history(self.pool(), &entry).await?;
        tracing::debug!(history_id = %entry.id, source = %entry.source, "Recorded history entry");
        Ok(entry)
    }

    pub async fn delete_history(&self, id: &str) -> Result<bool> {
        tracing::trace!(history_id = %id, "Deleting history entry");
        let result = sqlx::query("DELETE FROM prompt_history WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Tokens to load a history entry back into the builder.
    pub async fn history_tokens(&self, id: &str, mode: JoinMode) -> Result<Option<Vec<String>>> {
        Ok(self
            .get_history(id)
            .await?
            .map(|entry| restore_tokens(&entry.content, &entry.tokens(), mode)))
    }
}

pub(crate) async fn insert_history<'e, E>(executor: E, entry: &HistoryRecord) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "INSERT INTO prompt_history (id, content, tokens_json, created_at, source) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&entry.id)
    .bind(&entry.content)
    .bind(&entry.tokens_json)
    .bind(&entry.created_at)
    .bind(&entry.source)
    .execute(executor)
    .await?;
    Ok(())
}
