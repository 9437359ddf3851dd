use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::types::{encode_tokens, new_id, now_iso, parse_tokens};
use super::Database;
use crate::join::{build_prompt, normalize_tokens, restore_tokens, JoinMode};

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tokens_json: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl PromptRecord {
    pub fn tokens(&self) -> Vec<String> {
        parse_tokens(self.tokens_json.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewPrompt {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tokens: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PromptUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tokens: Option<Vec<String>>,
}

/// Content to store for an entry given optional text and optional tokens.
///
/// Non-blank `content` wins (trimmed). Otherwise non-empty tokens are joined
/// with `mode`. Returns `None` when neither is usable.
pub fn resolve_content(
    content: Option<&str>,
    tokens: Option<&[String]>,
    mode: JoinMode,
) -> Option<String> {
    if let Some(content) = content.map(str::trim).filter(|c| !c.is_empty()) {
        return Some(content.to_string());
    }
    tokens
        .filter(|tokens| !tokens.is_empty())
        .map(|tokens| build_prompt(tokens, mode))
}

const PROMPT_COLUMNS: &str = "id, title, content, tokens_json, created_at, updated_at";

impl Database {
    pub async fn list_prompts(&self) -> Result<Vec<PromptRecord>> {
        tracing::trace!("Listing saved prompts");
        sqlx::query_as(&format!(
            "SELECT {PROMPT_COLUMNS} FROM saved_prompts ORDER BY updated_at DESC, rowid DESC"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(Into::into)
    }

    pub async fn get_prompt(&self, id: &str) -> Result<Option<PromptRecord>> {
        tracing::trace!(prompt_id = %id, "Fetching saved prompt");
        sqlx::query_as(&format!("SELECT {PROMPT_COLUMNS} FROM saved_prompts WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(Into::into)
    }

    /// Save a prompt. Returns `None` when neither content nor tokens were
    /// supplied.
    pub async fn create_prompt(
        &self,
        new: NewPrompt,
        mode: JoinMode,
    ) -> Result<Option<PromptRecord>> {
        let tokens = new.tokens.as_deref().map(normalize_tokens);
        let Some(content) = resolve_content(new.content.as_deref(), tokens.as_deref(), mode) else {
            return Ok(None);
        };
        let now = now_iso();
        let prompt = PromptRecord {
            id: new_id(),
            title: new.title.as_deref().map(str::trim).unwrap_or_default().to_string(),
            content,
            tokens_json: tokens.as_deref().map(encode_tokens),
            created_at: now.clone(),
            updated_at: now,
        };
        insert_prompt(self.pool(), &prompt).await?;
        tracing::debug!(prompt_id = %prompt.id, join_mode = %mode, "Saved prompt");
        Ok(Some(prompt))
    }

    pub async fn update_prompt(
        &self,
        id: &str,
        update: PromptUpdate,
        mode: JoinMode,
    ) -> Result<Option<PromptRecord>> {
        let Some(existing) = self.get_prompt(id).await? else {
            return Ok(None);
        };
        let tokens = update.tokens.as_deref().map(normalize_tokens);
        let content = resolve_content(update.content.as_deref(), tokens.as_deref(), mode)
            .unwrap_or(existing.content);
        let updated = PromptRecord {
            title: update
                .title
                .map(|title| title.trim().to_string())
                .unwrap_or(existing.title),
            content,
            tokens_json: tokens
                .as_deref()
                .map(encode_tokens)
                .or(existing.tokens_json),
            updated_at: now_iso(),
            ..existing
        };
        sqlx::query(
            "UPDATE saved_prompts SET title = ?, content = ?, tokens_json = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&updated.title)
        .bind(&updated.content)
        .bind(&updated.tokens_json)
        .bind(&updated.updated_at)
        .bind(&updated.id)
        .execute(self.pool())
        .await?;
        tracing::debug!(prompt_id = %id, "Updated saved prompt");
        Ok(Some(updated))
    }

    pub async fn delete_prompt(&self, id: &str) -> Result<bool> {
        tracing::trace!(prompt_id = %id, "Deleting saved prompt");
        let result = sqlx::query("DELETE FROM saved_prompts WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Tokens to load a saved prompt back into the builder.
    pub async fn prompt_tokens(&self, id: &str, mode: JoinMode) -> Result<Option<Vec<String>>> {
        Ok(self
            .get_prompt(id)
            .await?
            .map(|prompt| restore_tokens(&prompt.content, &prompt.tokens(), mode)))
    }
}

pub(crate) async fn insert_prompt<'e, E>(executor: E, prompt: &PromptRecord) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "INSERT INTO saved_prompts (id, title, content, tokens_json, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&prompt.id)
    .bind(&prompt.title)
    .bind(&prompt.content)
    .bind(&prompt.tokens_json)
    .bind(&prompt.created_at)
    .bind(&prompt.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::util::init_test_db;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolve_content_prefers_text() {
        let tokens = strings(&["a", "b"]);
        assert_eq!(
            resolve_content(Some("  typed  "), Some(tokens.as_slice()), JoinMode::Comma),
            Some("typed".to_string())
        );
        assert_eq!(
            resolve_content(Some("   "), Some(tokens.as_slice()), JoinMode::Comma),
            Some("a, b".to_string())
        );
        assert_eq!(resolve_content(None, Some(&[][..]), JoinMode::Space), None);
        assert_eq!(resolve_content(None, None, JoinMode::Space), None);
    }

    #[tokio::test]
    async fn create_builds_content_from_tokens() -> Result<()> {
        let db = init_test_db().await;
        let new = NewPrompt {
            title: Some("  Park  ".to_string()),
            content: None,
            tokens: Some(strings(&[" red hair ", "", "blue eyes"])),
        };
        let prompt = db.create_prompt(new, JoinMode::Comma).await?.unwrap();
        assert_eq!(prompt.title, "Park");
        assert_eq!(prompt.content, "red hair, blue eyes");
        assert_eq!(prompt.tokens(), strings(&["red hair", "blue eyes"]));

        let listed = db.list_prompts().await?;
        assert_eq!(listed, vec![prompt]);
        Ok(())
    }

    #[tokio::test]
    async fn create_requires_content_or_tokens() -> Result<()> {
        let db = init_test_db().await;
        let new = NewPrompt {
            content: Some("  ".to_string()),
            tokens: Some(strings(&["  "])),
            ..Default::default()
        };
        assert!(db.create_prompt(new, JoinMode::Space).await?.is_none());
        assert!(db.list_prompts().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn update_keeps_unspecified_fields() -> Result<()> {
        let db = init_test_db().await;
        let new = NewPrompt {
            title: Some("T".to_string()),
            content: Some("first draft".to_string()),
            tokens: None,
        };
        let prompt = db.create_prompt(new, JoinMode::Space).await?.unwrap();
        assert_eq!(prompt.tokens_json, None);

        let update = PromptUpdate {
            tokens: Some(strings(&["One", "Two."])),
            ..Default::default()
        };
        let updated = db
            .update_prompt(&prompt.id, update, JoinMode::Sentence)
            .await?
            .unwrap();
        assert_eq!(updated.title, "T");
        assert_eq!(updated.content, "One. Two.");
        assert_eq!(updated.created_at, prompt.created_at);

        let update = PromptUpdate {
            title: Some("New".to_string()),
            ..Default::default()
        };
        let renamed = db
            .update_prompt(&prompt.id, update, JoinMode::Sentence)
            .await?
            .unwrap();
        assert_eq!(renamed.content, "One. Two.");
        assert_eq!(renamed.tokens(), strings(&["One", "Two."]));

        assert!(db
            .update_prompt("missing", PromptUpdate::default(), JoinMode::Space)
            .await?
            .is_none());
        Ok(())
    }

    #[tokio::test]
    async fn tokens_fall_back_to_split() -> Result<()> {
        let db = init_test_db().await;
        let new = NewPrompt {
            content: Some("cat, dog, bird".to_string()),
            ..Default::default()
        };
        let prompt = db.create_prompt(new, JoinMode::Comma).await?.unwrap();
        let tokens = db.prompt_tokens(&prompt.id, JoinMode::Comma).await?.unwrap();
        assert_eq!(tokens, strings(&["cat", "dog", "bird"]));

        let tokens = db.prompt_tokens(&prompt.id, JoinMode::Space).await?.unwrap();
        assert_eq!(tokens, strings(&["cat, dog, bird"]));

        assert!(db.delete_prompt(&prompt.id).await?);
        assert!(db.prompt_tokens(&prompt.id, JoinMode::Comma).await?.is_none());
        Ok(())
    }
}
