use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::types::{flag, new_id, now_iso};
use super::Database;
use crate::text_utils::{plan_phrase_insert, split_lines};

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phrase {
    pub id: String,
    pub category_id: String,
    pub text_en: String,
    #[serde(default, deserialize_with = "flag")]
    pub favorite: bool,
    #[serde(default)]
    pub order_index: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AddPhraseOutcome {
    Added(Phrase),
    Duplicate,
    MissingCategory,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhraseUpdateOutcome {
    Updated(Phrase),
    NotFound,
    MissingCategory,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkInsertOutcome {
    pub count: usize,
    pub skipped: usize,
    pub duplicates: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhraseUpdate {
    pub text_en: Option<String>,
    #[serde(default, deserialize_with = "super::types::optional_flag")]
    pub favorite: Option<bool>,
    pub category_id: Option<String>,
    pub order_index: Option<i64>,
}

const PHRASE_COLUMNS: &str =
    "id, category_id, text_en, favorite, order_index, created_at, updated_at";

impl Database {
    pub async fn list_phrases(&self, category_id: Option<&str>) -> Result<Vec<Phrase>> {
        tracing::trace!(category_id = ?category_id, "Listing phrases");
        let phrases = match category_id {
            Some(category_id) => {
                sqlx::query_as(&format!(
                    "SELECT {PHRASE_COLUMNS} FROM phrases WHERE category_id = ? \
                     ORDER BY order_index ASC, created_at ASC"
                ))
                .bind(category_id)
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {PHRASE_COLUMNS} FROM phrases \
                     ORDER BY category_id ASC, order_index ASC, created_at ASC"
                ))
                .fetch_all(self.pool())
                .await?
            }
        };
        Ok(phrases)
    }

    pub async fn get_phrase(&self, id: &str) -> Result<Option<Phrase>> {
        tracing::trace!(phrase_id = %id, "Fetching phrase");
        sqlx::query_as(&format!("SELECT {PHRASE_COLUMNS} FROM phrases WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(Into::into)
    }

    async fn next_phrase_order(&self, category_id: &str) -> Result<i64> {
        let max_order: Option<i64> =
            sqlx::query_scalar("SELECT MAX(order_index) FROM phrases WHERE category_id = ?")
                .bind(category_id)
                .fetch_one(self.pool())
                .await?;
        Ok(max_order.unwrap_or(0) + 1)
    }

    async fn category_texts(&self, category_id: &str) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT text_en FROM phrases WHERE category_id = ?")
            .bind(category_id)
            .fetch_all(self.pool())
            .await
            .map_err(Into::into)
    }

    /// Add one phrase unless the category already holds an equivalent one.
    pub async fn add_phrase(&self, category_id: &str, text: &str) -> Result<AddPhraseOutcome> {
        let _guard = self.lock_phrase_writes().await;
        if self.get_category(category_id).await?.is_none() {
            return Ok(AddPhraseOutcome::MissingCategory);
        }

        let existing = self.category_texts(category_id).await?;
        let plan = plan_phrase_insert(&[text], &existing);
        let Some(text) = plan.to_insert.into_iter().next() else {
            tracing::debug!(category_id, text, "Rejected duplicate phrase");
            return Ok(AddPhraseOutcome::Duplicate);
        };

        let now = now_iso();
        let phrase = Phrase {
            id: new_id(),
            category_id: category_id.to_string(),
            text_en: text,
            favorite: false,
            order_index: self.next_phrase_order(category_id).await?,
            created_at: now.clone(),
            updated_at: now,
        };
        insert_phrase(self.pool(), &phrase).await?;
        tracing::debug!(phrase_id = %phrase.id, category_id, "Added phrase");
        Ok(AddPhraseOutcome::Added(phrase))
    }

    /// Add every new line of `lines` to the category in one transaction.
    ///
    /// Returns `None` when the category does not exist.
    pub async fn bulk_add_phrases(
        &self,
        category_id: &str,
        lines: &str,
    ) -> Result<Option<BulkInsertOutcome>> {
        let _guard = self.lock_phrase_writes().await;
        if self.get_category(category_id).await?.is_none() {
            return Ok(None);
        }

        let candidates = split_lines(lines);
        let existing = self.category_texts(category_id).await?;
        let plan = plan_phrase_insert(&candidates, &existing);

        let mut order_index = self.next_phrase_order(category_id).await?;
        let now = now_iso();
        let mut tx = self.pool().begin().await?;
        for text in &plan.to_insert {
            let phrase = Phrase {
                id: new_id(),
                category_id: category_id.to_string(),
                text_en: text.clone(),
                favorite: false,
                order_index,
                created_at: now.clone(),
                updated_at: now.clone(),
            };
            insert_phrase(&mut *tx, &phrase).await?;
            order_index += 1;
        }
        tx.commit().await?;

        let outcome = BulkInsertOutcome {
            count: plan.to_insert.len(),
            skipped: plan.duplicates.len(),
            duplicates: plan.duplicates,
        };
        tracing::debug!(
            category_id,
            count = outcome.count,
            skipped = outcome.skipped,
            "Bulk added phrases"
        );
        Ok(Some(outcome))
    }

    /// Edit a phrase; moving it to another category without an explicit
    /// order appends it there.
    pub async fn update_phrase(
        &self,
        id: &str,
        update: PhraseUpdate,
    ) -> Result<PhraseUpdateOutcome> {
        let _guard = self.lock_phrase_writes().await;
        let Some(existing) = self.get_phrase(id).await? else {
            return Ok(PhraseUpdateOutcome::NotFound);
        };
        if let Some(target) = &update.category_id {
            if self.get_category(target).await?.is_none() {
                tracing::debug!(phrase_id = %id, category_id = %target, "Move target is missing");
                return Ok(PhraseUpdateOutcome::MissingCategory);
            }
        }

        let moved = matches!(&update.category_id, Some(target) if *target != existing.category_id);
        let order_index = match (update.order_index, moved) {
            (Some(order_index), _) => order_index,
            (None, true) => {
                let target = update.category_id.as_deref().unwrap_or(&existing.category_id);
                self.next_phrase_order(target).await?
            }
            (None, false) => existing.order_index,
        };
        let text_en = update
            .text_en
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .unwrap_or(existing.text_en);

        let updated = Phrase {
            text_en,
            favorite: update.favorite.unwrap_or(existing.favorite),
            category_id: update.category_id.unwrap_or(existing.category_id),
            order_index,
            updated_at: now_iso(),
            ..existing
        };
        sqlx::query(
            "UPDATE phrases SET text_en = ?, favorite = ?, category_id = ?, order_index = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(&updated.text_en)
        .bind(updated.favorite)
        .bind(&updated.category_id)
        .bind(updated.order_index)
        .bind(&updated.updated_at)
        .bind(&updated.id)
        .execute(self.pool())
        .await?;
        tracing::debug!(phrase_id = %id, moved, "Updated phrase");
        Ok(PhraseUpdateOutcome::Updated(updated))
    }

    pub async fn delete_phrase(&self, id: &str) -> Result<bool> {
        tracing::trace!(phrase_id = %id, "Deleting phrase");
        let result = sqlx::query("DELETE FROM phrases WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub(crate) async fn insert_phrase<'e, E>(executor: E, phrase: &Phrase) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "INSERT INTO phrases (id, category_id, text_en, favorite, order_index, created_at, \
         updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&phrase.id)
    .bind(&phrase.category_id)
    .bind(&phrase.text_en)
    .bind(phrase.favorite)
    .bind(phrase.order_index)
    .bind(&phrase.created_at)
    .bind(&phrase.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}
