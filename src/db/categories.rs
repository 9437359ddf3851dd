use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::types::{new_id, now_iso};
use super::Database;

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub order_index: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Database {
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        tracing::trace!("Listing categories");
        sqlx::query_as(
            "SELECT id, name, order_index, created_at, updated_at FROM categories \
             ORDER BY order_index ASC, created_at ASC",
        )
        .fetch_all(self.pool())
        .await
        .map_err(Into::into)
    }

    pub async fn get_category(&self, id: &str) -> Result<Option<Category>> {
        tracing::trace!(category_id = %id, "Fetching category");
        sqlx::query_as(
            "SELECT id, name, order_index, created_at, updated_at FROM categories WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(Into::into)
    }

    pub async fn create_category(&self, name: &str) -> Result<Category> {
        let max_order: Option<i64> = sqlx::query_scalar("SELECT MAX(order_index) FROM categories")
            .fetch_one(self.pool())
            .await?;
        let now = now_iso();
        let category = Category {
            id: new_id(),
            name: name.to_string(),
            order_index: max_order.unwrap_or(0) + 1,
            created_at: now.clone(),
            updated_at: now,
        };
        sqlx::query(
            "INSERT INTO categories (id, name, order_index, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(category.order_index)
        .bind(&category.created_at)
        .bind(&category.updated_at)
        .execute(self.pool())
        .await?;
        tracing::debug!(category_id = %category.id, name = %category.name, "Created category");
        Ok(category)
    }

    /// Rename and/or move a category. Returns `None` when it does not exist.
    pub async fn update_category(
        &self,
        id: &str,
        name: Option<&str>,
        order_index: Option<i64>,
    ) -> Result<Option<Category>> {
        let Some(existing) = self.get_category(id).await? else {
            return Ok(None);
        };
        let updated = Category {
            name: name.map(str::to_string).unwrap_or(existing.name),
            order_index: order_index.unwrap_or(existing.order_index),
            updated_at: now_iso(),
            ..existing
        };
        sqlx::query("UPDATE categories SET name = ?, order_index = ?, updated_at = ? WHERE id = ?")
            .bind(&updated.name)
            .bind(updated.order_index)
            .bind(&updated.updated_at)
            .bind(&updated.id)
            .execute(self.pool())
            .await?;
        tracing::debug!(category_id = %id, "Updated category");
        Ok(Some(updated))
    }

    /// Delete a category together with its phrases.
    pub async fn delete_category(&self, id: &str) -> Result<bool> {
        let _guard = self.lock_phrase_writes().await;
        let mut tx = self.pool().begin().await?;
        let phrases = sqlx::query("DELETE FROM phrases WHERE category_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        let deleted = result.rows_affected() > 0;
        tracing::debug!(
            category_id = %id,
            deleted,
            phrases = phrases.rows_affected(),
            "Deleted category"
        );
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::util::init_test_db;

    #[tokio::test]
    async fn categories_get_increasing_order() -> Result<()> {
        let db = init_test_db().await;
        let people = db.create_category("People").await?;
        let places = db.create_category("Places").await?;
        assert_eq!(people.order_index, 1);
        assert_eq!(places.order_index, 2);

        let listed = db.list_categories().await?;
        assert_eq!(listed, vec![people, places]);
        Ok(())
    }

    #[tokio::test]
    async fn update_and_reorder() -> Result<()> {
        let db = init_test_db().await;
        let a = db.create_category("A").await?;
        let b = db.create_category("B").await?;

        let moved = db.update_category(&a.id, Some("Alpha"), Some(5)).await?.unwrap();
        assert_eq!(moved.name, "Alpha");
        assert_eq!(moved.order_index, 5);
        assert_eq!(moved.created_at, a.created_at);

        let names: Vec<String> = db.list_categories().await?.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec![b.name, "Alpha".to_string()]);

        assert!(db.update_category("missing", Some("x"), None).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn delete_removes_phrases() -> Result<()> {
        let db = init_test_db().await;
        let category = db.create_category("Style").await?;
        db.bulk_add_phrases(&category.id, "oil painting\nwatercolor").await?;

        assert!(db.delete_category(&category.id).await?);
        assert!(db.list_phrases(None).await?.is_empty());
        assert!(!db.delete_category(&category.id).await?);
        Ok(())
    }
}
