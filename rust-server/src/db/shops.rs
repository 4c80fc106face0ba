use super::Database;
use chrono::{DateTime, Utc};

impl Database {
    /// Store a generated shop document under its slug
    pub async fn insert_shop(
        &self,
        slug: &str,
        data: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO shops (id, slug, data, created_at) VALUES (?, ?, ?, ?)")
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(slug)
            .bind(data)
            .bind(created_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Raw JSON document for a slug, if one was ever stored
    pub async fn get_shop_data(&self, slug: &str) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT data FROM shops WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_support::temp_database;
    use chrono::Utc;

    #[tokio::test]
    async fn test_shop_round_trip() {
        let (_dir, db) = temp_database().await;
        db.insert_shop("abc", r#"{"vendors":{}}"#, Utc::now()).await.unwrap();

        assert_eq!(
            db.get_shop_data("abc").await.unwrap().as_deref(),
            Some(r#"{"vendors":{}}"#)
        );
        assert_eq!(db.get_shop_data("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_rejected() {
        let (_dir, db) = temp_database().await;
        db.insert_shop("same", "{}", Utc::now()).await.unwrap();
        assert!(db.insert_shop("same", "{}", Utc::now()).await.is_err());
    }
}
