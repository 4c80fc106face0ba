use super::Database;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use thiserror::Error;

/// Public view of an account; the password hash never leaves this module
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Username already exists")]
    UsernameTaken,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Failed to hash password: {0}")]
    Hash(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

fn user_from_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        display_name: row.try_get("display_name")?,
        created_at: row.try_get("created_at")?,
    })
}

impl Database {
    /// Create a new account with an Argon2-hashed password
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<User, AccountError> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AccountError::Hash(e.to_string()))?
            .to_string();

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            created_at: Utc::now(),
        };

        let result = sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, display_name, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&password_hash)
        .bind(&user.display_name)
        .bind(user.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                tracing::info!("Created user: {} (id: {})", user.username, user.id);
                Ok(user)
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                if e.message().contains("users.email") {
                    Err(AccountError::EmailTaken)
                } else {
                    Err(AccountError::UsernameTaken)
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, username, email, display_name, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Verify password and return the user if valid
    pub async fn verify_user_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, username, email, display_name, created_at, password_hash FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let stored: String = row.try_get("password_hash")?;
        let verified = PasswordHash::new(&stored)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false);

        if verified {
            user_from_row(&row).map(Some)
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;

    #[tokio::test]
    async fn test_create_and_verify_user() {
        let (_dir, db) = temp_database().await;
        let user = db
            .create_user("dungeonmaster", "dm@example.com", "secret123", "DM")
            .await
            .unwrap();

        let verified = db
            .verify_user_password("dungeonmaster", "secret123")
            .await
            .unwrap();
        assert_eq!(verified.as_ref().map(|u| u.id.as_str()), Some(user.id.as_str()));

        assert!(db.verify_user_password("dungeonmaster", "wrong").await.unwrap().is_none());
        assert!(db.verify_user_password("nobody", "secret123").await.unwrap().is_none());

        let loaded = db.get_user(&user.id).await.unwrap().unwrap();
        assert_eq!(loaded.email, "dm@example.com");
    }

    #[tokio::test]
    async fn test_duplicate_accounts_rejected() {
        let (_dir, db) = temp_database().await;
        db.create_user("player", "p@example.com", "secret123", "").await.unwrap();

        let err = db
            .create_user("player", "other@example.com", "secret123", "")
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::UsernameTaken));

        let err = db
            .create_user("player2", "p@example.com", "secret123", "")
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::EmailTaken));
    }
}
