use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

mod cards;
mod groups;
mod inventories;
mod shops;
mod users;

pub use cards::{CardFilter, CardPage, CardSort};
pub use groups::{Group, GroupMember, GroupRole, MembershipError};
pub use inventories::{Inventory, InventoryItem, InventoryOwner, ItemAdded};
pub use users::{AccountError, User};

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        // Run migrations
        Self::migrate(&pool).await?;

        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT UNIQUE NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                display_name TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cards (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                detailed_description TEXT,
                image_url TEXT NOT NULL DEFAULT '',
                rarity TEXT NOT NULL,
                card_number TEXT UNIQUE NOT NULL,
                price INTEGER,
                weight REAL,
                bonus_type TEXT,
                bonus_value TEXT,
                damage_type TEXT,
                defense_type TEXT,
                item_type TEXT,
                properties TEXT,
                tags TEXT,
                attunement TEXT,
                author TEXT NOT NULL DEFAULT 'Admin',
                source TEXT,
                is_template TEXT NOT NULL DEFAULT 'false',
                slot TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_cards_deleted_at ON cards(deleted_at)")
            .execute(pool)
            .await?;

        // Generated shop assortments, stored as opaque JSON documents
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS shops (
                id TEXT PRIMARY KEY,
                slug TEXT UNIQUE NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS play_groups (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                dm_id TEXT NOT NULL REFERENCES users(id),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS group_members (
                id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL REFERENCES play_groups(id),
                user_id TEXT NOT NULL REFERENCES users(id),
                role TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(group_id, user_id)
            )
            "#,
        )
        .execute(pool)
        .await?;

        // Exactly one of user_id / group_id is set, matching kind
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS inventories (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                user_id TEXT REFERENCES users(id),
                group_id TEXT REFERENCES play_groups(id),
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS inventory_items (
                id TEXT PRIMARY KEY,
                inventory_id TEXT NOT NULL REFERENCES inventories(id),
                card_id TEXT NOT NULL REFERENCES cards(id),
                quantity INTEGER NOT NULL,
                notes TEXT NOT NULL DEFAULT '',
                is_equipped INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(inventory_id, card_id)
            )
            "#,
        )
        .execute(pool)
        .await?;

        tracing::info!("Database migrations complete");
        Ok(())
    }
}

/// Wrap a column that could not be interpreted into a decode error
fn decode_error(column: &str, value: &str) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: format!("unexpected value '{}'", value).into(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Database;
    use tempfile::TempDir;

    /// Open a fresh on-disk database; keep the TempDir alive for the test's duration
    pub async fn temp_database() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("test.db").display());
        let db = Database::new(&url, 2).await.unwrap();
        (dir, db)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::temp_database;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let (_dir, db) = temp_database().await;
        super::Database::migrate(&db.pool).await.unwrap();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
             ('users', 'cards', 'shops', 'play_groups', 'group_members', 'inventories', 'inventory_items')",
        )
        .fetch_one(&db.pool)
        .await
        .unwrap();
        assert_eq!(count, 7);
    }
}
