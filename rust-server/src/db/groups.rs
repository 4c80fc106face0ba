use super::{decode_error, Database};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteExecutor, SqliteRow};
use sqlx::Row;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Dm,
    Player,
}

impl GroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupRole::Dm => "dm",
            GroupRole::Player => "player",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "dm" => Some(GroupRole::Dm),
            "player" => Some(GroupRole::Player),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMember {
    pub id: String,
    pub group_id: String,
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub role: GroupRole,
    pub created_at: DateTime<Utc>,
}

/// A play group. The creator is its DM and always a member.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub description: String,
    pub dm_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub members: Vec<GroupMember>,
}

#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("Already a member of this group")]
    AlreadyMember,
    #[error("Not a member of this group")]
    NotMember,
    #[error("The DM cannot leave their own group")]
    DmCannotLeave,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

const GROUP_COLUMNS: &str = "g.id, g.name, g.description, g.dm_id, g.created_at, g.updated_at";

fn group_from_row(row: &SqliteRow, members: Vec<GroupMember>) -> Result<Group, sqlx::Error> {
    Ok(Group {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        dm_id: row.try_get("dm_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        members,
    })
}

fn member_from_row(row: &SqliteRow) -> Result<GroupMember, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(GroupMember {
        id: row.try_get("id")?,
        group_id: row.try_get("group_id")?,
        user_id: row.try_get("user_id")?,
        username: row.try_get("username")?,
        display_name: row.try_get("display_name")?,
        role: GroupRole::parse(&role).ok_or_else(|| decode_error("role", &role))?,
        created_at: row.try_get("created_at")?,
    })
}

impl Database {
    /// Create a group with `dm_id` as its DM and first member
    pub async fn create_group(
        &self,
        name: &str,
        description: &str,
        dm_id: &str,
    ) -> Result<Group, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO play_groups (id, name, description, dm_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(description)
        .bind(dm_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        insert_member(&mut *tx, &id, dm_id, GroupRole::Dm, now).await?;
        tx.commit().await?;

        self.get_group(&id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_group(&self, id: &str) -> Result<Option<Group>, sqlx::Error> {
        let row = sqlx::query(&format!("SELECT {} FROM play_groups g WHERE g.id = ?", GROUP_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let members = self.group_members(id).await?;
        group_from_row(&row, members).map(Some)
    }

    /// Groups the user belongs to, oldest first
    pub async fn list_groups_for_user(&self, user_id: &str) -> Result<Vec<Group>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM play_groups g JOIN group_members m ON m.group_id = g.id \
             WHERE m.user_id = ? ORDER BY g.created_at, g.id",
            GROUP_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut groups = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.try_get("id")?;
            let members = self.group_members(&id).await?;
            groups.push(group_from_row(row, members)?);
        }
        Ok(groups)
    }

    pub async fn group_members(&self, group_id: &str) -> Result<Vec<GroupMember>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT m.id, m.group_id, m.user_id, u.username, u.display_name, m.role, m.created_at \
             FROM group_members m JOIN users u ON u.id = m.user_id \
             WHERE m.group_id = ? ORDER BY m.created_at, m.id",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(member_from_row).collect()
    }

    /// The user's role in the group, or None when they are not a member
    pub async fn membership(&self, group_id: &str, user_id: &str) -> Result<Option<GroupRole>, sqlx::Error> {
        let role: Option<String> =
            sqlx::query_scalar("SELECT role FROM group_members WHERE group_id = ? AND user_id = ?")
                .bind(group_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        role.map(|r| GroupRole::parse(&r).ok_or_else(|| decode_error("role", &r)))
            .transpose()
    }

    /// Add the user as a player
    pub async fn join_group(&self, group_id: &str, user_id: &str) -> Result<(), MembershipError> {
        let result = insert_member(&self.pool, group_id, user_id, GroupRole::Player, Utc::now()).await;

        match result {
            Ok(()) => {
                tracing::info!("User {} joined group {}", user_id, group_id);
                Ok(())
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(MembershipError::AlreadyMember),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn leave_group(&self, group_id: &str, user_id: &str) -> Result<(), MembershipError> {
        match self.membership(group_id, user_id).await? {
            None => return Err(MembershipError::NotMember),
            Some(GroupRole::Dm) => return Err(MembershipError::DmCannotLeave),
            Some(GroupRole::Player) => {}
        }

        sqlx::query("DELETE FROM group_members WHERE group_id = ? AND user_id = ?")
            .bind(group_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        tracing::info!("User {} left group {}", user_id, group_id);
        Ok(())
    }
}

async fn insert_member(
    executor: impl SqliteExecutor<'_>,
    group_id: &str,
    user_id: &str,
    role: GroupRole,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO group_members (id, group_id, user_id, role, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(group_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(now)
        .execute(executor)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;

    async fn user(db: &Database, name: &str) -> String {
        db.create_user(name, &format!("{}@example.com", name), "secret123", name)
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_creator_is_dm_member() {
        let (_dir, db) = temp_database().await;
        let dm = user(&db, "dungeonmaster").await;

        let group = db.create_group("Tuesday Table", "Curse of Strahd", &dm).await.unwrap();
        assert_eq!(group.dm_id, dm);
        assert_eq!(group.members.len(), 1);
        assert_eq!(group.members[0].role, GroupRole::Dm);
        assert_eq!(group.members[0].username, "dungeonmaster");
        assert_eq!(db.membership(&group.id, &dm).await.unwrap(), Some(GroupRole::Dm));
    }

    #[tokio::test]
    async fn test_join_and_leave() {
        let (_dir, db) = temp_database().await;
        let dm = user(&db, "dungeonmaster").await;
        let player = user(&db, "rogue").await;
        let group = db.create_group("Table", "", &dm).await.unwrap();

        db.join_group(&group.id, &player).await.unwrap();
        assert!(matches!(
            db.join_group(&group.id, &player).await,
            Err(MembershipError::AlreadyMember)
        ));
        assert_eq!(db.group_members(&group.id).await.unwrap().len(), 2);
        assert_eq!(db.list_groups_for_user(&player).await.unwrap().len(), 1);

        assert!(matches!(
            db.leave_group(&group.id, &dm).await,
            Err(MembershipError::DmCannotLeave)
        ));
        db.leave_group(&group.id, &player).await.unwrap();
        assert!(matches!(
            db.leave_group(&group.id, &player).await,
            Err(MembershipError::NotMember)
        ));
        assert!(db.list_groups_for_user(&player).await.unwrap().is_empty());
        assert_eq!(db.membership(&group.id, &player).await.unwrap(), None);
    }
}
