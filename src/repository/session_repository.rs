//! Session repository — spec §3 Session entity, §4.2 session lifecycle.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::db::Db;
use crate::errors::{RepoError, RepoResult};

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub absolute_expiry: DateTime<Utc>,
    pub ip_address: String,
    pub user_agent: String,
}

impl Session {
    /// Validity per spec §3: `now - last_activity <= idle_window` and
    /// `now <= absolute_expiry`.
    pub fn is_valid(&self, now: DateTime<Utc>, idle_window: chrono::Duration) -> bool {
        now <= self.absolute_expiry && now - self.last_activity <= idle_window
    }
}

#[derive(Clone)]
pub struct SessionRepository {
    db: Db,
}

impl SessionRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    fn row_to_session(row: &sqlx::postgres::PgRow) -> Session {
        Session {
            id: row.get("id"),
            user_id: row.get("user_id"),
            created_at: row.get("created_at"),
            last_activity: row.get("last_activity"),
            absolute_expiry: row.get("absolute_expiry"),
            ip_address: row.get("ip_address"),
            user_agent: row.get("user_agent"),
        }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        token_hash: &str,
        absolute_expiry: DateTime<Utc>,
        ip_address: &str,
        user_agent: &str,
    ) -> RepoResult<Session> {
        let id = Uuid::new_v4();
        let row = sqlx::query(
            r#"INSERT INTO sessions (id, user_id, token_hash, created_at, last_activity,
                                     absolute_expiry, ip_address, user_agent)
               VALUES ($1, $2, $3, NOW(), NOW(), $4, $5, $6)
               RETURNING id, user_id, created_at, last_activity, absolute_expiry, ip_address, user_agent"#,
        )
        .bind(id)
        .bind(user_id)
        .bind(token_hash)
        .bind(absolute_expiry)
        .bind(ip_address)
        .bind(user_agent)
        .fetch_one(self.db.pool())
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(Self::row_to_session(&row))
    }

    pub async fn find_by_token_hash(&self, token_hash: &str) -> RepoResult<Option<Session>> {
        let row = sqlx::query(
            r#"SELECT id, user_id, created_at, last_activity, absolute_expiry, ip_address, user_agent
               FROM sessions WHERE token_hash = $1"#,
        )
        .bind(token_hash)
        .fetch_optional(self.db.pool())
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(row.map(|r| Self::row_to_session(&r)))
    }

    /// Slide the idle timer on read (spec §4.2).
    pub async fn touch(&self, id: Uuid) -> RepoResult<()> {
        sqlx::query("UPDATE sessions SET last_activity = NOW() WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await
            .map_err(RepoError::from_sqlx)?;
        Ok(())
    }

    pub async fn invalidate_by_token_hash(&self, token_hash: &str) -> RepoResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(self.db.pool())
            .await
            .map_err(RepoError::from_sqlx)?;
        Ok(())
    }

    /// Invalidate all sessions for a user (spec §3: "invalidated on
    /// logout, password change, role change, or 2FA toggle").
    pub async fn invalidate_all_for_user(&self, user_id: Uuid) -> RepoResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await
            .map_err(RepoError::from_sqlx)?;
        Ok(result.rows_affected())
    }
}
