//! User repository — spec §3 User entity, §4.2 identity operations.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::db::Db;
use crate::domain::user::{CreateUserRequest, Role, User};
use crate::errors::{RepoError, RepoResult};

#[derive(Clone)]
pub struct UserRepository {
    db: Db,
}

impl UserRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    fn row_to_user(row: &sqlx::postgres::PgRow) -> User {
        User {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            role: row.get("role"),
            password_hash: row.get("password_hash"),
            failed_login_count: row.get("failed_login_count"),
            lockout_until: row.get("lockout_until"),
            totp_secret: row.get("totp_secret"),
            two_fa_enabled: row.get("two_fa_enabled"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    /// Case-insensitive username lookup (spec §3: "unique case-insensitive
    /// username").
    pub async fn find_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let row = sqlx::query(
            r#"SELECT id, username, email, role, password_hash, failed_login_count,
                      lockout_until, totp_secret, two_fa_enabled, created_at, updated_at
               FROM users WHERE lower(username) = lower($1)"#,
        )
        .bind(username)
        .fetch_optional(self.db.pool())
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(row.map(|r| Self::row_to_user(&r)))
    }

    pub async fn find_by_id(&self, id: Uuid) -> RepoResult<User> {
        let row = sqlx::query(
            r#"SELECT id, username, email, role, password_hash, failed_login_count,
                      lockout_until, totp_secret, two_fa_enabled, created_at, updated_at
               FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(RepoError::from_sqlx)?
        .ok_or(RepoError::NotFound)?;

        Ok(Self::row_to_user(&row))
    }

    pub async fn create(&self, req: &CreateUserRequest, password_hash: &str) -> RepoResult<User> {
        let id = Uuid::new_v4();
        let row = sqlx::query(
            r#"INSERT INTO users (id, username, email, password_hash, role, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
               RETURNING id, username, email, role, password_hash, failed_login_count,
                         lockout_until, totp_secret, two_fa_enabled, created_at, updated_at"#,
        )
        .bind(id)
        .bind(&req.username)
        .bind(&req.email)
        .bind(password_hash)
        .bind(req.role)
        .fetch_one(self.db.pool())
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(Self::row_to_user(&row))
    }

    /// Increment the failed-login counter; if it reaches the threshold,
    /// set `lockout_until` (spec §4.2 state machine).
    pub async fn record_failed_login(
        &self,
        id: Uuid,
        threshold: i32,
        lockout_until: DateTime<Utc>,
    ) -> RepoResult<i32> {
        let row = sqlx::query(
            r#"UPDATE users
               SET failed_login_count = failed_login_count + 1,
                   lockout_until = CASE
                       WHEN failed_login_count + 1 >= $2 THEN $3
                       ELSE lockout_until
                   END,
                   updated_at = NOW()
               WHERE id = $1
               RETURNING failed_login_count"#,
        )
        .bind(id)
        .bind(threshold)
        .bind(lockout_until)
        .fetch_one(self.db.pool())
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(row.get("failed_login_count"))
    }

    pub async fn reset_failed_login(&self, id: Uuid) -> RepoResult<()> {
        sqlx::query(
            "UPDATE users SET failed_login_count = 0, lockout_until = NULL, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(self.db.pool())
        .await
        .map_err(RepoError::from_sqlx)?;
        Ok(())
    }

    /// Enable 2FA: requires the caller already re-verified the current
    /// password (spec §4.2).
    pub async fn enable_2fa(&self, id: Uuid, totp_secret: &str) -> RepoResult<()> {
        sqlx::query(
            "UPDATE users SET totp_secret = $2, two_fa_enabled = true, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(totp_secret)
        .execute(self.db.pool())
        .await
        .map_err(RepoError::from_sqlx)?;
        Ok(())
    }

    pub async fn disable_2fa(&self, id: Uuid) -> RepoResult<()> {
        sqlx::query(
            "UPDATE users SET totp_secret = NULL, two_fa_enabled = false, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(self.db.pool())
        .await
        .map_err(RepoError::from_sqlx)?;
        Ok(())
    }

    pub async fn update_role(&self, id: Uuid, role: Role) -> RepoResult<()> {
        sqlx::query("UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(role)
            .execute(self.db.pool())
            .await
            .map_err(RepoError::from_sqlx)?;
        Ok(())
    }
}
