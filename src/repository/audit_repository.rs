//! Audit log repository — spec §3 AuditLog entity, §4.4 audit writer (C4).
//! Append-only: no update or delete method is exposed.

use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::db::Db;
use crate::errors::{RepoError, RepoResult};

#[derive(Clone)]
pub struct AuditRepository {
    db: Db,
}

pub struct NewAuditRow<'a> {
    pub request_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: &'a str,
    pub target_kind: Option<&'a str>,
    pub target_id: Option<String>,
    pub ip: &'a str,
    pub before_state: Option<serde_json::Value>,
    pub after_state: Option<serde_json::Value>,
    pub detail: Option<String>,
}

impl AuditRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn insert(&self, row: NewAuditRow<'_>) -> RepoResult<()> {
        sqlx::query(
            r#"INSERT INTO audit_log
                 (id, request_id, actor_id, action, target_kind, target_id, ip,
                  before_state, after_state, detail, timestamp)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())"#,
        )
        .bind(Uuid::new_v4())
        .bind(row.request_id)
        .bind(row.actor_id)
        .bind(row.action)
        .bind(row.target_kind)
        .bind(row.target_id)
        .bind(row.ip)
        .bind(row.before_state)
        .bind(row.after_state)
        .bind(row.detail)
        .execute(self.db.pool())
        .await
        .map_err(RepoError::from_sqlx)?;
        Ok(())
    }

    pub async fn insert_tx(tx: &mut Transaction<'_, Postgres>, row: NewAuditRow<'_>) -> RepoResult<()> {
        sqlx::query(
            r#"INSERT INTO audit_log
                 (id, request_id, actor_id, action, target_kind, target_id, ip,
                  before_state, after_state, detail, timestamp)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())"#,
        )
        .bind(Uuid::new_v4())
        .bind(row.request_id)
        .bind(row.actor_id)
        .bind(row.action)
        .bind(row.target_kind)
        .bind(row.target_id)
        .bind(row.ip)
        .bind(row.before_state)
        .bind(row.after_state)
        .bind(row.detail)
        .execute(&mut **tx)
        .await
        .map_err(RepoError::from_sqlx)?;
        Ok(())
    }

    pub async fn count_for_request(&self, request_id: Uuid) -> RepoResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM audit_log WHERE request_id = $1")
            .bind(request_id)
            .fetch_one(self.db.pool())
            .await
            .map_err(RepoError::from_sqlx)?;
        Ok(row.get("n"))
    }
}
