//! Scan repository — spec §3 Scan entity. Append-only: no update/delete.

use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::db::Db;
use crate::domain::scan::Scan;
use crate::errors::{RepoError, RepoResult};

#[derive(Clone)]
pub struct ScanRepository {
    db: Db,
}

impl ScanRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn insert(
        &self,
        scanner_id: Uuid,
        parent_bag_id: Option<Uuid>,
        child_bag_id: Option<Uuid>,
        response_time_ms: f64,
    ) -> RepoResult<Scan> {
        debug_assert!(
            parent_bag_id.is_some() != child_bag_id.is_some(),
            "exactly one of parent/child must be set (spec §3)"
        );
        let id = Uuid::new_v4();
        let row = sqlx::query(
            r#"INSERT INTO scans (id, scanner_id, parent_bag_id, child_bag_id, timestamp, response_time_ms)
               VALUES ($1, $2, $3, $4, NOW(), $5)
               RETURNING id, scanner_id, parent_bag_id, child_bag_id, timestamp, response_time_ms"#,
        )
        .bind(id)
        .bind(scanner_id)
        .bind(parent_bag_id)
        .bind(child_bag_id)
        .bind(response_time_ms)
        .fetch_one(self.db.pool())
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(Self::row_to_scan(&row))
    }

    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        scanner_id: Uuid,
        parent_bag_id: Option<Uuid>,
        child_bag_id: Option<Uuid>,
        response_time_ms: f64,
    ) -> RepoResult<()> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"INSERT INTO scans (id, scanner_id, parent_bag_id, child_bag_id, timestamp, response_time_ms)
               VALUES ($1, $2, $3, $4, NOW(), $5)"#,
        )
        .bind(id)
        .bind(scanner_id)
        .bind(parent_bag_id)
        .bind(child_bag_id)
        .bind(response_time_ms)
        .execute(&mut **tx)
        .await
        .map_err(RepoError::from_sqlx)?;
        Ok(())
    }

    pub async fn count_by_user_today(&self, user_id: Uuid) -> RepoResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM scans WHERE scanner_id = $1 AND timestamp::date = CURRENT_DATE",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await
        .map_err(RepoError::from_sqlx)?;
        Ok(row.get("n"))
    }

    fn row_to_scan(row: &sqlx::postgres::PgRow) -> Scan {
        Scan {
            id: row.get("id"),
            scanner_id: row.get("scanner_id"),
            parent_bag_id: row.get("parent_bag_id"),
            child_bag_id: row.get("child_bag_id"),
            timestamp: row.get("timestamp"),
            response_time_ms: row.get("response_time_ms"),
        }
    }
}
