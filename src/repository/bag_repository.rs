//! Bag repository — spec §3 Bag entity, §4.6 Bag/Link domain operations.

use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::db::Db;
use crate::domain::bag::{Bag, BagType};
use crate::errors::{RepoError, RepoResult};

#[derive(Clone)]
pub struct BagRepository {
    db: Db,
}

impl BagRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    fn row_to_bag(row: &sqlx::postgres::PgRow) -> Bag {
        Bag {
            id: row.get("id"),
            qr_id: row.get("qr_id"),
            bag_type: row.get("bag_type"),
            owner_id: row.get("owner_id"),
            notes: row.get("notes"),
            created_at: row.get("created_at"),
            deleted_at: row.get("deleted_at"),
        }
    }

    pub async fn find_by_qr(&self, qr_id: &str) -> RepoResult<Option<Bag>> {
        let row = sqlx::query(
            r#"SELECT id, qr_id, bag_type, owner_id, notes, created_at, deleted_at
               FROM bags WHERE qr_id = $1 AND deleted_at IS NULL"#,
        )
        .bind(qr_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(row.map(|r| Self::row_to_bag(&r)))
    }

    pub async fn find_by_id(&self, id: Uuid) -> RepoResult<Bag> {
        let row = sqlx::query(
            r#"SELECT id, qr_id, bag_type, owner_id, notes, created_at, deleted_at
               FROM bags WHERE id = $1 AND deleted_at IS NULL"#,
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(RepoError::from_sqlx)?
        .ok_or(RepoError::NotFound)?;

        Ok(Self::row_to_bag(&row))
    }

    pub async fn create(
        &self,
        qr_id: &str,
        bag_type: BagType,
        owner_id: Option<Uuid>,
    ) -> RepoResult<Bag> {
        let id = Uuid::new_v4();
        let row = sqlx::query(
            r#"INSERT INTO bags (id, qr_id, bag_type, owner_id, created_at)
               VALUES ($1, $2, $3, $4, NOW())
               RETURNING id, qr_id, bag_type, owner_id, notes, created_at, deleted_at"#,
        )
        .bind(id)
        .bind(qr_id)
        .bind(bag_type)
        .bind(owner_id)
        .fetch_one(self.db.pool())
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(Self::row_to_bag(&row))
    }

    /// Create-or-fetch within an existing transaction, used by the scan
    /// pipeline's "create on first sight" rule (spec §4.7). Returns
    /// `Err(Conflict)` if a bag with this qr already exists with a
    /// different type than requested.
    pub async fn find_or_create_tx(
        tx: &mut Transaction<'_, Postgres>,
        qr_id: &str,
        bag_type: BagType,
        owner_id: Option<Uuid>,
    ) -> RepoResult<Bag> {
        if let Some(row) = sqlx::query(
            r#"SELECT id, qr_id, bag_type, owner_id, notes, created_at, deleted_at
               FROM bags WHERE qr_id = $1 AND deleted_at IS NULL"#,
        )
        .bind(qr_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(RepoError::from_sqlx)?
        {
            let existing = Self::row_to_bag(&row);
            if existing.bag_type != bag_type {
                return Err(RepoError::Conflict(format!(
                    "{qr_id} already registered as {:?}",
                    existing.bag_type
                )));
            }
            return Ok(existing);
        }

        let id = Uuid::new_v4();
        let row = sqlx::query(
            r#"INSERT INTO bags (id, qr_id, bag_type, owner_id, created_at)
               VALUES ($1, $2, $3, $4, NOW())
               RETURNING id, qr_id, bag_type, owner_id, notes, created_at, deleted_at"#,
        )
        .bind(id)
        .bind(qr_id)
        .bind(bag_type)
        .bind(owner_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(Self::row_to_bag(&row))
    }

    pub async fn soft_delete(&self, id: Uuid) -> RepoResult<()> {
        let result = sqlx::query("UPDATE bags SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .execute(self.db.pool())
            .await
            .map_err(RepoError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    pub async fn soft_delete_tx(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> RepoResult<()> {
        sqlx::query("UPDATE bags SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(RepoError::from_sqlx)?;
        Ok(())
    }
}
