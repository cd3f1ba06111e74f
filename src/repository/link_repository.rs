//! Link repository — spec §3 Link entity, §4.6/§4.7 parent/child linking.

use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::db::Db;
use crate::domain::bag::Link;
use crate::errors::{RepoError, RepoResult};

#[derive(Clone)]
pub struct LinkRepository {
    db: Db,
}

impl LinkRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// The parent a child is currently linked to, if any (spec §3: "a
    /// child appears in at most one link").
    pub async fn find_parent_of_child(&self, child_id: Uuid) -> RepoResult<Option<Uuid>> {
        let row = sqlx::query("SELECT parent_id FROM links WHERE child_id = $1")
            .bind(child_id)
            .fetch_optional(self.db.pool())
            .await
            .map_err(RepoError::from_sqlx)?;
        Ok(row.map(|r| r.get("parent_id")))
    }

    pub async fn find_parent_of_child_tx(
        tx: &mut Transaction<'_, Postgres>,
        child_id: Uuid,
    ) -> RepoResult<Option<Uuid>> {
        let row = sqlx::query("SELECT parent_id FROM links WHERE child_id = $1 FOR UPDATE")
            .bind(child_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(RepoError::from_sqlx)?;
        Ok(row.map(|r| r.get("parent_id")))
    }

    pub async fn create(&self, parent_id: Uuid, child_id: Uuid, creator_id: Uuid) -> RepoResult<Link> {
        let row = sqlx::query(
            r#"INSERT INTO links (parent_id, child_id, creator_id, created_at)
               VALUES ($1, $2, $3, NOW())
               RETURNING parent_id, child_id, creator_id, created_at"#,
        )
        .bind(parent_id)
        .bind(child_id)
        .bind(creator_id)
        .fetch_one(self.db.pool())
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(Link {
            parent_id: row.get("parent_id"),
            child_id: row.get("child_id"),
            creator_id: row.get("creator_id"),
            created_at: row.get("created_at"),
        })
    }

    pub async fn create_tx(
        tx: &mut Transaction<'_, Postgres>,
        parent_id: Uuid,
        child_id: Uuid,
        creator_id: Uuid,
    ) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO links (parent_id, child_id, creator_id, created_at) VALUES ($1, $2, $3, NOW())",
        )
        .bind(parent_id)
        .bind(child_id)
        .bind(creator_id)
        .execute(&mut **tx)
        .await
        .map_err(RepoError::from_sqlx)?;
        Ok(())
    }

    pub async fn delete(&self, parent_id: Uuid, child_id: Uuid) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM links WHERE parent_id = $1 AND child_id = $2")
            .bind(parent_id)
            .bind(child_id)
            .execute(self.db.pool())
            .await
            .map_err(RepoError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    pub async fn delete_all_for_parent_tx(
        tx: &mut Transaction<'_, Postgres>,
        parent_id: Uuid,
    ) -> RepoResult<()> {
        sqlx::query("DELETE FROM links WHERE parent_id = $1")
            .bind(parent_id)
            .execute(&mut **tx)
            .await
            .map_err(RepoError::from_sqlx)?;
        Ok(())
    }

    pub async fn delete_for_child_tx(
        tx: &mut Transaction<'_, Postgres>,
        child_id: Uuid,
    ) -> RepoResult<()> {
        sqlx::query("DELETE FROM links WHERE child_id = $1")
            .bind(child_id)
            .execute(&mut **tx)
            .await
            .map_err(RepoError::from_sqlx)?;
        Ok(())
    }

    pub async fn count_children_of_parent(&self, parent_id: Uuid) -> RepoResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM links WHERE parent_id = $1")
            .bind(parent_id)
            .fetch_one(self.db.pool())
            .await
            .map_err(RepoError::from_sqlx)?;
        Ok(row.get("n"))
    }

    pub async fn count_children_of_parent_tx(
        tx: &mut Transaction<'_, Postgres>,
        parent_id: Uuid,
    ) -> RepoResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM links WHERE parent_id = $1")
            .bind(parent_id)
            .fetch_one(&mut **tx)
            .await
            .map_err(RepoError::from_sqlx)?;
        Ok(row.get("n"))
    }

    pub async fn children_of(&self, parent_id: Uuid) -> RepoResult<Vec<Uuid>> {
        let rows = sqlx::query("SELECT child_id FROM links WHERE parent_id = $1")
            .bind(parent_id)
            .fetch_all(self.db.pool())
            .await
            .map_err(RepoError::from_sqlx)?;
        Ok(rows.into_iter().map(|r| r.get("child_id")).collect())
    }
}
