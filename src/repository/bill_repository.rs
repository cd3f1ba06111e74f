//! Bill repository — spec §3 Bill/BillBag entities, §4.8 bill assembly.

use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::db::Db;
use crate::domain::bill::Bill;
use crate::errors::{RepoError, RepoResult};

#[derive(Clone)]
pub struct BillRepository {
    db: Db,
}

impl BillRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    fn row_to_bill(row: &sqlx::postgres::PgRow) -> Bill {
        Bill {
            id: row.get("id"),
            bill_id: row.get("bill_id"),
            parent_bag_count: row.get("parent_bag_count"),
            total_weight_kg: row.get("total_weight_kg"),
            expected_weight_kg: row.get("expected_weight_kg"),
            status: row.get("status"),
            created_at: row.get("created_at"),
            creator_id: row.get("creator_id"),
        }
    }

    pub async fn create(
        &self,
        bill_id: &str,
        parent_bag_count: i32,
        expected_weight_kg: f64,
        creator_id: Uuid,
    ) -> RepoResult<Bill> {
        let id = Uuid::new_v4();
        let row = sqlx::query(
            r#"INSERT INTO bills (id, bill_id, parent_bag_count, total_weight_kg,
                                  expected_weight_kg, status, created_at, creator_id)
               VALUES ($1, $2, $3, 0.0, $4, 'empty', NOW(), $5)
               RETURNING id, bill_id, parent_bag_count, total_weight_kg, expected_weight_kg,
                         status, created_at, creator_id"#,
        )
        .bind(id)
        .bind(bill_id)
        .bind(parent_bag_count)
        .bind(expected_weight_kg)
        .bind(creator_id)
        .fetch_one(self.db.pool())
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(Self::row_to_bill(&row))
    }

    pub async fn find_by_bill_id(&self, bill_id: &str) -> RepoResult<Bill> {
        let row = sqlx::query(
            r#"SELECT id, bill_id, parent_bag_count, total_weight_kg, expected_weight_kg,
                      status, created_at, creator_id
               FROM bills WHERE bill_id = $1"#,
        )
        .bind(bill_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(RepoError::from_sqlx)?
        .ok_or(RepoError::NotFound)?;

        Ok(Self::row_to_bill(&row))
    }

    pub async fn find_by_bill_id_tx(
        tx: &mut Transaction<'_, Postgres>,
        bill_id: &str,
    ) -> RepoResult<Bill> {
        let row = sqlx::query(
            r#"SELECT id, bill_id, parent_bag_count, total_weight_kg, expected_weight_kg,
                      status, created_at, creator_id
               FROM bills WHERE bill_id = $1 FOR UPDATE"#,
        )
        .bind(bill_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(RepoError::from_sqlx)?
        .ok_or(RepoError::NotFound)?;

        Ok(Self::row_to_bill(&row))
    }

    /// Whether a parent bag is already attached to an open (non-completed)
    /// bill somewhere (spec §9 open question, resolved: at-most-one-open
    /// default). Row-locks the candidate join, consistent with §5's
    /// locking discipline.
    pub async fn parent_has_open_bill_tx(
        tx: &mut Transaction<'_, Postgres>,
        bag_id: Uuid,
    ) -> RepoResult<Option<String>> {
        let row = sqlx::query(
            r#"SELECT b.bill_id FROM bill_bags bb
               JOIN bills b ON b.id = bb.bill_id
               WHERE bb.bag_id = $1 AND b.status != 'completed'
               FOR UPDATE OF b"#,
        )
        .bind(bag_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(row.map(|r| r.get("bill_id")))
    }

    pub async fn is_attached_tx(
        tx: &mut Transaction<'_, Postgres>,
        bill_id: Uuid,
        bag_id: Uuid,
    ) -> RepoResult<bool> {
        let row = sqlx::query("SELECT 1 AS x FROM bill_bags WHERE bill_id = $1 AND bag_id = $2")
            .bind(bill_id)
            .bind(bag_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(RepoError::from_sqlx)?;
        Ok(row.is_some())
    }

    pub async fn attach_tx(
        tx: &mut Transaction<'_, Postgres>,
        bill_id: Uuid,
        bag_id: Uuid,
    ) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO bill_bags (bill_id, bag_id, attached_at) VALUES ($1, $2, NOW())",
        )
        .bind(bill_id)
        .bind(bag_id)
        .execute(&mut **tx)
        .await
        .map_err(RepoError::from_sqlx)?;
        Ok(())
    }

    pub async fn detach_tx(
        tx: &mut Transaction<'_, Postgres>,
        bill_id: Uuid,
        bag_id: Uuid,
    ) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM bill_bags WHERE bill_id = $1 AND bag_id = $2")
            .bind(bill_id)
            .bind(bag_id)
            .execute(&mut **tx)
            .await
            .map_err(RepoError::from_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    /// Recompute `total_weight_kg` and `status` from the authoritative
    /// `bill_bags`/`links` tables inside the caller's transaction (spec
    /// §4.8: "recomputed on every attach/detach ... inside the same
    /// transaction"). Pushes the `LEAST(count, cap)` weight rule into SQL.
    pub async fn recompute_tx(
        tx: &mut Transaction<'_, Postgres>,
        bill_id: Uuid,
        cap_kg: f64,
    ) -> RepoResult<Bill> {
        let row = sqlx::query(
            r#"WITH contributions AS (
                   SELECT bb.bag_id,
                          LEAST(COUNT(l.child_id), $2) AS contribution
                   FROM bill_bags bb
                   LEFT JOIN links l ON l.parent_id = bb.bag_id
                   WHERE bb.bill_id = $1
                   GROUP BY bb.bag_id
               ),
               totals AS (
                   SELECT COALESCE(SUM(contribution), 0.0) AS total_weight,
                          COUNT(*) AS attached_count
                   FROM contributions
               )
               UPDATE bills
               SET total_weight_kg = totals.total_weight,
                   status = CASE
                       WHEN totals.attached_count::int >= bills.parent_bag_count
                            AND bills.status = 'completed' THEN 'completed'
                       WHEN totals.attached_count::int = 0 THEN 'empty'
                       ELSE 'in_progress'
                   END
               FROM totals
               WHERE bills.id = $1
               RETURNING bills.id, bills.bill_id, bills.parent_bag_count, bills.total_weight_kg,
                         bills.expected_weight_kg, bills.status, bills.created_at, bills.creator_id"#,
        )
        .bind(bill_id)
        .bind(cap_kg)
        .fetch_one(&mut **tx)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(Self::row_to_bill(&row))
    }

    pub async fn attached_count_tx(
        tx: &mut Transaction<'_, Postgres>,
        bill_id: Uuid,
    ) -> RepoResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM bill_bags WHERE bill_id = $1")
            .bind(bill_id)
            .fetch_one(&mut **tx)
            .await
            .map_err(RepoError::from_sqlx)?;
        Ok(row.get("n"))
    }

    pub async fn finalize_tx(tx: &mut Transaction<'_, Postgres>, bill_id: Uuid) -> RepoResult<Bill> {
        let row = sqlx::query(
            r#"UPDATE bills SET status = 'completed' WHERE id = $1
               RETURNING id, bill_id, parent_bag_count, total_weight_kg, expected_weight_kg,
                         status, created_at, creator_id"#,
        )
        .bind(bill_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(Self::row_to_bill(&row))
    }

    pub async fn delete_tx(tx: &mut Transaction<'_, Postgres>, bill_id: Uuid) -> RepoResult<()> {
        sqlx::query("DELETE FROM bill_bags WHERE bill_id = $1")
            .bind(bill_id)
            .execute(&mut **tx)
            .await
            .map_err(RepoError::from_sqlx)?;
        sqlx::query("DELETE FROM bills WHERE id = $1")
            .bind(bill_id)
            .execute(&mut **tx)
            .await
            .map_err(RepoError::from_sqlx)?;
        Ok(())
    }
}
