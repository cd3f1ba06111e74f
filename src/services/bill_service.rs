//! Bill assembly orchestration (spec §4.8, C8).
//!
//! State machine `DRAFT(empty) -> in_progress -> FINALIZABLE -> COMPLETED`.
//! `total_weight_kg`/`status` are recomputed inside the same transaction
//! as every attach/detach (pushed into SQL by
//! `BillRepository::recompute_tx`); this service owns the surrounding
//! validation and the one-open-bill-per-parent rule.

use uuid::Uuid;

use crate::db::Db;
use crate::domain::bag::{normalize_qr_id, BagType};
use crate::domain::bill::{Bill, BillStatus};
use crate::errors::{AppError, AppResult, RepoError};
use crate::repository::bag_repository::BagRepository;
use crate::repository::bill_repository::BillRepository;

#[derive(Clone)]
pub struct BillService {
    db: Db,
    bills: BillRepository,
    bags: BagRepository,
    parent_weight_cap_kg: f64,
}

impl BillService {
    pub fn new(db: Db, bills: BillRepository, bags: BagRepository, parent_weight_cap_kg: f64) -> Self {
        Self {
            db,
            bills,
            bags,
            parent_weight_cap_kg,
        }
    }

    pub async fn create_bill(
        &self,
        bill_id: &str,
        parent_bag_count: i32,
        creator_id: Uuid,
    ) -> AppResult<Bill> {
        if parent_bag_count <= 0 {
            return Err(AppError::Validation("parent_bag_count must be positive".to_string()));
        }
        let expected = crate::domain::bill::expected_weight(parent_bag_count, self.parent_weight_cap_kg);
        let bill = self
            .bills
            .create(bill_id, parent_bag_count, expected, creator_id)
            .await?;
        Ok(bill)
    }

    pub async fn get_bill(&self, bill_id: &str) -> AppResult<Bill> {
        Ok(self.bills.find_by_bill_id(bill_id).await?)
    }

    /// Attach a parent bag to a bill. Enforces at-most-one-open-bill per
    /// parent (spec §9 open question, resolved: a parent already attached
    /// to a non-completed bill cannot be attached to another).
    pub async fn attach_parent(&self, bill_id: &str, parent_qr: &str) -> AppResult<Bill> {
        let parent_qr = normalize_qr_id(parent_qr).map_err(AppError::Validation)?;

        let mut tx = self.db.begin().await?;

        let bill = BillRepository::find_by_bill_id_tx(&mut tx, bill_id).await?;
        if bill.status == BillStatus::Completed {
            return Err(AppError::Conflict(format!("bill {bill_id} is already completed")));
        }

        let parent = self
            .bags
            .find_by_qr(&parent_qr)
            .await?
            .ok_or_else(|| AppError::NotFound("bag", parent_qr.clone()))?;
        if parent.bag_type != BagType::Parent {
            return Err(AppError::Validation(format!("{parent_qr} is not a parent bag")));
        }

        if let Some(other_bill_id) = BillRepository::parent_has_open_bill_tx(&mut tx, parent.id).await? {
            if other_bill_id != bill_id {
                return Err(AppError::Conflict(format!(
                    "{parent_qr} is already attached to open bill {other_bill_id}"
                )));
            }
        }

        if BillRepository::is_attached_tx(&mut tx, bill.id, parent.id).await? {
            tx.commit().await.map_err(RepoError::from_sqlx)?;
            return Ok(bill);
        }

        let attached_count = BillRepository::attached_count_tx(&mut tx, bill.id).await?;
        if attached_count >= bill.parent_bag_count as i64 {
            return Err(AppError::Conflict(format!(
                "bill {bill_id} already has its required {} parent bags attached",
                bill.parent_bag_count
            )));
        }

        BillRepository::attach_tx(&mut tx, bill.id, parent.id).await?;
        let updated = BillRepository::recompute_tx(&mut tx, bill.id, self.parent_weight_cap_kg).await?;
        tx.commit().await.map_err(RepoError::from_sqlx)?;
        Ok(updated)
    }

    pub async fn detach_parent(&self, bill_id: &str, parent_qr: &str) -> AppResult<Bill> {
        let parent_qr = normalize_qr_id(parent_qr).map_err(AppError::Validation)?;

        let mut tx = self.db.begin().await?;
        let bill = BillRepository::find_by_bill_id_tx(&mut tx, bill_id).await?;
        if bill.status == BillStatus::Completed {
            return Err(AppError::Conflict(format!(
                "bill {bill_id} is completed and can no longer be modified"
            )));
        }

        let parent = self
            .bags
            .find_by_qr(&parent_qr)
            .await?
            .ok_or_else(|| AppError::NotFound("bag", parent_qr.clone()))?;

        BillRepository::detach_tx(&mut tx, bill.id, parent.id).await?;
        let updated = BillRepository::recompute_tx(&mut tx, bill.id, self.parent_weight_cap_kg).await?;
        tx.commit().await.map_err(RepoError::from_sqlx)?;
        Ok(updated)
    }

    /// Finalize: requires every required parent slot filled (spec §4.8:
    /// `FINALIZABLE` means `attached_count == parent_bag_count`).
    pub async fn finalize_bill(&self, bill_id: &str) -> AppResult<Bill> {
        let mut tx = self.db.begin().await?;
        let bill = BillRepository::find_by_bill_id_tx(&mut tx, bill_id).await?;
        if bill.status == BillStatus::Completed {
            return Err(AppError::Conflict(format!("bill {bill_id} is already completed")));
        }

        let attached_count = BillRepository::attached_count_tx(&mut tx, bill.id).await?;
        if attached_count < bill.parent_bag_count as i64 {
            return Err(AppError::Conflict(format!(
                "bill {bill_id} has {attached_count}/{} parent bags attached",
                bill.parent_bag_count
            )));
        }

        let finalized = BillRepository::finalize_tx(&mut tx, bill.id).await?;
        tx.commit().await.map_err(RepoError::from_sqlx)?;
        Ok(finalized)
    }

    /// Delete a bill. `COMPLETED` bills are otherwise immutable (spec
    /// §4.8), but this is their one admin-only escape hatch — the caller
    /// is responsible for the role check; this method always deletes.
    /// Returns the deleted bill so the caller can record an audit
    /// before-snapshot.
    pub async fn delete_bill(&self, bill_id: &str) -> AppResult<Bill> {
        let mut tx = self.db.begin().await?;
        let bill = BillRepository::find_by_bill_id_tx(&mut tx, bill_id).await?;
        BillRepository::delete_tx(&mut tx, bill.id).await?;
        tx.commit().await.map_err(RepoError::from_sqlx)?;
        Ok(bill)
    }
}
