//! Bag/link domain operations (spec §4.6, C6).

use uuid::Uuid;

use crate::db::Db;
use crate::domain::bag::{normalize_qr_id, Bag, BagDetail, BagType};
use crate::errors::{AppError, AppResult};
use crate::repository::bag_repository::BagRepository;
use crate::repository::link_repository::LinkRepository;

#[derive(Clone)]
pub struct BagService {
    db: Db,
    bags: BagRepository,
    links: LinkRepository,
}

impl BagService {
    pub fn new(db: Db, bags: BagRepository, links: LinkRepository) -> Self {
        Self { db, bags, links }
    }

    pub async fn create_bag(
        &self,
        raw_qr: &str,
        bag_type: BagType,
        owner_id: Option<Uuid>,
    ) -> AppResult<Bag> {
        let qr_id = normalize_qr_id(raw_qr).map_err(AppError::Validation)?;
        if self.bags.find_by_qr(&qr_id).await?.is_some() {
            return Err(AppError::Conflict(format!("{qr_id} already registered")));
        }
        let bag = self.bags.create(&qr_id, bag_type, owner_id).await?;
        Ok(bag)
    }

    pub async fn get_bag(&self, raw_qr: &str) -> AppResult<BagDetail> {
        let qr_id = normalize_qr_id(raw_qr).map_err(AppError::Validation)?;
        let bag = self
            .bags
            .find_by_qr(&qr_id)
            .await?
            .ok_or_else(|| AppError::NotFound("bag", qr_id.clone()))?;

        let (parent, children) = match bag.bag_type {
            BagType::Parent => {
                let child_ids = self.links.children_of(bag.id).await?;
                let mut children = Vec::with_capacity(child_ids.len());
                for id in child_ids {
                    children.push(self.bags.find_by_id(id).await?);
                }
                (None, children)
            }
            BagType::Child => {
                let parent = match self.links.find_parent_of_child(bag.id).await? {
                    Some(parent_id) => Some(self.bags.find_by_id(parent_id).await?),
                    None => None,
                };
                (parent, Vec::new())
            }
        };

        Ok(BagDetail { bag, parent, children })
    }

    /// Link a child to a parent outside the scan pipeline (spec §4.6
    /// direct-link operation; a child has at most one parent).
    pub async fn link(&self, parent_qr: &str, child_qr: &str, creator_id: Uuid) -> AppResult<()> {
        let parent_qr = normalize_qr_id(parent_qr).map_err(AppError::Validation)?;
        let child_qr = normalize_qr_id(child_qr).map_err(AppError::Validation)?;

        let mut tx = self.db.begin().await?;

        let parent = self
            .bags
            .find_by_qr(&parent_qr)
            .await?
            .ok_or_else(|| AppError::NotFound("bag", parent_qr.clone()))?;
        if parent.bag_type != BagType::Parent {
            return Err(AppError::Validation(format!("{parent_qr} is not a parent bag")));
        }

        let child = self
            .bags
            .find_by_qr(&child_qr)
            .await?
            .ok_or_else(|| AppError::NotFound("bag", child_qr.clone()))?;
        if child.bag_type != BagType::Child {
            return Err(AppError::Validation(format!("{child_qr} is not a child bag")));
        }

        if let Some(existing) = LinkRepository::find_parent_of_child_tx(&mut tx, child.id).await? {
            if existing == parent.id {
                tx.commit().await.map_err(crate::errors::RepoError::from_sqlx)?;
                return Ok(());
            }
            return Err(AppError::Conflict(format!(
                "{child_qr} is already linked to another parent"
            )));
        }

        LinkRepository::create_tx(&mut tx, parent.id, child.id, creator_id).await?;
        tx.commit().await.map_err(crate::errors::RepoError::from_sqlx)?;
        Ok(())
    }

    pub async fn unlink(&self, parent_qr: &str, child_qr: &str) -> AppResult<()> {
        let parent_qr = normalize_qr_id(parent_qr).map_err(AppError::Validation)?;
        let child_qr = normalize_qr_id(child_qr).map_err(AppError::Validation)?;

        let parent = self
            .bags
            .find_by_qr(&parent_qr)
            .await?
            .ok_or_else(|| AppError::NotFound("bag", parent_qr.clone()))?;
        let child = self
            .bags
            .find_by_qr(&child_qr)
            .await?
            .ok_or_else(|| AppError::NotFound("bag", child_qr.clone()))?;

        self.links.delete(parent.id, child.id).await?;
        Ok(())
    }

    /// Soft-delete (spec §9 open question, resolved: bags are soft
    /// deleted via `deleted_at` so historical scans/bills keep referring
    /// to a real row).
    ///
    /// A parent with existing children is rejected with `Conflict` unless
    /// `cascade` is set, per spec §4.6: deleting a parent must not
    /// silently sever its children's links.
    pub async fn delete_bag(&self, raw_qr: &str, cascade: bool) -> AppResult<()> {
        let qr_id = normalize_qr_id(raw_qr).map_err(AppError::Validation)?;
        let bag = self
            .bags
            .find_by_qr(&qr_id)
            .await?
            .ok_or_else(|| AppError::NotFound("bag", qr_id.clone()))?;

        let mut tx = self.db.begin().await?;
        match bag.bag_type {
            BagType::Parent => {
                let child_count = LinkRepository::count_children_of_parent_tx(&mut tx, bag.id).await?;
                if child_count > 0 && !cascade {
                    return Err(AppError::Conflict(format!(
                        "{qr_id} still has {child_count} linked child bag(s); pass cascade=true to delete anyway"
                    )));
                }
                LinkRepository::delete_all_for_parent_tx(&mut tx, bag.id).await?
            }
            BagType::Child => LinkRepository::delete_for_child_tx(&mut tx, bag.id).await?,
        }
        BagRepository::soft_delete_tx(&mut tx, bag.id).await?;
        tx.commit().await.map_err(crate::errors::RepoError::from_sqlx)?;
        Ok(())
    }
}
