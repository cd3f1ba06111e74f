//! Scan pipeline orchestration (spec §4.7, C7).
//!
//! One `ScanSessionBuffer` lives per active scanning session, keyed by
//! session id in a `DashMap`. The state machine is
//! `NO_PARENT <-> PARENT_SET`: a parent scan opens (or replaces) the
//! buffer, child scans append to it, and `finish_scanning` commits the
//! buffered children as links in one transaction.

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::Db;
use crate::domain::bag::BagType;
use crate::domain::scan::{AppendOutcome, ScanSessionBuffer};
use crate::errors::{AppError, AppResult, RepoError};
use crate::repository::bag_repository::BagRepository;
use crate::repository::link_repository::LinkRepository;
use crate::repository::scan_repository::ScanRepository;

pub struct ChildScanResult {
    pub outcome: AppendOutcome,
    pub buffered_count: usize,
}

pub struct ParentScanResult {
    pub qr_id: String,
    pub existing_child_count: i64,
}

pub struct FinishSummary {
    pub parent_qr_id: String,
    pub linked: usize,
    pub already_linked: usize,
}

#[derive(Clone)]
pub struct ScanService {
    db: Db,
    buffers: std::sync::Arc<DashMap<Uuid, Mutex<ScanSessionBuffer>>>,
}

impl ScanService {
    pub fn new(db: Db) -> Self {
        Self {
            db,
            buffers: std::sync::Arc::new(DashMap::new()),
        }
    }

    /// Begin (or restart) a scanning session on a parent bag. Replaces
    /// any buffer already open for this session, per spec §4.7: scanning
    /// a new parent starts a fresh batch.
    pub async fn scan_parent(
        &self,
        session_id: Uuid,
        scanner_id: Uuid,
        parent_qr: &str,
        response_time_ms: f64,
    ) -> AppResult<ParentScanResult> {
        let qr_id = crate::domain::bag::normalize_qr_id(parent_qr).map_err(AppError::Validation)?;

        let mut tx = self.db.begin().await?;
        let parent = BagRepository::find_or_create_tx(&mut tx, &qr_id, BagType::Parent, None).await?;
        ScanRepository::insert_tx(&mut tx, scanner_id, Some(parent.id), None, response_time_ms).await?;
        let existing_child_count = LinkRepository::count_children_of_parent_tx(&mut tx, parent.id).await?;
        tx.commit().await.map_err(RepoError::from_sqlx)?;

        let buffer = ScanSessionBuffer::new(qr_id.clone(), parent.id, chrono::Utc::now());
        self.buffers.insert(session_id, Mutex::new(buffer));
        Ok(ParentScanResult {
            qr_id,
            existing_child_count,
        })
    }

    /// Append a child scan to the buffer open for this session
    /// (`PARENT_SET` state required; `NO_PARENT` is a validation error).
    pub async fn scan_child(
        &self,
        session_id: Uuid,
        scanner_id: Uuid,
        child_qr: &str,
        response_time_ms: f64,
    ) -> AppResult<ChildScanResult> {
        let qr_id = crate::domain::bag::normalize_qr_id(child_qr).map_err(AppError::Validation)?;

        let entry = self
            .buffers
            .get(&session_id)
            .ok_or_else(|| AppError::Validation("no parent scan in progress for this session".to_string()))?;
        let mut buffer = entry.lock().await;

        let mut tx = self.db.begin().await?;
        let child = BagRepository::find_or_create_tx(&mut tx, &qr_id, BagType::Child, None).await?;
        let outcome = buffer.try_append(&qr_id, child.id);

        // Every child scan writes a row regardless of suppression, for
        // audit completeness (spec §4.7); only the buffer append itself
        // is gated on the dedup outcome.
        ScanRepository::insert_tx(&mut tx, scanner_id, None, Some(child.id), response_time_ms).await?;
        tx.commit().await.map_err(RepoError::from_sqlx)?;

        Ok(ChildScanResult {
            outcome,
            buffered_count: buffer.len(),
        })
    }

    /// Commit the buffer: every distinct buffered child is linked to the
    /// session's parent inside one transaction. Children already linked
    /// to a *different* parent are reported, not silently overwritten
    /// (spec §3: "a child appears in at most one link").
    pub async fn finish_scanning(&self, session_id: Uuid, creator_id: Uuid) -> AppResult<FinishSummary> {
        let (_, buffer_cell) = self
            .buffers
            .remove(&session_id)
            .ok_or_else(|| AppError::Validation("no scan session in progress".to_string()))?;
        let buffer = buffer_cell.into_inner();

        let mut linked = 0usize;
        let mut already_linked = 0usize;

        let mut tx = self.db.begin().await?;
        for child in &buffer.children {
            match LinkRepository::find_parent_of_child_tx(&mut tx, child.bag_id).await? {
                Some(_) => {
                    already_linked += 1;
                }
                None => {
                    LinkRepository::create_tx(&mut tx, buffer.parent_bag_id, child.bag_id, creator_id).await?;
                    linked += 1;
                }
            }
        }
        tx.commit().await.map_err(RepoError::from_sqlx)?;

        Ok(FinishSummary {
            parent_qr_id: buffer.parent_qr_id,
            linked,
            already_linked,
        })
    }

    /// Drop a session's buffer without committing (explicit cancel, or
    /// cleanup after a disconnect).
    pub fn abandon(&self, session_id: Uuid) {
        self.buffers.remove(&session_id);
    }
}
