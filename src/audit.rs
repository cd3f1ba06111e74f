//! Audit scope helper (spec §4.4, C4).
//!
//! Every mutating request gets a request id up front; the scope carries
//! it through the handler and writes one row to `audit_log` on the way
//! out. Security-critical actions (login, 2FA, role changes) write
//! synchronously inside the same transaction as the mutation; everything
//! else is written after commit, fire-and-forget, so a slow audit insert
//! never adds latency to the hot path.

use serde::Serialize;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::repository::audit_repository::{AuditRepository, NewAuditRow};

/// Whether an audited action must be durable before the response is
/// sent, or may be recorded best-effort after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditCriticality {
    /// Login, logout, 2FA enable/disable, role change, account lockout.
    Critical,
    /// Everything else: scans, bag/bill CRUD.
    Routine,
}

pub struct AuditScope {
    pub request_id: Uuid,
    actor_id: Option<Uuid>,
    ip: String,
    repo: AuditRepository,
}

impl AuditScope {
    pub fn new(repo: AuditRepository, actor_id: Option<Uuid>, ip: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            actor_id,
            ip: ip.into(),
            repo,
        }
    }

    /// Like [`AuditScope::new`], but correlates with a request id that
    /// already exists (the one `LoggingMiddleware` stamps into request
    /// extensions) instead of minting a fresh one.
    pub fn with_request_id(request_id: Uuid, repo: AuditRepository, actor_id: Option<Uuid>, ip: impl Into<String>) -> Self {
        Self {
            request_id,
            actor_id,
            ip: ip.into(),
            repo,
        }
    }

    /// Write synchronously inside the caller's transaction. Used for
    /// `AuditCriticality::Critical` actions so the audit row commits
    /// atomically with the state change it describes.
    pub async fn record_tx<B: Serialize, A: Serialize>(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        action: &str,
        target_kind: Option<&str>,
        target_id: Option<String>,
        before: Option<B>,
        after: Option<A>,
    ) -> Result<(), crate::errors::RepoError> {
        let row = NewAuditRow {
            request_id: self.request_id,
            actor_id: self.actor_id,
            action,
            target_kind,
            target_id,
            ip: &self.ip,
            before_state: before.map(|b| serde_json::to_value(b).unwrap_or_default()),
            after_state: after.map(|a| serde_json::to_value(a).unwrap_or_default()),
            detail: None,
        };
        AuditRepository::insert_tx(tx, row).await
    }

    /// Write outside any transaction, after the mutation has already
    /// committed (`AuditCriticality::Routine`). Logged, never propagated
    /// as a request failure — spec §4.4: audit-write failure must not
    /// fail the user-facing request.
    pub async fn record_best_effort<B: Serialize, A: Serialize>(
        &self,
        action: &str,
        target_kind: Option<&str>,
        target_id: Option<String>,
        before: Option<B>,
        after: Option<A>,
    ) {
        let row = NewAuditRow {
            request_id: self.request_id,
            actor_id: self.actor_id,
            action,
            target_kind,
            target_id,
            ip: &self.ip,
            before_state: before.map(|b| serde_json::to_value(b).unwrap_or_default()),
            after_state: after.map(|a| serde_json::to_value(a).unwrap_or_default()),
            detail: None,
        };
        if let Err(e) = self.repo.insert(row).await {
            tracing::error!(error = %e, request_id = %self.request_id, action, "audit write failed");
        }
    }

    pub fn record(&self, action: &str, criticality: AuditCriticality) {
        tracing::debug!(
            request_id = %self.request_id,
            action,
            criticality = ?criticality,
            "audit scope event"
        );
    }
}
