//! Statistics cache repository — spec §3 StatisticsCache, §4.5 (C5).
//!
//! Application code only ever *reads* the row; counters are maintained by
//! database triggers (see `migrations/0001_init.sql`) and periodically
//! corrected by `reconcile`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;

use crate::db::Db;
use crate::errors::{RepoError, RepoResult};

#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub total_bags: i64,
    pub parent_bags: i64,
    pub child_bags: i64,
    pub total_links: i64,
    pub total_scans: i64,
    pub scans_today: i64,
    pub scans_this_hour: i64,
    pub active_users_today: i64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Clone)]
pub struct StatsRepository {
    db: Db,
}

impl StatsRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// O(1) single-row read (spec §4.5).
    pub async fn fetch(&self) -> RepoResult<Statistics> {
        let row = sqlx::query(
            r#"SELECT total_bags, parent_bags, child_bags, total_links, total_scans,
                      scans_today, scans_this_hour, active_users_today, last_updated
               FROM statistics_cache WHERE id = 1"#,
        )
        .fetch_one(self.db.pool())
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(Statistics {
            total_bags: row.get("total_bags"),
            parent_bags: row.get("parent_bags"),
            child_bags: row.get("child_bags"),
            total_links: row.get("total_links"),
            total_scans: row.get("total_scans"),
            scans_today: row.get("scans_today"),
            scans_this_hour: row.get("scans_this_hour"),
            active_users_today: row.get("active_users_today"),
            last_updated: row.get("last_updated"),
        })
    }

    /// Recompute all counters from authoritative tables and replace the
    /// row in one transaction (spec §4.5: "a scheduled reconciliation
    /// task recomputes the row periodically").
    pub async fn reconcile(&self) -> RepoResult<Statistics> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query(
            r#"UPDATE statistics_cache SET
                 total_bags = (SELECT COUNT(*) FROM bags WHERE deleted_at IS NULL),
                 parent_bags = (SELECT COUNT(*) FROM bags WHERE deleted_at IS NULL AND bag_type = 'parent'),
                 child_bags = (SELECT COUNT(*) FROM bags WHERE deleted_at IS NULL AND bag_type = 'child'),
                 total_links = (SELECT COUNT(*) FROM links),
                 total_scans = (SELECT COUNT(*) FROM scans),
                 scans_today = (SELECT COUNT(*) FROM scans WHERE timestamp::date = CURRENT_DATE),
                 scans_this_hour = (SELECT COUNT(*) FROM scans WHERE timestamp >= NOW() - INTERVAL '1 hour'),
                 active_users_today = (SELECT COUNT(DISTINCT scanner_id) FROM scans WHERE timestamp::date = CURRENT_DATE),
                 last_updated = NOW()
               WHERE id = 1
               RETURNING total_bags, parent_bags, child_bags, total_links, total_scans,
                         scans_today, scans_this_hour, active_users_today, last_updated"#,
        )
        .fetch_one(&mut *tx)
        .await
        .map_err(RepoError::from_sqlx)?;

        tx.commit().await.map_err(RepoError::from_sqlx)?;

        Ok(Statistics {
            total_bags: row.get("total_bags"),
            parent_bags: row.get("parent_bags"),
            child_bags: row.get("child_bags"),
            total_links: row.get("total_links"),
            total_scans: row.get("total_scans"),
            scans_today: row.get("scans_today"),
            scans_this_hour: row.get("scans_this_hour"),
            active_users_today: row.get("active_users_today"),
            last_updated: row.get("last_updated"),
        })
    }
}
