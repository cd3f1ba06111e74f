//! Persistence layer (C1).
//!
//! Wraps a `sqlx::PgPool` sized for ≥100 concurrent workers, with pre-ping,
//! connection recycling, and a retry helper for transient failures.

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, Transaction};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::errors::RepoError;

/// Shared pool handle, threaded through `web::Data` into every handler.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
    degraded: Arc<AtomicBool>,
}

impl Db {
    pub async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        let connect_options = PgConnectOptions::from_str(&config.database_url)?
            .options([
                ("statement_timeout", "60000"),
                ("idle_in_transaction_session_timeout", "30000"),
            ]);

        let pool = PgPoolOptions::new()
            .min_connections(config.pool_size)
            .max_connections(config.pool_size + config.pool_overflow)
            .test_before_acquire(true)
            .max_lifetime(Duration::from_secs(300))
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(connect_options)
            .await?;

        Ok(Self {
            pool,
            degraded: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Wrap an already-established pool (used by `#[sqlx::test]` harnesses,
    /// which provision and migrate the pool themselves).
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            degraded: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    pub fn mark_degraded(&self, degraded: bool) {
        self.degraded.store(degraded, Ordering::Relaxed);
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, RepoError> {
        self.pool.begin().await.map_err(RepoError::from_sqlx)
    }

    /// Pool statistics surfaced by `/api/system_health` (C13).
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle() as u32,
            degraded: self.is_degraded(),
        }
    }
}

pub struct PoolStats {
    pub size: u32,
    pub idle: u32,
    pub degraded: bool,
}

/// Retry helper for transient failures (spec §4.1, §7): exponential
/// backoff 100ms -> 800ms, at most 3 attempts. Constraint violations and
/// other non-transient errors are returned immediately.
pub async fn with_retry<T, F, Fut>(mut op: F) -> Result<T, RepoError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, RepoError>>,
{
    let mut delay = Duration::from_millis(100);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < 2 => {
                tracing::warn!(attempt, error = %e, "retrying transient database error");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(Duration::from_millis(800));
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
