//! Fixed-window rate limiter (C3, spec §4.3).
//!
//! Counters live in process memory, sharded over a `dashmap::DashMap`.
//! Correctness does not depend on cross-node sharing (spec: "per-node
//! over-limits are acceptable").

use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Login,
    Register,
    ForgotPassword,
    TwoFaVerify,
    Api,
    Default,
}

#[derive(Debug, Clone, Copy)]
pub struct Quota {
    pub max_requests: u32,
    pub window: Duration,
}

impl Quota {
    pub const fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(60),
        }
    }

    pub const fn per_hour(max_requests: u32) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(3600),
        }
    }
}

struct Window {
    started_at: Instant,
    count: u32,
}

/// Keyed fixed-window limiter; one instance is shared across the process
/// via `web::Data`.
pub struct RateLimiter {
    windows: DashMap<(String, RouteClass), Window>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    /// Returns `Ok(())` if the request is admitted, or
    /// `Err(RateLimited)` with a retry-after hint otherwise.
    pub fn check(&self, identity: &str, class: RouteClass, quota: Quota) -> Result<(), AppError> {
        let key = (identity.to_string(), class);
        let now = Instant::now();

        let mut entry = self
            .windows
            .entry(key)
            .or_insert_with(|| Window {
                started_at: now,
                count: 0,
            });

        if now.duration_since(entry.started_at) >= quota.window {
            entry.started_at = now;
            entry.count = 0;
        }

        if entry.count >= quota.max_requests {
            let retry_after = quota
                .window
                .saturating_sub(now.duration_since(entry.started_at));
            return Err(AppError::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }

        entry.count += 1;
        Ok(())
    }

    /// Drop windows that rolled over a while ago, bounding memory growth
    /// under a large population of distinct identities.
    pub fn sweep(&self, max_age: Duration) {
        let now = Instant::now();
        self.windows
            .retain(|_, w| now.duration_since(w.started_at) < max_age);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_quota_then_rejects() {
        let limiter = RateLimiter::new();
        let quota = Quota::per_minute(3);
        for _ in 0..3 {
            assert!(limiter.check("alice", RouteClass::Login, quota).is_ok());
        }
        assert!(limiter.check("alice", RouteClass::Login, quota).is_err());
    }

    #[test]
    fn distinct_identities_are_independent() {
        let limiter = RateLimiter::new();
        let quota = Quota::per_minute(1);
        assert!(limiter.check("alice", RouteClass::Login, quota).is_ok());
        assert!(limiter.check("bob", RouteClass::Login, quota).is_ok());
    }

    #[test]
    fn distinct_route_classes_are_independent() {
        let limiter = RateLimiter::new();
        let quota = Quota::per_minute(1);
        assert!(limiter.check("alice", RouteClass::Login, quota).is_ok());
        assert!(limiter.check("alice", RouteClass::Register, quota).is_ok());
    }
}
