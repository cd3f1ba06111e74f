//! Scan entity and the server-side scan session buffer (spec §3, §4.7, C7).

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Scan {
    pub id: Uuid,
    pub scanner_id: Uuid,
    pub parent_bag_id: Option<Uuid>,
    pub child_bag_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    pub response_time_ms: f64,
}

/// The buffer suppression window for duplicate child scans (spec §4.7:
/// "duplicate across scans within 200 ms is treated as a noisy
/// double-scan").
pub const DUPLICATE_SUPPRESSION_WINDOW_MS: u64 = 200;

/// Server-side per-session staging area (§3 `ScanSessionBuffer`). Lives in
/// process memory, keyed by session id in `ScanBufferStore`.
#[derive(Debug)]
pub struct ScanSessionBuffer {
    pub parent_qr_id: String,
    pub parent_bag_id: Uuid,
    /// Children in insertion order, for the `finish_scanning` commit.
    pub children: Vec<BufferedChild>,
    /// Last-seen instant per child qr, for the 200ms suppression window.
    last_seen: HashMap<String, Instant>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BufferedChild {
    pub qr_id: String,
    pub bag_id: Uuid,
}

#[derive(Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    Added,
    DuplicateInBuffer,
    DuplicateWithinWindow,
}

impl ScanSessionBuffer {
    pub fn new(parent_qr_id: String, parent_bag_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            parent_qr_id,
            parent_bag_id,
            children: Vec::new(),
            last_seen: HashMap::new(),
            started_at: now,
        }
    }

    /// Append a child if not already present, honoring both the
    /// in-buffer dedup and the 200ms cross-scan suppression window.
    pub fn try_append(&mut self, qr_id: &str, bag_id: Uuid) -> AppendOutcome {
        let now = Instant::now();
        if self.children.iter().any(|c| c.qr_id == qr_id) {
            if let Some(last) = self.last_seen.get(qr_id) {
                if now.duration_since(*last).as_millis()
                    < DUPLICATE_SUPPRESSION_WINDOW_MS as u128
                {
                    self.last_seen.insert(qr_id.to_string(), now);
                    return AppendOutcome::DuplicateWithinWindow;
                }
            }
            self.last_seen.insert(qr_id.to_string(), now);
            return AppendOutcome::DuplicateInBuffer;
        }

        self.children.push(BufferedChild {
            qr_id: qr_id.to_string(),
            bag_id,
        });
        self.last_seen.insert(qr_id.to_string(), now);
        AppendOutcome::Added
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppresses_duplicate_within_window() {
        let mut buf = ScanSessionBuffer::new("P1".into(), Uuid::new_v4(), Utc::now());
        let child = Uuid::new_v4();
        assert_eq!(buf.try_append("C1", child), AppendOutcome::Added);
        assert_eq!(buf.try_append("C1", child), AppendOutcome::DuplicateWithinWindow);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn distinct_children_all_append() {
        let mut buf = ScanSessionBuffer::new("P1".into(), Uuid::new_v4(), Utc::now());
        for i in 0..10 {
            let outcome = buf.try_append(&format!("C{i}"), Uuid::new_v4());
            assert_eq!(outcome, AppendOutcome::Added);
        }
        assert_eq!(buf.len(), 10);
    }
}
