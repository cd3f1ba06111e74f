//! Bill and BillBag entities (spec §3, §4.8, C8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "bill_status", rename_all = "lowercase")]
pub enum BillStatus {
    Empty,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize)]
pub struct Bill {
    pub id: Uuid,
    pub bill_id: String,
    pub parent_bag_count: i32,
    pub total_weight_kg: f64,
    pub expected_weight_kg: f64,
    pub status: BillStatus,
    pub created_at: DateTime<Utc>,
    pub creator_id: Uuid,
}

/// Weight rule (spec §3, §4.8, GLOSSARY): each parent contributes
/// `min(children_of(parent), cap)` kg; a bill's expected weight is
/// `required_count * cap`.
pub fn parent_contribution(child_count: i64, cap_kg: f64) -> f64 {
    (child_count as f64).min(cap_kg)
}

pub fn expected_weight(required_count: i32, cap_kg: f64) -> f64 {
    required_count as f64 * cap_kg
}

#[derive(Debug, Clone, Serialize)]
pub struct BillBag {
    pub bill_id: Uuid,
    pub bag_id: Uuid,
    pub attached_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBillRequest {
    pub bill_id: String,
    pub parent_bag_count: i32,
}

#[derive(Debug, Deserialize)]
pub struct AttachParentRequest {
    pub parent_qr: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn weight_formula_matches_spec_scenario_s3() {
        // S3: P1 has 10 children, P2 has 30, P3 has 42; cap is 30kg.
        let total: f64 = [10i64, 30, 42]
            .iter()
            .map(|&c| parent_contribution(c, 30.0))
            .sum();
        assert_eq!(total, 70.0);
        assert_eq!(expected_weight(3, 30.0), 90.0);
    }

    proptest! {
        #[test]
        fn contribution_never_exceeds_cap(children in 0i64..10_000, cap in 1.0f64..1000.0) {
            let contribution = parent_contribution(children, cap);
            prop_assert!(contribution <= cap);
            prop_assert!(contribution >= 0.0);
        }

        #[test]
        fn expected_weight_is_linear(required in 0i32..10_000, cap in 0.0f64..1000.0) {
            prop_assert_eq!(expected_weight(required, cap), required as f64 * cap);
        }
    }
}
