//! Bag and Link entities (spec §3, C6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "bag_type", rename_all = "lowercase")]
pub enum BagType {
    Parent,
    Child,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bag {
    pub id: Uuid,
    pub qr_id: String,
    #[serde(rename = "type")]
    pub bag_type: BagType,
    pub owner_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Bag {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Link {
    pub parent_id: Uuid,
    pub child_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub creator_id: Uuid,
}

/// QR ids are trimmed, byte-exact, case-sensitive, capped at 64 bytes
/// (spec §4.6). Returns the normalized id or a validation message.
pub fn normalize_qr_id(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("qr_id must not be empty".to_string());
    }
    if trimmed.len() > 64 {
        return Err("qr_id must be at most 64 characters".to_string());
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Serialize)]
pub struct BagDetail {
    pub bag: Bag,
    pub parent: Option<Bag>,
    pub children: Vec<Bag>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_whitespace_case_sensitive() {
        assert_eq!(normalize_qr_id("  P1  ").unwrap(), "P1");
        assert_ne!(normalize_qr_id("p1").unwrap(), normalize_qr_id("P1").unwrap());
    }

    #[test]
    fn rejects_empty_and_oversized() {
        assert!(normalize_qr_id("   ").is_err());
        let long = "x".repeat(65);
        assert!(normalize_qr_id(&long).is_err());
        let max = "x".repeat(64);
        assert!(normalize_qr_id(&max).is_ok());
    }
}
