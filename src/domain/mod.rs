//! Domain entities (spec §3): identity, the bag/link graph, scans, and
//! bill assembly.

pub mod bag;
pub mod bill;
pub mod scan;
pub mod user;

pub use bag::{Bag, BagType, Link};
pub use bill::{Bill, BillBag, BillStatus};
pub use scan::Scan;
pub use user::{Role, User};

/// Generic paginated response wrapper for list endpoints.
#[derive(Debug, serde::Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}
