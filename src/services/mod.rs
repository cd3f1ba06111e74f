//! Orchestration layer (C6-C8): business-logic services sitting between
//! the repositories and the HTTP handlers.

pub mod bag_service;
pub mod bill_service;
pub mod scan_service;

pub use bag_service::BagService;
pub use bill_service::BillService;
pub use scan_service::ScanService;
