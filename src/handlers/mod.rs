//! HTTP handlers (spec §6 external interfaces), one module per resource
//! family, each exposing a `configure(cfg: &mut web::ServiceConfig)`.

pub mod auth_handlers;
pub mod bag_handlers;
pub mod bill_handlers;
pub mod health_handlers;
pub mod scan_handlers;
pub mod stats_handlers;
