//! System introspection endpoints (C13): liveness and a deeper
//! dependency check for operators and load balancers.

use actix_web::{get, web, HttpMessage, HttpRequest, HttpResponse};
use serde::Serialize;

use crate::db::Db;
use crate::domain::user::Role;
use crate::errors::{AppError, AppResult, AuthFailure};
use crate::middleware::auth::{require_role, AuthenticatedUser};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(liveness).service(system_health);
}

#[get("/health")]
async fn liveness() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[derive(Serialize)]
struct SystemHealth {
    status: &'static str,
    db_pool_size: u32,
    db_pool_idle: u32,
    db_degraded: bool,
}

/// Pool-level health, used by dashboards watching for the degraded flag
/// set in `db::Db::mark_degraded` (spec §4.1: exhaustion signals
/// degraded mode rather than crashing the process). Admin-only (spec §6):
/// exposes internal pool sizing that anonymous callers shouldn't see.
#[get("/api/system_health")]
async fn system_health(db: web::Data<Db>, req: HttpRequest) -> AppResult<HttpResponse> {
    let user = req
        .extensions()
        .get::<AuthenticatedUser>()
        .cloned()
        .ok_or(AppError::Auth(AuthFailure::NoSession))?;
    require_role(Some(&user), Role::Admin)?;

    let stats = db.stats();
    let status = if stats.degraded { "degraded" } else { "ok" };
    Ok(HttpResponse::Ok().json(SystemHealth {
        status,
        db_pool_size: stats.size,
        db_pool_idle: stats.idle,
        db_degraded: stats.degraded,
    }))
}
