//! Dashboard statistics endpoint (spec §4.5, §6).

use actix_web::{get, web, HttpResponse};

use crate::errors::AppResult;
use crate::stats::StatsCache;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(get_stats);
}

#[get("/api/stats")]
async fn get_stats(cache: web::Data<StatsCache>) -> AppResult<HttpResponse> {
    let stats = cache.get().await?;
    Ok(HttpResponse::Ok().json(stats))
}
