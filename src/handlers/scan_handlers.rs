//! Scan pipeline HTTP endpoints (spec §4.7, §6).
//!
//! The scanning session buffer is keyed by the caller's login session id
//! (`AuthenticatedUser::session_id`): one scanner workflow per active
//! session, matching spec §4.7's "per-device scanning session".

use actix_web::{post, web, HttpMessage, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::domain::scan::AppendOutcome;
use crate::errors::{AppError, AppResult, AuthFailure};
use crate::middleware::auth::AuthenticatedUser;
use crate::services::ScanService;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/scans")
            .service(scan_parent)
            .service(scan_child)
            .service(finish_scanning),
    );
}

#[derive(Deserialize)]
struct ScanParentRequest {
    qr_id: String,
    response_time_ms: f64,
}

#[derive(Serialize)]
struct ScanParentResponse {
    qr_id: String,
    existing_child_count: i64,
}

#[post("/parent")]
async fn scan_parent(
    scans: web::Data<ScanService>,
    req: HttpRequest,
    body: web::Json<ScanParentRequest>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req)?;
    let result = scans
        .scan_parent(user.session_id, user.user_id, &body.qr_id, body.response_time_ms)
        .await?;
    Ok(HttpResponse::Ok().json(ScanParentResponse {
        qr_id: result.qr_id,
        existing_child_count: result.existing_child_count,
    }))
}

#[derive(Deserialize)]
struct ScanChildRequest {
    qr_id: String,
    response_time_ms: f64,
}

#[derive(Serialize)]
struct ScanChildResponse {
    outcome: &'static str,
    buffered_count: usize,
}

#[post("/child")]
async fn scan_child(
    scans: web::Data<ScanService>,
    req: HttpRequest,
    body: web::Json<ScanChildRequest>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req)?;
    let result = scans
        .scan_child(user.session_id, user.user_id, &body.qr_id, body.response_time_ms)
        .await?;

    let outcome = match result.outcome {
        AppendOutcome::Added => "added",
        AppendOutcome::DuplicateInBuffer => "duplicate_in_buffer",
        AppendOutcome::DuplicateWithinWindow => "duplicate_within_window",
    };
    Ok(HttpResponse::Ok().json(ScanChildResponse {
        outcome,
        buffered_count: result.buffered_count,
    }))
}

#[post("/finish")]
async fn finish_scanning(scans: web::Data<ScanService>, req: HttpRequest) -> AppResult<HttpResponse> {
    let user = current_user(&req)?;
    let summary = scans.finish_scanning(user.session_id, user.user_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "parent_qr_id": summary.parent_qr_id,
        "linked": summary.linked,
        "already_linked": summary.already_linked,
    })))
}

fn current_user(req: &HttpRequest) -> AppResult<AuthenticatedUser> {
    req.extensions()
        .get::<AuthenticatedUser>()
        .cloned()
        .ok_or(AppError::Auth(AuthFailure::NoSession))
}
