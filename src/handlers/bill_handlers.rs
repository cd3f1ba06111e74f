//! Bill assembly HTTP endpoints (spec §4.8, §6).

use actix_web::{delete, get, post, web, HttpMessage, HttpRequest, HttpResponse};
use uuid::Uuid;

use crate::audit::AuditScope;
use crate::domain::bill::{AttachParentRequest, CreateBillRequest};
use crate::domain::user::Role;
use crate::errors::{AppError, AppResult, AuthFailure};
use crate::middleware::auth::{require_role, AuthenticatedUser};
use crate::repository::AuditRepository;
use crate::services::BillService;

fn audit_scope(req: &HttpRequest, audit: &web::Data<AuditRepository>, actor_id: Uuid) -> AuditScope {
    let request_id = req
        .extensions()
        .get::<Uuid>()
        .copied()
        .unwrap_or_else(Uuid::new_v4);
    let ip = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();
    AuditScope::with_request_id(request_id, audit.get_ref().clone(), Some(actor_id), ip)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/bills")
            .service(create_bill)
            .service(get_bill)
            .service(attach_parent)
            .service(detach_parent)
            .service(finalize_bill)
            .service(delete_bill),
    );
}

#[post("")]
async fn create_bill(
    bills: web::Data<BillService>,
    req: HttpRequest,
    body: web::Json<CreateBillRequest>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req)?;
    require_role(Some(&user), Role::Biller)?;
    let bill = bills
        .create_bill(&body.bill_id, body.parent_bag_count, user.user_id)
        .await?;
    Ok(HttpResponse::Created().json(bill))
}

#[get("/{bill_id}")]
async fn get_bill(bills: web::Data<BillService>, path: web::Path<String>) -> AppResult<HttpResponse> {
    let bill = bills.get_bill(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(bill))
}

#[post("/{bill_id}/attach")]
async fn attach_parent(
    bills: web::Data<BillService>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<AttachParentRequest>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req)?;
    require_role(Some(&user), Role::Biller)?;
    let bill = bills.attach_parent(&path.into_inner(), &body.parent_qr).await?;
    Ok(HttpResponse::Ok().json(bill))
}

#[delete("/{bill_id}/attach")]
async fn detach_parent(
    bills: web::Data<BillService>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<AttachParentRequest>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req)?;
    require_role(Some(&user), Role::Biller)?;
    let bill = bills.detach_parent(&path.into_inner(), &body.parent_qr).await?;
    Ok(HttpResponse::Ok().json(bill))
}

#[post("/{bill_id}/finalize")]
async fn finalize_bill(
    bills: web::Data<BillService>,
    audit: web::Data<AuditRepository>,
    req: HttpRequest,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req)?;
    require_role(Some(&user), Role::Biller)?;
    let bill_id = path.into_inner();
    let bill = bills.finalize_bill(&bill_id).await?;
    audit_scope(&req, &audit, user.user_id)
        .record_best_effort("bill.finalize", Some("bill"), Some(bill_id), None::<()>, Some(&bill))
        .await;
    Ok(HttpResponse::Ok().json(bill))
}

#[delete("/{bill_id}")]
async fn delete_bill(
    bills: web::Data<BillService>,
    audit: web::Data<AuditRepository>,
    req: HttpRequest,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req)?;
    require_role(Some(&user), Role::Admin)?;
    let bill_id = path.into_inner();
    let deleted = bills.delete_bill(&bill_id).await?;
    audit_scope(&req, &audit, user.user_id)
        .record_best_effort("bill.delete", Some("bill"), Some(bill_id), Some(&deleted), None::<()>)
        .await;
    Ok(HttpResponse::NoContent().finish())
}

fn current_user(req: &HttpRequest) -> AppResult<AuthenticatedUser> {
    req.extensions()
        .get::<AuthenticatedUser>()
        .cloned()
        .ok_or(AppError::Auth(AuthFailure::NoSession))
}
