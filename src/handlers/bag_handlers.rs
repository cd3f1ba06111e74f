//! Bag/link HTTP endpoints (spec §4.6, §6).

use actix_web::{delete, get, post, web, HttpMessage, HttpRequest, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::audit::AuditScope;
use crate::domain::bag::BagType;
use crate::domain::user::Role;
use crate::errors::{AppError, AppResult, AuthFailure};
use crate::middleware::auth::{require_role, AuthenticatedUser};
use crate::repository::AuditRepository;
use crate::services::BagService;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/bags")
            .service(create_bag)
            .service(get_bag)
            .service(link_bags)
            .service(unlink_bags)
            .service(delete_bag),
    );
}

#[derive(Deserialize)]
struct CreateBagRequest {
    qr_id: String,
    #[serde(rename = "type")]
    bag_type: BagType,
}

#[post("")]
async fn create_bag(
    bags: web::Data<BagService>,
    req: HttpRequest,
    body: web::Json<CreateBagRequest>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req)?;
    let bag = bags.create_bag(&body.qr_id, body.bag_type, Some(user.user_id)).await?;
    Ok(HttpResponse::Created().json(bag))
}

#[get("/{qr_id}")]
async fn get_bag(bags: web::Data<BagService>, path: web::Path<String>) -> AppResult<HttpResponse> {
    let detail = bags.get_bag(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[derive(Deserialize)]
struct LinkRequest {
    parent_qr: String,
    child_qr: String,
}

#[post("/link")]
async fn link_bags(
    bags: web::Data<BagService>,
    req: HttpRequest,
    body: web::Json<LinkRequest>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req)?;
    bags.link(&body.parent_qr, &body.child_qr, user.user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[delete("/link")]
async fn unlink_bags(bags: web::Data<BagService>, body: web::Json<LinkRequest>) -> AppResult<HttpResponse> {
    bags.unlink(&body.parent_qr, &body.child_qr).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Deserialize)]
struct DeleteBagQuery {
    #[serde(default)]
    cascade: bool,
}

#[delete("/{qr_id}")]
async fn delete_bag(
    bags: web::Data<BagService>,
    audit: web::Data<AuditRepository>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<DeleteBagQuery>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req)?;
    require_role(Some(&user), Role::Biller)?;
    let qr_id = path.into_inner();
    bags.delete_bag(&qr_id, query.cascade).await?;
    let request_id = req.extensions().get::<Uuid>().copied().unwrap_or_else(Uuid::new_v4);
    let ip = req.connection_info().realip_remote_addr().unwrap_or("unknown").to_string();
    AuditScope::with_request_id(request_id, audit.get_ref().clone(), Some(user.user_id), ip)
        .record_best_effort("bag.delete", Some("bag"), Some(qr_id), None::<()>, None::<()>)
        .await;
    Ok(HttpResponse::NoContent().finish())
}

fn current_user(req: &HttpRequest) -> AppResult<AuthenticatedUser> {
    req.extensions()
        .get::<AuthenticatedUser>()
        .cloned()
        .ok_or(AppError::Auth(AuthFailure::NoSession))
}
