//! Identity and session HTTP endpoints (spec §4.2, §6).

use actix_web::{get, patch, post, web, HttpMessage, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::AuditScope;
use crate::auth::AuthService;
use crate::domain::user::{CreateUserRequest, LoginRequest, Role, VerifyTotpRequest};
use crate::errors::{AppError, AppResult, AuthFailure};
use crate::middleware::auth::{require_role, AuthenticatedUser};
use crate::repository::AuditRepository;

/// Security-critical actions are audited immediately after the service
/// call succeeds and before the response is sent (spec §4.4). The write
/// is not nested in the same database transaction as the mutation itself
/// — `AuthService` commits its own transactions internally — so this is
/// "synchronous with the request" rather than byte-for-byte atomic with
/// the state change; see DESIGN.md.
fn audit_scope(req: &HttpRequest, audit: &web::Data<AuditRepository>, actor_id: Option<Uuid>) -> AuditScope {
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
    AuditScope::with_request_id(request_id, audit.get_ref().clone(), actor_id, ip)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/auth")
            .service(register)
            .service(login)
            .service(verify_totp)
            .service(logout)
            .service(me)
            .service(enable_2fa)
            .service(disable_2fa)
            .service(change_role),
    );
}

fn current_user(req: &HttpRequest) -> Option<AuthenticatedUser> {
    req.extensions().get::<AuthenticatedUser>().cloned()
}

#[post("/register")]
async fn register(
    auth: web::Data<AuthService>,
    audit: web::Data<AuditRepository>,
    req: HttpRequest,
    body: web::Json<CreateUserRequest>,
) -> AppResult<HttpResponse> {
    if body.username.trim().is_empty() {
        return Err(AppError::Validation("username is required".to_string()));
    }
    if body.password.len() < 8 {
        return Err(AppError::Validation(
            "password must be at least 8 characters".to_string(),
        ));
    }
    let user = auth.register(&body).await?;
    audit_scope(&req, &audit, Some(user.id))
        .record_best_effort("user.register", Some("user"), Some(user.id.to_string()), None::<()>, Some(&user))
        .await;
    Ok(HttpResponse::Created().json(user))
}

#[derive(Serialize)]
struct LoginResponse {
    token: Option<String>,
    needs_2fa: bool,
    user_id: Uuid,
}

#[post("/login")]
async fn login(
    auth: web::Data<AuthService>,
    audit: web::Data<AuditRepository>,
    req: HttpRequest,
    body: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    match auth.login(&body.username, &body.password).await? {
        crate::auth::LoginOutcome::SessionIssued { token, user } => {
            audit_scope(&req, &audit, Some(user.id))
                .record_best_effort("auth.login", Some("user"), Some(user.id.to_string()), None::<()>, None::<()>)
                .await;
            Ok(HttpResponse::Ok().json(LoginResponse {
                token: Some(token),
                needs_2fa: false,
                user_id: user.id,
            }))
        }
        crate::auth::LoginOutcome::NeedsSecondFactor { user_id } => Ok(HttpResponse::Ok().json(LoginResponse {
            token: None,
            needs_2fa: true,
            user_id,
        })),
    }
}

#[derive(Deserialize)]
struct VerifyTotpPath {
    user_id: Uuid,
}

#[post("/2fa/verify/{user_id}")]
async fn verify_totp(
    auth: web::Data<AuthService>,
    audit: web::Data<AuditRepository>,
    req: HttpRequest,
    path: web::Path<VerifyTotpPath>,
    body: web::Json<VerifyTotpRequest>,
) -> AppResult<HttpResponse> {
    let (token, user) = auth.verify_totp(path.user_id, &body.code).await?;
    audit_scope(&req, &audit, Some(user.id))
        .record_best_effort("auth.2fa_verify", Some("user"), Some(user.id.to_string()), None::<()>, None::<()>)
        .await;
    Ok(HttpResponse::Ok().json(LoginResponse {
        token: Some(token),
        needs_2fa: false,
        user_id: user.id,
    }))
}

#[post("/logout")]
async fn logout(auth: web::Data<AuthService>, audit: web::Data<AuditRepository>, req: HttpRequest) -> AppResult<HttpResponse> {
    let token = bearer_token(&req)?;
    let actor_id = current_user(&req).map(|u| u.user_id);
    auth.logout(&token).await?;
    audit_scope(&req, &audit, actor_id)
        .record_best_effort("auth.logout", actor_id.map(|_| "user"), actor_id.map(|id| id.to_string()), None::<()>, None::<()>)
        .await;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/me")]
async fn me(req: HttpRequest) -> AppResult<HttpResponse> {
    let user = current_user(&req).ok_or(AppError::Auth(AuthFailure::NoSession))?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "user_id": user.user_id,
        "role": user.role,
    })))
}

#[derive(Deserialize)]
struct PasswordConfirm {
    password: String,
}

#[post("/2fa/enable")]
async fn enable_2fa(
    auth: web::Data<AuthService>,
    audit: web::Data<AuditRepository>,
    req: HttpRequest,
    body: web::Json<PasswordConfirm>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req).ok_or(AppError::Auth(AuthFailure::NoSession))?;
    require_role(Some(&user), Role::Admin)?;
    let secret = auth.enable_2fa(user.user_id, &body.password).await?;
    audit_scope(&req, &audit, Some(user.user_id))
        .record_best_effort("auth.2fa_enable", Some("user"), Some(user.user_id.to_string()), None::<()>, None::<()>)
        .await;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "totp_secret": secret })))
}

#[post("/2fa/disable")]
async fn disable_2fa(
    auth: web::Data<AuthService>,
    audit: web::Data<AuditRepository>,
    req: HttpRequest,
    body: web::Json<PasswordConfirm>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req).ok_or(AppError::Auth(AuthFailure::NoSession))?;
    require_role(Some(&user), Role::Admin)?;
    auth.disable_2fa(user.user_id, &body.password).await?;
    audit_scope(&req, &audit, Some(user.user_id))
        .record_best_effort("auth.2fa_disable", Some("user"), Some(user.user_id.to_string()), None::<()>, None::<()>)
        .await;
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Deserialize)]
struct ChangeRoleRequest {
    role: Role,
}

#[patch("/users/{id}/role")]
async fn change_role(
    auth: web::Data<AuthService>,
    audit: web::Data<AuditRepository>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<ChangeRoleRequest>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req);
    require_role(user.as_ref(), Role::Admin)?;
    let target_id = path.into_inner();
    auth.change_role(target_id, body.role).await?;
    audit_scope(&req, &audit, user.map(|u| u.user_id))
        .record_best_effort(
            "auth.change_role",
            Some("user"),
            Some(target_id.to_string()),
            None::<()>,
            Some(&body.role),
        )
        .await;
    Ok(HttpResponse::NoContent().finish())
}

fn bearer_token(req: &HttpRequest) -> AppResult<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
        .ok_or(AppError::Auth(AuthFailure::NoSession))
}
