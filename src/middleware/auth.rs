//! Session-resolution middleware (spec §4.2, §4.9).
//!
//! Resolves the `Authorization: Bearer <token>` header into a
//! `Session`/`User` pair and stores them in request extensions. Does
//! *not* reject unauthenticated requests itself — route handlers that
//! require a session check `req.extensions()` for `AuthenticatedUser`
//! and return `AppError::Auth(AuthFailure::NoSession)` when absent.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use futures::future::{ok, LocalBoxFuture, Ready};
use std::rc::Rc;
use uuid::Uuid;

use crate::auth::AuthService;
use crate::domain::user::Role;

#[derive(Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: Role,
    pub session_id: Uuid,
}

pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddlewareService {
            service: Rc::new(service),
        })
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let token = req
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.strip_prefix("Bearer "))
                .map(str::to_string);

            if let Some(token) = token {
                if let Some(auth) = req.app_data::<web::Data<AuthService>>() {
                    if let Ok((session, user)) = auth.resolve_session(&token).await {
                        req.extensions_mut().insert(AuthenticatedUser {
                            user_id: user.id,
                            role: user.role,
                            session_id: session.id,
                        });
                    }
                }
            }

            service.call(req).await
        })
    }
}

/// Role-gate helper handlers call after pulling `AuthenticatedUser` from
/// request extensions (spec §4.9 role matrix).
pub fn require_role(
    user: Option<&AuthenticatedUser>,
    minimum: Role,
) -> Result<(), crate::errors::AppError> {
    let user = user.ok_or(crate::errors::AppError::Auth(
        crate::errors::AuthFailure::NoSession,
    ))?;
    if !user.role.at_least(minimum) {
        return Err(crate::errors::AppError::Authz(format!(
            "requires at least {minimum} role"
        )));
    }
    Ok(())
}
