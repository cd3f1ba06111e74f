//! Rate-limiting middleware (spec §4.3, C3). Classifies the request by
//! path prefix, looks up the configured quota, and checks it against the
//! per-identity `RateLimiter` before the request reaches the handler.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage, ResponseError,
};
use futures::future::{ok, LocalBoxFuture, Ready};
use std::rc::Rc;

use crate::config::AppConfig;
use crate::middleware::auth::AuthenticatedUser;
use crate::ratelimit::{Quota, RateLimiter, RouteClass};

fn classify(path: &str) -> RouteClass {
    if path.starts_with("/api/auth/login") {
        RouteClass::Login
    } else if path.starts_with("/api/auth/register") {
        RouteClass::Register
    } else if path.starts_with("/api/auth/forgot_password") {
        RouteClass::ForgotPassword
    } else if path.starts_with("/api/auth/2fa/verify") {
        RouteClass::TwoFaVerify
    } else if path.starts_with("/api/") {
        RouteClass::Api
    } else {
        RouteClass::Default
    }
}

fn quota_for(class: RouteClass, config: &AppConfig) -> Quota {
    match class {
        RouteClass::Login => Quota::per_minute(config.rate_limit_login_per_min),
        RouteClass::Register => Quota::per_minute(config.rate_limit_register_per_min),
        RouteClass::ForgotPassword => Quota::per_minute(config.rate_limit_forgot_password_per_min),
        RouteClass::TwoFaVerify => Quota::per_minute(config.rate_limit_2fa_verify_per_min),
        RouteClass::Api => Quota::per_minute(config.rate_limit_api_per_min),
        RouteClass::Default => Quota::per_hour(config.rate_limit_default_per_hour),
    }
}

pub struct RateLimitMiddleware;

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RateLimitMiddlewareService {
            service: Rc::new(service),
        })
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        let class = classify(req.path());
        let identity = req
            .extensions()
            .get::<AuthenticatedUser>()
            .map(|u| u.user_id.to_string())
            .unwrap_or_else(|| {
                req.connection_info()
                    .realip_remote_addr()
                    .unwrap_or("unknown")
                    .to_string()
            });

        let limiter = req.app_data::<web::Data<RateLimiter>>().cloned();
        let config = req.app_data::<web::Data<AppConfig>>().cloned();

        Box::pin(async move {
            if let (Some(limiter), Some(config)) = (limiter, config) {
                let quota = quota_for(class, &config);
                if let Err(e) = limiter.check(&identity, class, quota) {
                    return Ok(req.into_response(e.error_response()).map_into_right_body());
                }
            }
            service.call(req).await.map(|res| res.map_into_left_body())
        })
    }
}
