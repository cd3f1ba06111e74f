//! Request logging middleware. Allocates the request id used for
//! audit-log correlation and the `request_id` field in error bodies
//! (spec §6), in addition to structured method/path/duration/status
//! logging.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::{ok, LocalBoxFuture, Ready};
use std::rc::Rc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

pub struct LoggingMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggingMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = LoggingMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(LoggingMiddlewareService {
            service: Rc::new(service),
        })
    }
}

pub struct LoggingMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoggingMiddlewareService<S>
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
        let method = req.method().to_string();
        let path = req.path().to_string();
        let start = Instant::now();

        let request_id = Uuid::new_v4();
        req.extensions_mut().insert(request_id);

        Box::pin(async move {
            let result = service.call(req).await;
            let duration = start.elapsed();

            match &result {
                Ok(res) => {
                    let status = res.status().as_u16();
                    if status >= 400 {
                        warn!(
                            request_id = %request_id,
                            method = %method,
                            path = %path,
                            status = status,
                            duration_ms = duration.as_millis() as u64,
                            "request completed with error"
                        );
                    } else {
                        info!(
                            request_id = %request_id,
                            method = %method,
                            path = %path,
                            status = status,
                            duration_ms = duration.as_millis() as u64,
                            "request completed"
                        );
                    }
                }
                Err(e) => {
                    warn!(
                        request_id = %request_id,
                        method = %method,
                        path = %path,
                        error = %e,
                        duration_ms = duration.as_millis() as u64,
                        "request failed"
                    );
                }
            }

            result
        })
    }
}
