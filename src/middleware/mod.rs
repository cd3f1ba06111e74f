//! HTTP middleware, wired onto the `App` in `main.rs` so execution order
//! is: security headers, logging, auth, then rate limiting closest to
//! the handler (rate limiting keys quotas on the identity auth resolves).

pub mod auth;
pub mod logging;
pub mod rate_limit;
pub mod security_headers;

pub use auth::AuthMiddleware;
pub use logging::LoggingMiddleware;
pub use rate_limit::RateLimitMiddleware;
pub use security_headers::SecurityHeadersMiddleware;
