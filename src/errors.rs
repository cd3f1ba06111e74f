//! Error handling module
//!
//! Domain-level error kinds (spec §7), mapped to HTTP status codes at the
//! edge. Repository errors translate into application errors via `From`,
//! the same shape as a two-layer `RepositoryError -> AppError` conversion.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use uuid::Uuid;

/// Application-level errors, mapped to HTTP responses by `ResponseError`.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("authentication failed")]
    Auth(AuthFailure),

    #[error("authorization denied: {0}")]
    Authz(String),

    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("transient error: {0}")]
    Transient(String),

    #[error("internal error")]
    Internal,
}

/// Sub-kinds of authentication failure, so handlers can distinguish
/// "need 2FA" from "bad credentials" from "locked out" without a second
/// enum living at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    InvalidCredentials,
    NeedsSecondFactor,
    InvalidTotp,
    Locked,
    SessionExpired,
    NoSession,
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuthFailure::InvalidCredentials => "invalid credentials",
            AuthFailure::NeedsSecondFactor => "need_2fa",
            AuthFailure::InvalidTotp => "invalid totp code",
            AuthFailure::Locked => "account locked",
            AuthFailure::SessionExpired => "session expired",
            AuthFailure::NoSession => "no session",
        };
        write!(f, "{s}")
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    request_id: Option<Uuid>,
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Auth(AuthFailure::NeedsSecondFactor) => "NEEDS_2FA",
            AppError::Auth(AuthFailure::Locked) => "LOCKED",
            AppError::Auth(_) => "AUTH_ERROR",
            AppError::Authz(_) => "FORBIDDEN",
            AppError::NotFound(..) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::RateLimited { .. } => "RATE_LIMITED",
            AppError::Transient(_) => "TRANSIENT_ERROR",
            AppError::Internal => "INTERNAL_ERROR",
        }
    }

    /// Attach a request id for the JSON error body; handlers call this
    /// right before returning so the correlation id always makes it to
    /// the client, matching spec §6 ("Bodies carry `{code, message,
    /// request_id}`").
    pub fn with_request_id(self, request_id: Uuid) -> AppErrorWithContext {
        AppErrorWithContext {
            error: self,
            request_id: Some(request_id),
        }
    }
}

/// An `AppError` plus the request id to surface in the response body.
/// Handlers that already hold an `AuditScope`/request id return this
/// instead of the bare error so the id always reaches the client.
#[derive(Debug)]
pub struct AppErrorWithContext {
    pub error: AppError,
    pub request_id: Option<Uuid>,
}

impl std::fmt::Display for AppErrorWithContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.error.fmt(f)
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(AuthFailure::Locked) => StatusCode::UNAUTHORIZED,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Authz(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        if let AppError::RateLimited { retry_after_secs } = self {
            builder.insert_header(("Retry-After", retry_after_secs.to_string()));
        }
        // The user-visible message never leaks internal details (spec §7);
        // Internal/Transient are rendered with a generic message.
        let message = match self {
            AppError::Internal => "internal server error".to_string(),
            AppError::Transient(_) => "service temporarily unavailable".to_string(),
            other => other.to_string(),
        };
        builder.json(ErrorBody {
            code: self.code(),
            message,
            request_id: None,
        })
    }
}

impl ResponseError for AppErrorWithContext {
    fn status_code(&self) -> StatusCode {
        self.error.status_code()
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        if let AppError::RateLimited { retry_after_secs } = &self.error {
            builder.insert_header(("Retry-After", retry_after_secs.to_string()));
        }
        let message = match &self.error {
            AppError::Internal => "internal server error".to_string(),
            AppError::Transient(_) => "service temporarily unavailable".to_string(),
            other => other.to_string(),
        };
        builder.json(ErrorBody {
            code: self.error.code(),
            message,
            request_id: self.request_id,
        })
    }
}

/// Repository-level errors, translated into `AppError` at the service
/// boundary. Kept distinct from `AppError` so the persistence layer
/// never has to know about HTTP status codes.
#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("record not found")]
    NotFound,

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("query error: {0}")]
    Query(#[from] sqlx::Error),
}

impl RepoError {
    /// Classify a raw `sqlx::Error` the way §4.1 demands: constraint
    /// violations become `Conflict`, everything else is a `Query` error
    /// that the retry helper in `db` may or may not retry.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return RepoError::DuplicateKey(db_err.message().to_string());
            }
            if db_err.is_foreign_key_violation() || db_err.is_check_violation() {
                return RepoError::Conflict(db_err.message().to_string());
            }
        }
        RepoError::Query(err)
    }

    /// Whether the persistence layer should retry this class of failure
    /// (spec §4.1/§7: only `TransientError` is retried).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RepoError::Query(sqlx::Error::Io(_))
                | RepoError::Query(sqlx::Error::PoolTimedOut)
                | RepoError::Query(sqlx::Error::PoolClosed)
        )
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => AppError::NotFound("resource", String::new()),
            RepoError::DuplicateKey(msg) => AppError::Conflict(msg),
            RepoError::Conflict(msg) => AppError::Conflict(msg),
            RepoError::Query(e) if matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ) => AppError::Transient(e.to_string()),
            RepoError::Query(e) => {
                tracing::error!(error = %e, "unhandled database error");
                AppError::Internal
            }
        }
    }
}

/// Result type alias for application errors.
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for repository errors.
pub type RepoResult<T> = Result<T, RepoError>;
