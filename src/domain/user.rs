//! User entity (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    Admin,
    Biller,
    Dispatcher,
}

impl Role {
    /// Role matrix (spec §4.9): does this role meet the `minimum`
    /// requirement for a route?
    pub fn at_least(self, minimum: Role) -> bool {
        self.rank() >= minimum.rank()
    }

    fn rank(self) -> u8 {
        match self {
            Role::Dispatcher => 0,
            Role::Biller => 1,
            Role::Admin => 2,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Admin => "admin",
            Role::Biller => "biller",
            Role::Dispatcher => "dispatcher",
        };
        write!(f, "{s}")
    }
}

/// A registered operator. Password hash and TOTP secret never serialize
/// into API responses (spec §3 invariant: "password hash never stored in
/// plaintext" extends to "never transmitted back out" either).
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    #[serde(skip)]
    pub password_hash: String,
    pub failed_login_count: i32,
    pub lockout_until: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub totp_secret: Option<String>,
    pub two_fa_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lockout_until.is_some_and(|until| now < until)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyTotpRequest {
    pub code: String,
}
