//! Authentication orchestration (spec §4.2, C2).
//!
//! `AuthService` drives the login state machine
//! `IDLE -> AUTH_OK -> (NEEDS_2FA -> TOTP_OK) -> SESSION_ACTIVE`, with a
//! `LOCKED` absorbing state entered after `lockout_threshold` consecutive
//! failures inside `lockout_window`.

pub mod password;
pub mod token;
pub mod totp;

use chrono::{Duration as ChronoDuration, Utc};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::domain::user::{CreateUserRequest, Role, User};
use crate::errors::{AppError, AppResult, AuthFailure};
use crate::repository::session_repository::{Session, SessionRepository};
use crate::repository::user_repository::UserRepository;

/// Outcome of a first-factor login attempt.
pub enum LoginOutcome {
    /// No 2FA enrolled: session issued immediately.
    SessionIssued { token: String, user: User },
    /// 2FA enrolled: password checked out, caller must now call
    /// `verify_totp` with the pending user id.
    NeedsSecondFactor { user_id: Uuid },
}

#[derive(Clone)]
pub struct AuthService {
    users: UserRepository,
    sessions: SessionRepository,
    lockout_threshold: i32,
    lockout_window: ChronoDuration,
    idle_window: ChronoDuration,
    absolute_window: ChronoDuration,
}

impl AuthService {
    pub fn new(users: UserRepository, sessions: SessionRepository, config: &AppConfig) -> Self {
        Self {
            users,
            sessions,
            lockout_threshold: config.lockout_threshold as i32,
            lockout_window: ChronoDuration::seconds(config.lockout_window_secs as i64),
            idle_window: ChronoDuration::seconds(config.idle_session_secs as i64),
            absolute_window: ChronoDuration::seconds(config.absolute_session_secs as i64),
        }
    }

    pub async fn register(&self, req: &CreateUserRequest) -> AppResult<User> {
        let hash = password::hash_password(&req.password)?;
        let user = self.users.create(req, &hash).await?;
        Ok(user)
    }

    /// First factor: username + password. Increments/resets the failure
    /// counter per spec §4.2's lockout state machine.
    pub async fn login(&self, username: &str, password: &str) -> AppResult<LoginOutcome> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(AppError::Auth(AuthFailure::InvalidCredentials))?;

        let now = Utc::now();
        if user.is_locked(now) {
            return Err(AppError::Auth(AuthFailure::Locked));
        }

        if !password::verify_password(password, &user.password_hash) {
            let lockout_until = now + self.lockout_window;
            self.users
                .record_failed_login(user.id, self.lockout_threshold, lockout_until)
                .await?;
            return Err(AppError::Auth(AuthFailure::InvalidCredentials));
        }

        self.users.reset_failed_login(user.id).await?;

        if user.two_fa_enabled {
            return Ok(LoginOutcome::NeedsSecondFactor { user_id: user.id });
        }

        let (token, session) = self.issue_session(&user, "", "").await?;
        let _ = session;
        Ok(LoginOutcome::SessionIssued { token, user })
    }

    /// Second factor: TOTP code for a user already past `AUTH_OK`.
    pub async fn verify_totp(&self, user_id: Uuid, code: &str) -> AppResult<(String, User)> {
        let user = self.users.find_by_id(user_id).await?;
        let secret = user
            .totp_secret
            .as_deref()
            .ok_or(AppError::Auth(AuthFailure::InvalidTotp))?;

        if !totp::verify_code(secret, &user.username, code)? {
            return Err(AppError::Auth(AuthFailure::InvalidTotp));
        }

        let (token, _session) = self.issue_session(&user, "", "").await?;
        Ok((token, user))
    }

    async fn issue_session(
        &self,
        user: &User,
        ip_address: &str,
        user_agent: &str,
    ) -> AppResult<(String, Session)> {
        let token = token::generate_token();
        let token_hash = token::hash_token(&token);
        let absolute_expiry = Utc::now() + self.absolute_window;
        let session = self
            .sessions
            .create(user.id, &token_hash, absolute_expiry, ip_address, user_agent)
            .await?;
        Ok((token, session))
    }

    /// Resolve a bearer token into its session + user, sliding the idle
    /// timer on success (spec §4.2: "slides on activity").
    pub async fn resolve_session(&self, token: &str) -> AppResult<(Session, User)> {
        let token_hash = token::hash_token(token);
        let session = self
            .sessions
            .find_by_token_hash(&token_hash)
            .await?
            .ok_or(AppError::Auth(AuthFailure::NoSession))?;

        let now = Utc::now();
        if !session.is_valid(now, self.idle_window) {
            self.sessions.invalidate_by_token_hash(&token_hash).await?;
            return Err(AppError::Auth(AuthFailure::SessionExpired));
        }

        self.sessions.touch(session.id).await?;
        let user = self.users.find_by_id(session.user_id).await?;
        Ok((session, user))
    }

    pub async fn logout(&self, token: &str) -> AppResult<()> {
        let token_hash = token::hash_token(token);
        self.sessions.invalidate_by_token_hash(&token_hash).await?;
        Ok(())
    }

    /// Enable 2FA. Requires the current password to be re-verified
    /// (spec §4.2) and invalidates all other sessions afterward.
    pub async fn enable_2fa(&self, user_id: Uuid, current_password: &str) -> AppResult<String> {
        let user = self.users.find_by_id(user_id).await?;
        if !password::verify_password(current_password, &user.password_hash) {
            return Err(AppError::Auth(AuthFailure::InvalidCredentials));
        }
        let secret = totp::generate_secret();
        self.users.enable_2fa(user_id, &secret).await?;
        self.sessions.invalidate_all_for_user(user_id).await?;
        Ok(secret)
    }

    pub async fn disable_2fa(&self, user_id: Uuid, current_password: &str) -> AppResult<()> {
        let user = self.users.find_by_id(user_id).await?;
        if !password::verify_password(current_password, &user.password_hash) {
            return Err(AppError::Auth(AuthFailure::InvalidCredentials));
        }
        self.users.disable_2fa(user_id).await?;
        self.sessions.invalidate_all_for_user(user_id).await?;
        Ok(())
    }

    pub async fn change_role(&self, user_id: Uuid, role: Role) -> AppResult<()> {
        self.users.update_role(user_id, role).await?;
        self.sessions.invalidate_all_for_user(user_id).await?;
        Ok(())
    }
}
