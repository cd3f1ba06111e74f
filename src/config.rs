//! Typed configuration loaded from the environment (spec §6).
//!
//! No silent defaults for required secrets: `DATABASE_URL` and
//! `SESSION_SECRET` must be set or startup fails with a clear error.

use anyhow::{bail, Context, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub session_secret: String,
    pub bind_addr: String,
    pub idle_session_secs: u64,
    pub absolute_session_secs: u64,
    pub lockout_threshold: u32,
    pub lockout_window_secs: u64,
    pub pool_size: u32,
    pub pool_overflow: u32,
    pub rate_limit_default_per_hour: u32,
    pub rate_limit_login_per_min: u32,
    pub rate_limit_register_per_min: u32,
    pub rate_limit_forgot_password_per_min: u32,
    pub rate_limit_2fa_verify_per_min: u32,
    pub rate_limit_api_per_min: u32,
    pub admin_password: Option<String>,
    pub enable_2fa: bool,
    pub parent_weight_kg: f64,
    pub deployment_https: bool,
    pub request_timeout_secs: u64,
    pub log_level: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = require_env("DATABASE_URL")?;
        let session_secret = require_env("SESSION_SECRET")?;
        if session_secret.len() < 32 {
            bail!("SESSION_SECRET must be at least 32 bytes");
        }

        Ok(Self {
            database_url,
            session_secret,
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
            idle_session_secs: env_parse("IDLE_SESSION_SECS", 1800)?,
            absolute_session_secs: env_parse("ABSOLUTE_SESSION_SECS", 3600)?,
            lockout_threshold: env_parse("LOCKOUT_THRESHOLD", 5)?,
            lockout_window_secs: env_parse("LOCKOUT_WINDOW_SECS", 900)?,
            pool_size: env_parse("POOL_SIZE", 50)?,
            pool_overflow: env_parse("POOL_OVERFLOW", 100)?,
            rate_limit_default_per_hour: env_parse("RATE_LIMIT_DEFAULT", 500)?,
            rate_limit_login_per_min: env_parse("RATE_LIMIT_LOGIN", 10)?,
            rate_limit_register_per_min: env_parse("RATE_LIMIT_REGISTER", 5)?,
            rate_limit_forgot_password_per_min: env_parse("RATE_LIMIT_FORGOT_PASSWORD", 3)?,
            rate_limit_2fa_verify_per_min: env_parse("RATE_LIMIT_2FA_VERIFY", 5)?,
            rate_limit_api_per_min: env_parse("RATE_LIMIT_API", 10_000)?,
            admin_password: std::env::var("ADMIN_PASSWORD").ok(),
            enable_2fa: env_parse_bool("ENABLE_2FA", true)?,
            parent_weight_kg: env_parse("PARENT_WEIGHT_KG", 30.0)?,
            deployment_https: env_parse_bool("DEPLOYMENT_HTTPS", false)?,
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 30)?,
            log_level: env_or("RUST_LOG", "info"),
        })
    }

    pub fn idle_window(&self) -> Duration {
        Duration::from_secs(self.idle_session_secs)
    }

    pub fn absolute_window(&self) -> Duration {
        Duration::from_secs(self.absolute_session_secs)
    }

    pub fn lockout_window(&self) -> Duration {
        Duration::from_secs(self.lockout_window_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} must be set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}

fn env_parse_bool(key: &str, default: bool) -> Result<bool> {
    match std::env::var(key) {
        Ok(v) => match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => bail!("invalid boolean for {key}: {other}"),
        },
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_session_secret() {
        std::env::set_var("DATABASE_URL", "postgres://x");
        std::env::set_var("SESSION_SECRET", "short");
        let err = AppConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("SESSION_SECRET"));
        std::env::remove_var("DATABASE_URL");
        std::env::remove_var("SESSION_SECRET");
    }
}
