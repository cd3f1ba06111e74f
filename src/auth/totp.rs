//! TOTP 2FA (spec §4.2: RFC 6238, 30s step, window ±1).

use totp_rs::{Algorithm, Secret, TOTP};

use crate::errors::AppError;

/// Generate a fresh base32 TOTP secret for enrollment.
pub fn generate_secret() -> String {
    Secret::generate_secret().to_encoded().to_string()
}

fn totp_for(secret_base32: &str, account: &str) -> Result<TOTP, AppError> {
    let secret = Secret::Encoded(secret_base32.to_string())
        .to_bytes()
        .map_err(|_| AppError::Internal)?;
    TOTP::new(
        Algorithm::SHA1,
        6,
        1, // window: ±1 step, spec §4.2
        30,
        secret,
        Some("TraceTrack".to_string()),
        account.to_string(),
    )
    .map_err(|_| AppError::Internal)
}

/// Verify a 6-digit code against the stored secret, allowing ±1 step
/// drift (spec §4.2).
pub fn verify_code(secret_base32: &str, account: &str, code: &str) -> Result<bool, AppError> {
    let totp = totp_for(secret_base32, account)?;
    totp.check_current(code).map_err(|_| AppError::Internal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_code_verifies() {
        let secret = generate_secret();
        let totp = totp_for(&secret, "alice").unwrap();
        let code = totp.generate_current().unwrap();
        assert!(verify_code(&secret, "alice", &code).unwrap());

        let wrong_digit = if code.starts_with('0') { '1' } else { '0' };
        let wrong_code = format!("{wrong_digit}{}", &code[1..]);
        assert!(!verify_code(&secret, "alice", &wrong_code).unwrap());
    }
}
