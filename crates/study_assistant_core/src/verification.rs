//! crates/study_assistant_core/src/verification.rs
//!
//! Rules for the six-digit email verification codes.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::domain::VerificationCode;

pub const CODE_LENGTH: usize = 6;

/// Default lifetime of a freshly issued code.
pub const DEFAULT_CODE_TTL_MINUTES: i64 = 10;

/// Longest lifetime a deployment may configure for a code.
pub const MAX_CODE_TTL_MINUTES: i64 = 24 * 60;

/// Wrong guesses after which every outstanding code for an email and purpose is dead.
pub const MAX_FAILED_ATTEMPTS: i32 = 5;

/// Generates a code in the range 100000..=999999.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(100_000..=999_999u32).to_string()
}

/// True when `code` looks like something `generate_code` could have produced.
pub fn is_well_formed(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.chars().all(|c| c.is_ascii_digit())
}

pub fn expiry_from(issued_at: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    issued_at + ttl
}

impl VerificationCode {
    /// A code can be redeemed once, only before it expires, and only while fewer
    /// than `MAX_FAILED_ATTEMPTS` wrong guesses have been made against it.
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        !self.used && now < self.expires_at && self.failed_attempts < MAX_FAILED_ATTEMPTS
    }
}

/// Trims and lowercases an email address, rejecting values that are clearly not one.
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') || email.contains(char::is_whitespace) {
        return None;
    }
    Some(email)
}
