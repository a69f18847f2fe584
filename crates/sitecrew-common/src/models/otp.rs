//! OTP challenge model — a one-time code scoped to (email, purpose).
//!
//! At most one pending challenge exists per (email, purpose) pair; issuing a
//! new code closes any still-pending prior one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What an OTP proves control of an email address for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    EmailVerification,
    PasswordReset,
    TwoFactor,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OtpChallenge {
    pub id: Uuid,

    /// Target email, lowercase. OTPs are issued before an identity may exist
    /// (signup), so this is an email key rather than a user id.
    pub email: String,

    pub purpose: OtpPurpose,

    /// Fixed-length numeric code.
    pub code: String,

    pub expires_at: DateTime<Utc>,

    /// Failed submissions so far. Incremented atomically in SQL.
    pub attempts: i32,

    pub max_attempts: i32,

    /// Set when consumed (verified) or superseded by a newer challenge.
    /// Null while pending.
    pub verified_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

/// Pending-challenge state at a given instant, checked in this order:
/// expiry, then exhaustion. The exhaustion check happens before any
/// increment, so the limit is a hard ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpGate {
    Expired,
    Exhausted,
    Open,
}

impl OtpChallenge {
    pub fn gate(&self, now: DateTime<Utc>) -> OtpGate {
        if now > self.expires_at {
            OtpGate::Expired
        } else if self.attempts >= self.max_attempts {
            OtpGate::Exhausted
        } else {
            OtpGate::Open
        }
    }

    pub fn is_pending(&self) -> bool {
        self.verified_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn challenge(now: DateTime<Utc>) -> OtpChallenge {
        OtpChallenge {
            id: Uuid::now_v7(),
            email: "worker@site.com".into(),
            purpose: OtpPurpose::EmailVerification,
            code: "123456".into(),
            expires_at: now + Duration::minutes(10),
            attempts: 0,
            max_attempts: 5,
            verified_at: None,
            created_at: now,
        }
    }

    #[test]
    fn fresh_challenge_is_open() {
        let now = Utc::now();
        assert_eq!(challenge(now).gate(now), OtpGate::Open);
    }

    #[test]
    fn expiry_takes_precedence_over_exhaustion() {
        let now = Utc::now();
        let mut c = challenge(now);
        c.attempts = 5;
        let later = now + Duration::minutes(11);
        assert_eq!(c.gate(later), OtpGate::Expired);
    }

    #[test]
    fn exhausted_at_max_attempts() {
        let now = Utc::now();
        let mut c = challenge(now);
        c.attempts = 5;
        assert_eq!(c.gate(now), OtpGate::Exhausted);
        c.attempts = 4;
        assert_eq!(c.gate(now), OtpGate::Open);
    }
}
