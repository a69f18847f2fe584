//! Pending registration — a staged signup draft awaiting OTP verification.
//!
//! Holds the hashed password plus the company and admin drafts until the
//! email is proven, at which point it is promoted into real Company and
//! Identity rows and deleted. At most one live draft per email; a newer
//! signup attempt for the same email replaces the old draft.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hours a staged signup stays promotable.
pub const PENDING_REGISTRATION_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PendingRegistration {
    pub id: Uuid,

    /// Unique — the signup key.
    pub email: String,

    /// Argon2id hash; the plain password is never staged.
    pub password_hash: String,

    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,

    pub company_name: String,
    pub company_email: String,
    pub company_phone: Option<String>,
    pub company_abn: Option<String>,

    /// Opaque token tying the OTP round-trip to this draft.
    pub verification_token: String,

    pub expires_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
}

impl PendingRegistration {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn draft_expires_strictly_after_the_deadline() {
        let now = Utc::now();
        let draft = PendingRegistration {
            id: Uuid::now_v7(),
            email: "owner@build.co".into(),
            password_hash: "$argon2id$stub".into(),
            first_name: "Sam".into(),
            last_name: "Mason".into(),
            phone: None,
            company_name: "Mason Builds".into(),
            company_email: "office@build.co".into(),
            company_phone: None,
            company_abn: None,
            verification_token: "tok".into(),
            expires_at: now + Duration::hours(PENDING_REGISTRATION_TTL_HOURS),
            created_at: now,
        };

        assert!(!draft.is_expired(now));
        assert!(!draft.is_expired(draft.expires_at));
        // One tick past the deadline the draft is dead: promotion and resend
        // both reap it instead of acting on it.
        assert!(draft.is_expired(draft.expires_at + Duration::seconds(1)));
    }
}
