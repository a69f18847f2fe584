//! Refresh session — server-held proof that a refresh token was issued.
//!
//! Only the SHA-256 digest of the raw token is stored; validation recomputes
//! the digest from the presented token and looks it up. Multiple concurrent
//! sessions per user are allowed (multi-device), with no cap.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RefreshSession {
    pub id: Uuid,

    pub user_id: Uuid,

    /// SHA-256 hex digest of the raw refresh token. The raw token is never
    /// persisted.
    pub token_hash: String,

    pub expires_at: DateTime<Utc>,

    /// Set on sign-out (single) or sign-out-all / password reset (bulk).
    pub revoked: bool,

    pub ip_address: Option<String>,
    pub user_agent: Option<String>,

    pub last_used_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl RefreshSession {
    /// A session is live when unrevoked and unexpired; only live sessions
    /// satisfy a refresh request.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now <= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(now: DateTime<Utc>) -> RefreshSession {
        RefreshSession {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            token_hash: "ab".repeat(32),
            expires_at: now + Duration::days(7),
            revoked: false,
            ip_address: None,
            user_agent: None,
            last_used_at: None,
            created_at: now,
        }
    }

    #[test]
    fn live_until_expiry_or_revocation() {
        let now = Utc::now();
        let mut s = session(now);
        assert!(s.is_live(now));
        assert!(!s.is_live(now + Duration::days(8)));
        s.revoked = true;
        assert!(!s.is_live(now));
    }
}
