//! OTP engine — issues, verifies, and expires one-time codes.
//!
//! One active challenge per (email, purpose): issuing a new code closes any
//! still-pending prior one, and a resend is just a reissue (remaining
//! attempts do not carry over). Verification order is fixed: missing, then
//! expired, then exhausted (checked before incrementing), then an atomic
//! increment, then the code comparison.

use chrono::Duration;
use rand::Rng;
use sitecrew_common::{
    clock::SharedClock,
    config::AuthConfig,
    error::{AppError, AppResult},
    models::otp::{OtpChallenge, OtpGate, OtpPurpose},
};
use sitecrew_db::repository::otp_challenges;
use sqlx::PgPool;
use uuid::Uuid;

use crate::email::{self, SharedMailer};

pub const MSG_NO_OTP: &str = "No valid OTP found. Please request a new code.";
pub const MSG_EXPIRED: &str = "OTP has expired. Please request a new code.";
pub const MSG_MAX_ATTEMPTS: &str = "Maximum OTP attempts reached. Please request a new code.";

pub struct OtpEngine {
    pool: PgPool,
    mailer: SharedMailer,
    clock: SharedClock,
    expiry_minutes: u32,
    max_attempts: i32,
    static_code: Option<String>,
}

impl OtpEngine {
    pub fn new(pool: PgPool, mailer: SharedMailer, clock: SharedClock, cfg: &AuthConfig) -> Self {
        Self {
            pool,
            mailer,
            clock,
            expiry_minutes: cfg.otp_expiry_minutes,
            max_attempts: cfg.otp_max_attempts as i32,
            static_code: cfg.static_otp_code.clone(),
        }
    }

    /// Issue a fresh challenge for (email, purpose), superseding any pending
    /// one, and hand the code to the email sink. Email failure cannot fail
    /// this call — the sink is fire-and-forget.
    pub async fn create(&self, email: &str, purpose: OtpPurpose) -> AppResult<OtpChallenge> {
        let now = self.clock.now();

        let superseded = otp_challenges::invalidate_pending(&self.pool, email, purpose, now).await?;
        if superseded > 0 {
            tracing::debug!(%email, ?purpose, superseded, "superseded pending OTP challenge(s)");
        }

        let code = match &self.static_code {
            Some(code) => code.clone(),
            None => generate_code(),
        };

        let challenge = otp_challenges::insert(
            &self.pool,
            Uuid::now_v7(),
            email,
            purpose,
            &code,
            now + Duration::minutes(i64::from(self.expiry_minutes)),
            self.max_attempts,
        )
        .await?;

        self.mailer.send(match purpose {
            OtpPurpose::EmailVerification | OtpPurpose::TwoFactor => {
                email::verification_email(email, &code, self.expiry_minutes)
            }
            OtpPurpose::PasswordReset => {
                email::password_reset_email(email, &code, self.expiry_minutes)
            }
        });

        tracing::info!(%email, ?purpose, "OTP challenge issued");
        Ok(challenge)
    }

    /// Check a submitted code. Every check inside the window costs an
    /// attempt, matched or not; expired and already-exhausted challenges are
    /// rejected before any increment.
    pub async fn verify(&self, email: &str, code: &str, purpose: OtpPurpose) -> AppResult<()> {
        let now = self.clock.now();

        let Some(challenge) =
            otp_challenges::find_latest_pending(&self.pool, email, purpose).await?
        else {
            return Err(AppError::OtpRejected(MSG_NO_OTP.into()));
        };

        match challenge.gate(now) {
            OtpGate::Expired => Err(AppError::OtpRejected(MSG_EXPIRED.into())),
            OtpGate::Exhausted => Err(AppError::OtpRejected(MSG_MAX_ATTEMPTS.into())),
            OtpGate::Open => {
                // Conditional UPDATE; None means a concurrent check already
                // consumed the last attempt.
                let Some(attempts) =
                    otp_challenges::increment_attempts(&self.pool, challenge.id).await?
                else {
                    return Err(AppError::OtpRejected(MSG_MAX_ATTEMPTS.into()));
                };

                if challenge.code == code {
                    otp_challenges::mark_verified(&self.pool, challenge.id, now).await?;
                    tracing::info!(%email, ?purpose, "OTP verified");
                    Ok(())
                } else {
                    let remaining = challenge.max_attempts - attempts;
                    Err(AppError::OtpRejected(mismatch_message(remaining)))
                }
            }
        }
    }

    /// Reissue a code — delegates to [`create`], so the old challenge is
    /// superseded rather than refreshed.
    pub async fn resend(&self, email: &str, purpose: OtpPurpose) -> AppResult<OtpChallenge> {
        self.create(email, purpose).await
    }

    /// Delete challenges past expiry. Safe on any schedule.
    pub async fn cleanup_expired(&self) -> AppResult<u64> {
        let deleted = otp_challenges::delete_expired(&self.pool, self.clock.now()).await?;
        if deleted > 0 {
            tracing::debug!(deleted, "reaped expired OTP challenges");
        }
        Ok(deleted)
    }
}

fn mismatch_message(remaining: i32) -> String {
    format!("Invalid code. {remaining} attempt(s) remaining.")
}

/// Six-digit zero-padded numeric code.
pub fn generate_code() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn mismatch_message_counts_down() {
        assert_eq!(mismatch_message(4), "Invalid code. 4 attempt(s) remaining.");
        assert_eq!(mismatch_message(0), "Invalid code. 0 attempt(s) remaining.");
    }
}
