//! OTP challenge repository.
//!
//! The attempt counter is incremented with a single conditional UPDATE so
//! concurrent verifications cannot race past the limit.

use chrono::{DateTime, Utc};
use sitecrew_common::models::otp::{OtpChallenge, OtpPurpose};
use sqlx::PgPool;
use uuid::Uuid;

/// Close any still-pending challenge for (email, purpose). Called before a
/// new challenge is issued — at most one active challenge per pair.
pub async fn invalidate_pending(
    pool: &PgPool,
    email: &str,
    purpose: OtpPurpose,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE otp_challenges SET verified_at = $3
        WHERE LOWER(email) = LOWER($1) AND purpose = $2 AND verified_at IS NULL
        "#,
    )
    .bind(email)
    .bind(purpose)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn insert(
    pool: &PgPool,
    id: Uuid,
    email: &str,
    purpose: OtpPurpose,
    code: &str,
    expires_at: DateTime<Utc>,
    max_attempts: i32,
) -> Result<OtpChallenge, sqlx::Error> {
    sqlx::query_as::<_, OtpChallenge>(
        r#"
        INSERT INTO otp_challenges (id, email, purpose, code, expires_at, attempts, max_attempts, created_at)
        VALUES ($1, $2, $3, $4, $5, 0, $6, NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(email)
    .bind(purpose)
    .bind(code)
    .bind(expires_at)
    .bind(max_attempts)
    .fetch_one(pool)
    .await
}

/// Most recently created pending challenge for (email, purpose).
pub async fn find_latest_pending(
    pool: &PgPool,
    email: &str,
    purpose: OtpPurpose,
) -> Result<Option<OtpChallenge>, sqlx::Error> {
    sqlx::query_as::<_, OtpChallenge>(
        r#"
        SELECT * FROM otp_challenges
        WHERE LOWER(email) = LOWER($1) AND purpose = $2 AND verified_at IS NULL
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(email)
    .bind(purpose)
    .fetch_optional(pool)
    .await
}

/// Atomic read-increment: bumps the counter only while under the limit and
/// returns the post-increment value. `None` means the limit was already hit
/// by a concurrent call.
pub async fn increment_attempts(pool: &PgPool, id: Uuid) -> Result<Option<i32>, sqlx::Error> {
    let row: Option<(i32,)> = sqlx::query_as(
        r#"
        UPDATE otp_challenges SET attempts = attempts + 1
        WHERE id = $1 AND attempts < max_attempts AND verified_at IS NULL
        RETURNING attempts
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(attempts,)| attempts))
}

/// Consume a challenge on successful verification.
pub async fn mark_verified(
    pool: &PgPool,
    id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE otp_challenges SET verified_at = $2 WHERE id = $1")
        .bind(id)
        .bind(now)
        .execute(pool)
        .await?;
    Ok(())
}

/// Bulk-delete challenges past expiry. Idempotent, any schedule.
pub async fn delete_expired(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM otp_challenges WHERE expires_at < $1")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
