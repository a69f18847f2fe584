//! Refresh session repository.
//!
//! Rows hold only the SHA-256 digest of the refresh token. Revocation is a
//! flag flip, never a delete, so sign-out leaves an audit trail; expired
//! rows are purged opportunistically when the user stores a new session.

use chrono::{DateTime, Utc};
use sitecrew_common::models::session::RefreshSession;
use sqlx::PgPool;
use uuid::Uuid;

/// Purge this user's already-expired rows, then insert the new session.
#[allow(clippy::too_many_arguments)]
pub async fn store(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    token_hash: &str,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
) -> Result<RefreshSession, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM refresh_sessions WHERE user_id = $1 AND expires_at < $2")
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    let session = sqlx::query_as::<_, RefreshSession>(
        r#"
        INSERT INTO refresh_sessions (id, user_id, token_hash, expires_at, revoked, ip_address, user_agent, created_at)
        VALUES ($1, $2, $3, $4, FALSE, $5, $6, NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .bind(ip_address)
    .bind(user_agent)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(session)
}

/// Find a live (unrevoked, unexpired) session for this user by token digest.
pub async fn find_live_by_hash(
    pool: &PgPool,
    token_hash: &str,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Option<RefreshSession>, sqlx::Error> {
    sqlx::query_as::<_, RefreshSession>(
        r#"
        SELECT * FROM refresh_sessions
        WHERE token_hash = $1 AND user_id = $2 AND revoked = FALSE AND expires_at >= $3
        "#,
    )
    .bind(token_hash)
    .bind(user_id)
    .bind(now)
    .fetch_optional(pool)
    .await
}

pub async fn touch_last_used(
    pool: &PgPool,
    id: Uuid,
    at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE refresh_sessions SET last_used_at = $2 WHERE id = $1")
        .bind(id)
        .bind(at)
        .execute(pool)
        .await?;
    Ok(())
}

/// Revoke the session matching a token digest. The optional user scope
/// defends against cross-user token confusion. Returns rows affected —
/// zero is fine, sign-out is a tolerant no-op.
pub async fn revoke_by_hash(
    pool: &PgPool,
    token_hash: &str,
    user_id: Option<Uuid>,
) -> Result<u64, sqlx::Error> {
    let result = match user_id {
        Some(user_id) => {
            sqlx::query(
                "UPDATE refresh_sessions SET revoked = TRUE WHERE token_hash = $1 AND user_id = $2",
            )
            .bind(token_hash)
            .bind(user_id)
            .execute(pool)
            .await?
        }
        None => {
            sqlx::query("UPDATE refresh_sessions SET revoked = TRUE WHERE token_hash = $1")
                .bind(token_hash)
                .execute(pool)
                .await?
        }
    };
    Ok(result.rows_affected())
}

/// Revoke every live session for a user — sign-out-everywhere and forced
/// invalidation after a password reset.
pub async fn revoke_all(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("UPDATE refresh_sessions SET revoked = TRUE WHERE user_id = $1 AND revoked = FALSE")
            .bind(user_id)
            .execute(pool)
            .await?;
    Ok(result.rows_affected())
}

/// Bulk-delete sessions past expiry. Idempotent, any schedule.
pub async fn delete_expired(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM refresh_sessions WHERE expires_at < $1")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
