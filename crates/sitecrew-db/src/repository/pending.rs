//! Pending registration repository.
//!
//! One live draft per email: staging deletes any prior draft first (last
//! signup attempt wins), and expired drafts are reaped when touched.

use chrono::{DateTime, Utc};
use sitecrew_common::models::pending::PendingRegistration;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Stage a draft, replacing any previous draft for the same email.
#[allow(clippy::too_many_arguments)]
pub async fn stage(
    pool: &PgPool,
    id: Uuid,
    email: &str,
    password_hash: &str,
    first_name: &str,
    last_name: &str,
    phone: Option<&str>,
    company_name: &str,
    company_email: &str,
    company_phone: Option<&str>,
    company_abn: Option<&str>,
    verification_token: &str,
    expires_at: DateTime<Utc>,
) -> Result<PendingRegistration, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM pending_registrations WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .execute(&mut *tx)
        .await?;

    let draft = sqlx::query_as::<_, PendingRegistration>(
        r#"
        INSERT INTO pending_registrations
            (id, email, password_hash, first_name, last_name, phone,
             company_name, company_email, company_phone, company_abn,
             verification_token, expires_at, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(email)
    .bind(password_hash)
    .bind(first_name)
    .bind(last_name)
    .bind(phone)
    .bind(company_name)
    .bind(company_email)
    .bind(company_phone)
    .bind(company_abn)
    .bind(verification_token)
    .bind(expires_at)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(draft)
}

pub async fn find_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<PendingRegistration>, sqlx::Error> {
    sqlx::query_as::<_, PendingRegistration>(
        "SELECT * FROM pending_registrations WHERE LOWER(email) = LOWER($1)",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn delete_by_email<'e>(
    executor: impl PgExecutor<'e>,
    email: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM pending_registrations WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Bulk-reap drafts past their TTL. Idempotent, safe alongside live traffic.
pub async fn delete_expired(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM pending_registrations WHERE expires_at < $1")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
