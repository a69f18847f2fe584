//! Company repository.

use chrono::{DateTime, Utc};
use sitecrew_common::models::company::{Company, SubscriptionTier};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Create a company. Takes an executor so signup promotion can run it inside
/// the same transaction as the admin identity insert.
#[allow(clippy::too_many_arguments)]
pub async fn create<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
    name: &str,
    email: &str,
    phone: Option<&str>,
    abn: Option<&str>,
    tier: SubscriptionTier,
    trial_ends_at: DateTime<Utc>,
) -> Result<Company, sqlx::Error> {
    sqlx::query_as::<_, Company>(
        r#"
        INSERT INTO companies (id, name, email, phone, abn, subscription_tier, trial_ends_at, active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(email)
    .bind(phone)
    .bind(abn)
    .bind(tier)
    .bind(trial_ends_at)
    .fetch_one(executor)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Company>, sqlx::Error> {
    sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Duplicate-email fast path; the unique index is the real guard.
pub async fn exists_by_email(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
    let row: (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM companies WHERE LOWER(email) = LOWER($1))")
            .bind(email)
            .fetch_one(pool)
            .await?;
    Ok(row.0)
}
