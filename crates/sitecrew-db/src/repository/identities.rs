//! Identity repository — account rows and the credential fields on them.

use chrono::{DateTime, Utc};
use sitecrew_common::models::{
    company::Company,
    identity::{Identity, Role},
};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Create an identity. Executor-generic so signup promotion can run inside
/// the company-creation transaction.
#[allow(clippy::too_many_arguments)]
pub async fn create<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
    company_id: Uuid,
    email: &str,
    password_hash: &str,
    first_name: &str,
    last_name: &str,
    phone: Option<&str>,
    role: Role,
    email_verified_at: Option<DateTime<Utc>>,
) -> Result<Identity, sqlx::Error> {
    sqlx::query_as::<_, Identity>(
        r#"
        INSERT INTO identities
            (id, company_id, email, password_hash, first_name, last_name, phone, role, active, email_verified_at, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, $9, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(company_id)
    .bind(email)
    .bind(password_hash)
    .bind(first_name)
    .bind(last_name)
    .bind(phone)
    .bind(role)
    .bind(email_verified_at)
    .fetch_one(executor)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Identity>, sqlx::Error> {
    sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Identity>, sqlx::Error> {
    sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
}

/// Identity plus its company, for sign-in's inactive-company check.
pub async fn find_by_email_with_company(
    pool: &PgPool,
    email: &str,
) -> Result<Option<(Identity, Company)>, sqlx::Error> {
    let identity = find_by_email(pool, email).await?;
    let Some(identity) = identity else {
        return Ok(None);
    };
    let company = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
        .bind(identity.company_id)
        .fetch_one(pool)
        .await?;
    Ok(Some((identity, company)))
}

/// Duplicate-email fast path; the unique index is the real guard.
pub async fn exists_by_email(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
    let row: (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM identities WHERE LOWER(email) = LOWER($1))")
            .bind(email)
            .fetch_one(pool)
            .await?;
    Ok(row.0)
}

pub async fn update_last_login(
    pool: &PgPool,
    id: Uuid,
    at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE identities SET last_login_at = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(at)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_password_hash(
    pool: &PgPool,
    id: Uuid,
    password_hash: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE identities SET password_hash = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;
    Ok(())
}
