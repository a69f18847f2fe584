//! Identity model — a person belonging to exactly one company.
//!
//! Exactly one admin is created per company at signup; every later identity
//! is created by that admin and may not hold the admin role. Identities are
//! never hard-deleted, only deactivated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Role held by an identity within its company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Company owner — full control, one per company.
    Admin,
    /// Runs one or more sites: rosters, reports, tool assignment.
    SiteManager,
    /// On-site personnel filing reports and using assigned tools.
    Worker,
    /// External client with read access to their projects.
    Client,
}

/// A Sitecrew user account, scoped to one company.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Identity {
    /// Unique user ID (UUID v7 — time-sortable)
    pub id: Uuid,

    /// Owning company
    pub company_id: Uuid,

    /// Globally unique, stored lowercase
    pub email: String,

    /// Argon2id password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,

    pub role: Role,

    /// Deactivation flag — inactive identities cannot sign in or refresh.
    pub active: bool,

    pub last_login_at: Option<DateTime<Utc>>,
    pub email_verified_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Signup request — stages a pending registration, creates nothing yet.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    #[validate(length(min = 1, max = 64, message = "First name must be 1-64 characters"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 64, message = "Last name must be 1-64 characters"))]
    pub last_name: String,

    pub phone: Option<String>,

    #[validate(length(min = 1, max = 128, message = "Company name must be 1-128 characters"))]
    pub company_name: String,

    #[validate(length(min = 1, message = "Company email is required"))]
    pub company_email: String,

    pub company_phone: Option<String>,

    /// Australian Business Number, free-form at this layer.
    pub company_abn: Option<String>,
}

/// Sign-in request
#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// OTP verification request completing a signup.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,

    #[validate(length(min = 4, max = 8, message = "OTP code must be 4-8 digits"))]
    pub otp_code: String,
}

/// Admin-invoked user creation. The admin role is rejected at the service
/// layer; the created identity inherits the caller's company.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    #[validate(length(min = 1, max = 64, message = "First name must be 1-64 characters"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 64, message = "Last name must be 1-64 characters"))]
    pub last_name: String,

    pub phone: Option<String>,

    pub role: Role,
}

/// Resend the verification code for a still-pending signup.
#[derive(Debug, Deserialize, Validate)]
pub struct ResendOtpRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,

    #[validate(length(min = 4, max = 8, message = "OTP code must be 4-8 digits"))]
    pub otp_code: String,

    #[validate(length(min = 1, message = "New password is required"))]
    pub new_password: String,
}

/// Safe identity representation for API responses (no sensitive fields)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub company_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Identity> for UserResponse {
    fn from(i: Identity) -> Self {
        Self {
            id: i.id,
            company_id: i.company_id,
            email: i.email,
            first_name: i.first_name,
            last_name: i.last_name,
            phone: i.phone,
            role: i.role,
            active: i.active,
            last_login_at: i.last_login_at,
            email_verified_at: i.email_verified_at,
            created_at: i.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resend_request_takes_a_bare_email() {
        let req: ResendOtpRequest = serde_json::from_str(r#"{"email":"a@x.com"}"#).unwrap();
        assert_eq!(req.email, "a@x.com");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn role_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Role::SiteManager).unwrap(),
            "\"site_manager\""
        );
        assert_eq!(
            serde_json::from_str::<Role>("\"admin\"").unwrap(),
            Role::Admin
        );
    }
}
