//! Company model — the tenant boundary.
//!
//! Every identity belongs to exactly one company; company id scoping is the
//! multi-tenant isolation line enforced by the authorization middleware.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subscription tier. New signups start on the free tier with a 30-day trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Free,
    Standard,
    Premium,
}

/// Trial window granted to newly promoted companies, in days.
pub const TRIAL_PERIOD_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Company {
    pub id: Uuid,

    pub name: String,

    /// Billing/contact email, unique across companies, stored lowercase.
    pub email: String,

    pub phone: Option<String>,

    /// Australian Business Number
    pub abn: Option<String>,

    pub subscription_tier: SubscriptionTier,

    pub trial_ends_at: DateTime<Utc>,

    /// Inactive companies block sign-in for all their identities.
    pub active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
