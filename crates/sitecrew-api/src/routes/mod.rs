//! HTTP route modules.

pub mod auth;
pub mod health;
