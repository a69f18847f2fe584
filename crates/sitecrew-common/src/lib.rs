//! # sitecrew-common
//!
//! Shared foundation for Sitecrew services: configuration, the error
//! taxonomy, data models, input validation, the clock abstraction, and the
//! route-guard policy mirrored by dashboard clients.

pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod route_guard;
pub mod validation;
