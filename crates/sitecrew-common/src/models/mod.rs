//! Shared data models for the auth core.

pub mod company;
pub mod identity;
pub mod otp;
pub mod pending;
pub mod session;
