//! Repository modules — one per table, free functions over an executor.

pub mod companies;
pub mod identities;
pub mod otp_challenges;
pub mod pending;
pub mod sessions;
