//! Application configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables for production.
//! Config precedence: env vars > .env file > config.toml > defaults
//!
//! The two token signing secrets deliberately have no defaults: a deployment
//! without them must fail at startup, never mint tokens with a fallback secret.

use serde::Deserialize;
use std::sync::OnceLock;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Get the global application configuration.
///
/// # Panics
/// Panics if config has not been initialized via [`init`] or [`init_with`].
pub fn get() -> &'static AppConfig {
    CONFIG
        .get()
        .expect("Config not initialized. Call sitecrew_common::config::init() first.")
}

/// Initialize the global configuration from environment.
///
/// Should be called once at application startup, before any other code accesses config.
pub fn init() -> Result<&'static AppConfig, config::ConfigError> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    let cfg = config::Config::builder()
        // Defaults
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("database.max_connections", 20)?
        .set_default("database.min_connections", 5)?
        .set_default("auth.access_token_ttl_secs", 3_600)? // 1 hour
        .set_default("auth.refresh_token_ttl_secs", 604_800)? // 7 days
        .set_default("auth.otp_expiry_minutes", 10)?
        .set_default("auth.otp_max_attempts", 5)?
        .set_default("auth.cookie_secure", true)?
        .set_default("email.from", "no-reply@sitecrew.dev")?
        // Optional config file
        .add_source(config::File::with_name("config").required(false))
        // Environment variables (SITECREW_AUTH__ACCESS_TOKEN_SECRET, etc.)
        .add_source(
            config::Environment::with_prefix("SITECREW")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = cfg.try_deserialize()?;
    app_config.auth.check_secrets()?;
    Ok(CONFIG.get_or_init(|| app_config))
}

/// Install an already-built configuration. Used by tests and embedded setups.
pub fn init_with(cfg: AppConfig) -> &'static AppConfig {
    CONFIG.get_or_init(|| cfg)
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub email: EmailConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// HS256 secret for access tokens — required, no default.
    pub access_token_secret: String,
    /// HS256 secret for refresh tokens — required, no default, distinct from
    /// the access secret so a leak of one does not compromise the other.
    pub refresh_token_secret: String,
    /// Access token TTL in seconds (default 1h)
    pub access_token_ttl_secs: u64,
    /// Refresh token TTL in seconds (default 7d)
    pub refresh_token_ttl_secs: u64,
    /// OTP validity window in minutes (default 10)
    pub otp_expiry_minutes: u32,
    /// Failed submissions allowed per OTP challenge (default 5)
    pub otp_max_attempts: u32,
    /// Fixed OTP code for non-production environments. Never set in prod.
    pub static_otp_code: Option<String>,
    /// Whether the refresh cookie carries the Secure attribute.
    pub cookie_secure: bool,
}

impl AuthConfig {
    /// Reject empty signing secrets at startup rather than at first use.
    fn check_secrets(&self) -> Result<(), config::ConfigError> {
        if self.access_token_secret.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "auth.access_token_secret must not be empty".into(),
            ));
        }
        if self.refresh_token_secret.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "auth.refresh_token_secret must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmailConfig {
    /// Transactional email provider webhook. Unset means log-only delivery.
    pub webhook_url: Option<String>,
    /// Provider API key sent as a bearer header.
    pub api_key: Option<String>,
    /// From address stamped on outbound mail.
    pub from: String,
}
