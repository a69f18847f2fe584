//! # Sitecrew Server
//!
//! Composition root: loads config, wires the database pool, email sink, and
//! clock into the auth service, and serves the REST API. The cleanup sweep
//! for expired OTP challenges, sessions, and pending registrations runs as a
//! background interval task.

use sitecrew_api::{AppState, build_router, email::{LogMailer, SharedMailer, WebhookMailer}};
use sitecrew_common::clock::{SharedClock, SystemClock};
use sitecrew_db::Database;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration — missing signing secrets fail here, at startup
    let config = sitecrew_common::config::init()?;

    // Initialize tracing (structured logging)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sitecrew=debug,tower_http=debug".into()),
        )
        .with_target(true)
        .init();

    tracing::info!("Starting Sitecrew v{}", env!("CARGO_PKG_VERSION"));

    // Connect and migrate
    let db = Database::connect(config).await?;
    db.migrate().await?;

    // Email sink: provider webhook when configured, log-only otherwise
    let mailer: SharedMailer = match &config.email.webhook_url {
        Some(url) => {
            tracing::info!("email delivery via provider webhook");
            Arc::new(WebhookMailer::new(
                url.clone(),
                config.email.api_key.clone(),
                config.email.from.clone(),
            ))
        }
        None => {
            tracing::warn!("no email provider configured, using log-only delivery");
            Arc::new(LogMailer)
        }
    };

    let clock: SharedClock = Arc::new(SystemClock);

    let auth = sitecrew_api::service::AuthService::new(
        db.pool.clone(),
        mailer,
        clock,
        config.auth.clone(),
    );

    let state = AppState {
        db: db.clone(),
        auth,
    };

    // Periodic reap of expired OTP challenges, sessions, and pending signups
    let sweeper = sitecrew_api::service::AuthService::new(
        db.pool.clone(),
        Arc::new(LogMailer),
        Arc::new(SystemClock),
        config.auth.clone(),
    );
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(600));
        loop {
            interval.tick().await;
            if let Err(e) = sweeper.cleanup_expired().await {
                tracing::warn!("cleanup sweep failed: {e}");
            }
        }
    });

    let router = build_router(state);
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    tracing::info!("REST API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
