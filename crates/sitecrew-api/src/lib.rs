//! # sitecrew-api
//!
//! REST API layer for Sitecrew: credential and token utilities, the OTP
//! engine, the auth service, authorization middleware, and the HTTP routes.

pub mod email;
pub mod middleware;
pub mod otp;
pub mod routes;
pub mod service;
pub mod tokens;

use axum::Router;
use service::AuthService;
use sitecrew_db::Database;
use std::sync::Arc;

/// Shared application state available to all route handlers.
pub struct AppState {
    pub db: Database,
    pub auth: AuthService,
}

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(routes::auth::router())
        .merge(routes::health::router());

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .with_state(Arc::new(state))
}
