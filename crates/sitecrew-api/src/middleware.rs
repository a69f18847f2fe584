//! Middleware — authentication extraction, role gates, company scoping,
//! security headers.

use std::{future::Future, pin::Pin};

use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use sitecrew_common::{
    config,
    error::AppError,
    models::identity::Role,
};
use uuid::Uuid;

use crate::tokens;

/// Authentication context extracted from the Authorization header.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub company_id: Uuid,
}

type MiddlewareFuture = Pin<Box<dyn Future<Output = Result<Response, AppError>> + Send>>;

/// Extract and validate the JWT from the `Authorization: Bearer <token>`
/// header. Every verification failure presents as the same generic 401 —
/// the response never reveals whether the token was malformed, expired, or
/// well-formed-but-wrong.
pub async fn authenticate(mut request: Request, next: Next) -> Result<Response, AppError> {
    let ctx = context_from_request(&request).ok_or(AppError::InvalidToken)?;
    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

/// Like [`authenticate`], but a missing or bad token proceeds without an
/// attached identity instead of rejecting. Used where guests and signed-in
/// users get different behavior (e.g. sign-out).
pub async fn optional_auth(mut request: Request, next: Next) -> Response {
    if let Some(ctx) = context_from_request(&request) {
        request.extensions_mut().insert(ctx);
    }
    next.run(request).await
}

fn context_from_request(request: &Request) -> Option<AuthContext> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?;
    let token = tokens::extract_bearer_token(header_value)?;

    let cfg = config::get();
    let claims = tokens::verify_access_token(token, &cfg.auth.access_token_secret).ok()?;

    Some(AuthContext {
        user_id: claims.user_id().ok()?,
        email: claims.email,
        role: claims.role,
        company_id: claims.company_id,
    })
}

/// Role gate: 401 without an authenticated identity, 403 when the identity's
/// role is not in `allowed`. Layer *inside* [`authenticate`].
pub fn authorize(
    allowed: &'static [Role],
) -> impl Fn(Request, Next) -> MiddlewareFuture + Clone {
    move |request: Request, next: Next| {
        Box::pin(async move {
            let ctx = request
                .extensions()
                .get::<AuthContext>()
                .ok_or(AppError::Unauthorized)?;
            if !allowed.contains(&ctx.role) {
                return Err(AppError::Forbidden);
            }
            Ok(next.run(request).await)
        })
    }
}

/// Multi-tenant isolation boundary: reject requests whose target company id
/// (a path parameter) differs from the caller's own. An admin with no
/// explicit target passes through.
pub fn require_same_company(
    param: &'static str,
) -> impl Fn(Request, Next) -> MiddlewareFuture + Clone {
    move |request: Request, next: Next| {
        Box::pin(async move {
            let (mut parts, body) = request.into_parts();

            let ctx = parts
                .extensions
                .get::<AuthContext>()
                .cloned()
                .ok_or(AppError::Unauthorized)?;

            let params = axum::extract::RawPathParams::from_request_parts(&mut parts, &())
                .await
                .map_err(|_| AppError::validation("Invalid path parameters"))?;
            let target = params
                .iter()
                .find(|(name, _)| *name == param)
                .map(|(_, value)| {
                    value
                        .parse::<Uuid>()
                        .map_err(|_| AppError::validation("Invalid company id"))
                })
                .transpose()?;

            check_company_scope(&ctx, target)?;

            Ok(next.run(Request::from_parts(parts, body)).await)
        })
    }
}

/// The pure scoping rule behind [`require_same_company`].
pub fn check_company_scope(ctx: &AuthContext, target: Option<Uuid>) -> Result<(), AppError> {
    match target {
        None if ctx.role == Role::Admin => Ok(()),
        None => Ok(()),
        Some(target) if target == ctx.company_id => Ok(()),
        Some(_) => Err(AppError::Forbidden),
    }
}

/// Extracts the [`AuthContext`] placed by [`authenticate`]; rejects with 401
/// when the route was not layered with it.
pub struct CurrentUser(pub AuthContext);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AppError::Unauthorized)
    }
}

/// Optional variant for routes layered with [`optional_auth`].
pub struct MaybeUser(pub Option<AuthContext>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<AuthContext>().cloned()))
    }
}

/// Client metadata recorded on refresh sessions: peer address (when served
/// with connect info) and User-Agent.
pub struct ClientMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for ClientMeta {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .extensions
            .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
            .map(|info| info.0.ip().to_string());
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(ClientMeta { ip, user_agent })
    }
}

// ── Security headers ──────────────────────────────────────────────────────────

/// Add defensive security headers to every HTTP response.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let h = response.headers_mut();

    macro_rules! set {
        ($name:expr, $val:expr) => {
            if let Ok(v) = $val.parse::<axum::http::HeaderValue>() {
                h.insert($name, v);
            }
        };
    }

    set!(
        axum::http::header::HeaderName::from_static("x-content-type-options"),
        "nosniff"
    );
    set!(
        axum::http::header::HeaderName::from_static("x-frame-options"),
        "DENY"
    );
    set!(
        axum::http::header::HeaderName::from_static("referrer-policy"),
        "strict-origin-when-cross-origin"
    );
    set!(
        axum::http::header::HeaderName::from_static("strict-transport-security"),
        "max-age=63072000; includeSubDomains"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware as axum_middleware,
        routing::get,
    };
    use sitecrew_common::config::{
        AppConfig, AuthConfig, DatabaseConfig, EmailConfig, ServerConfig,
    };
    use tower::ServiceExt;

    const ACCESS_SECRET: &str = "middleware-test-access-secret-0123456789";

    fn ensure_config() {
        config::init_with(AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 0,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/unused".into(),
                max_connections: 1,
                min_connections: 1,
            },
            auth: AuthConfig {
                access_token_secret: ACCESS_SECRET.into(),
                refresh_token_secret: "middleware-test-refresh-secret-987654".into(),
                access_token_ttl_secs: 3600,
                refresh_token_ttl_secs: 604_800,
                otp_expiry_minutes: 10,
                otp_max_attempts: 5,
                static_otp_code: None,
                cookie_secure: false,
            },
            email: EmailConfig {
                webhook_url: None,
                api_key: None,
                from: "no-reply@test".into(),
            },
        });
    }

    fn token_for(role: Role, company_id: Uuid) -> String {
        tokens::sign_access_token(
            Uuid::now_v7(),
            "user@test.com",
            role,
            company_id,
            ACCESS_SECRET,
            3600,
        )
        .unwrap()
    }

    fn protected_app() -> Router {
        Router::new()
            .route("/me", get(|| async { "ok" }))
            .route_layer(axum_middleware::from_fn(authenticate))
    }

    async fn send(app: Router, uri: &str, auth: Option<&str>) -> StatusCode {
        let mut builder = HttpRequest::builder().uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        let response = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.status()
    }

    #[tokio::test]
    async fn missing_token_is_401() {
        ensure_config();
        assert_eq!(send(protected_app(), "/me", None).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn garbage_token_is_401() {
        ensure_config();
        assert_eq!(
            send(protected_app(), "/me", Some("Bearer not.a.jwt")).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn valid_token_passes() {
        ensure_config();
        let token = token_for(Role::Worker, Uuid::now_v7());
        assert_eq!(
            send(protected_app(), "/me", Some(&format!("Bearer {token}"))).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn role_gate_rejects_wrong_role() {
        ensure_config();
        let app = Router::new()
            .route("/admin", get(|| async { "ok" }))
            .route_layer(axum_middleware::from_fn(authorize(&[Role::Admin])))
            .route_layer(axum_middleware::from_fn(authenticate));

        let worker = token_for(Role::Worker, Uuid::now_v7());
        assert_eq!(
            send(app.clone(), "/admin", Some(&format!("Bearer {worker}"))).await,
            StatusCode::FORBIDDEN
        );

        let admin = token_for(Role::Admin, Uuid::now_v7());
        assert_eq!(
            send(app, "/admin", Some(&format!("Bearer {admin}"))).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn cross_company_access_is_403() {
        ensure_config();
        let app = Router::new()
            .route("/companies/{company_id}/sites", get(|| async { "ok" }))
            .route_layer(axum_middleware::from_fn(require_same_company("company_id")))
            .route_layer(axum_middleware::from_fn(authenticate));

        let company_a = Uuid::now_v7();
        let company_b = Uuid::now_v7();
        let token = token_for(Role::Worker, company_a);

        // Own company: allowed
        assert_eq!(
            send(
                app.clone(),
                &format!("/companies/{company_a}/sites"),
                Some(&format!("Bearer {token}"))
            )
            .await,
            StatusCode::OK
        );

        // Someone else's company: 403 even with a valid token
        assert_eq!(
            send(
                app,
                &format!("/companies/{company_b}/sites"),
                Some(&format!("Bearer {token}"))
            )
            .await,
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn company_scope_rule() {
        let company = Uuid::now_v7();
        let other = Uuid::now_v7();
        let admin = AuthContext {
            user_id: Uuid::now_v7(),
            email: "admin@co.com".into(),
            role: Role::Admin,
            company_id: company,
        };
        let worker = AuthContext {
            role: Role::Worker,
            ..admin.clone()
        };

        assert!(check_company_scope(&admin, None).is_ok());
        assert!(check_company_scope(&admin, Some(company)).is_ok());
        assert!(check_company_scope(&admin, Some(other)).is_err());
        assert!(check_company_scope(&worker, Some(company)).is_ok());
        assert!(check_company_scope(&worker, Some(other)).is_err());
    }

    #[tokio::test]
    async fn optional_auth_lets_guests_through() {
        ensure_config();
        let app = Router::new()
            .route(
                "/signout",
                get(|MaybeUser(user): MaybeUser| async move {
                    if user.is_some() { "signed-in" } else { "guest" }
                }),
            )
            .route_layer(axum_middleware::from_fn(optional_auth));

        assert_eq!(send(app.clone(), "/signout", None).await, StatusCode::OK);
        assert_eq!(
            send(app, "/signout", Some("Bearer garbage")).await,
            StatusCode::OK
        );
    }
}
