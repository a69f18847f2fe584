//! Authentication routes — signup, OTP verification, sign-in, refresh,
//! sign-out, admin user creation, password reset.
//!
//! The refresh token travels only in an HTTP-only SameSite=Strict cookie;
//! the access token is returned in the JSON body and never cookied.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use sitecrew_common::{
    config,
    error::{AppError, AppResult},
    models::identity::{
        CreateUserRequest, ForgotPasswordRequest, ResendOtpRequest, ResetPasswordRequest, Role,
        SignInRequest, SignUpRequest, UserResponse, VerifyOtpRequest,
    },
    validation::validate_request,
};
use std::sync::Arc;

use crate::{
    AppState,
    middleware::{ClientMeta, CurrentUser, MaybeUser, authenticate, authorize, optional_auth},
    service::{AuthenticatedSession, MSG_RESET_NEUTRAL, SessionMeta},
};

const REFRESH_COOKIE: &str = "refresh_token";

/// Auth router.
pub fn router() -> Router<Arc<AppState>> {
    let public = Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/verify-otp", post(verify_otp))
        .route("/auth/resend-otp", post(resend_otp))
        .route("/auth/signin", post(sign_in))
        .route("/auth/refresh", post(refresh))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password));

    // Sign-out works for guests and signed-in users alike
    let optional = Router::new()
        .route("/auth/signout", post(sign_out))
        .route_layer(axum_middleware::from_fn(optional_auth));

    let protected = Router::new()
        .route("/auth/me", get(me))
        .route("/auth/signout-all", post(sign_out_all))
        .route_layer(axum_middleware::from_fn(authenticate));

    let admin = Router::new()
        .route("/auth/create-user", post(create_user))
        .route_layer(axum_middleware::from_fn(authorize(&[Role::Admin])))
        .route_layer(axum_middleware::from_fn(authenticate));

    public.merge(optional).merge(protected).merge(admin)
}

// ── Response shapes ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct SignUpResponse {
    email: String,
    #[serde(rename = "requiresOTP")]
    requires_otp: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    user: UserResponse,
    access_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Serialize)]
struct MeResponse {
    user: UserResponse,
}

fn message(text: &str) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.to_string(),
    })
}

// ── Cookie handling ───────────────────────────────────────────────────────────

fn refresh_cookie(token: String) -> Cookie<'static> {
    let cfg = config::get();
    let mut cookie = Cookie::new(REFRESH_COOKIE, token);
    cookie.set_http_only(true);
    cookie.set_secure(cfg.auth.cookie_secure);
    cookie.set_same_site(SameSite::Strict);
    cookie.set_path("/");
    cookie.set_max_age(time::Duration::seconds(
        cfg.auth.refresh_token_ttl_secs as i64,
    ));
    cookie
}

fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::from(REFRESH_COOKIE);
    cookie.set_path("/");
    cookie
}

fn session_response(jar: CookieJar, session: AuthenticatedSession) -> impl IntoResponse {
    let jar = jar.add(refresh_cookie(session.refresh_token));
    (
        jar,
        Json(AuthResponse {
            user: session.user.into(),
            access_token: session.access_token,
        }),
    )
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// POST /api/v1/auth/signup
///
/// Stage a signup and send a verification OTP. No account rows and no
/// tokens yet — those wait for verify-otp.
async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignUpRequest>,
) -> AppResult<impl IntoResponse> {
    validate_request(&body)?;
    let email = state.auth.sign_up(body).await?;
    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse {
            email,
            requires_otp: true,
        }),
    ))
}

/// POST /api/v1/auth/verify-otp
///
/// Complete a staged signup: promote the draft and sign the admin in.
async fn verify_otp(
    State(state): State<Arc<AppState>>,
    meta: ClientMeta,
    jar: CookieJar,
    Json(body): Json<VerifyOtpRequest>,
) -> AppResult<impl IntoResponse> {
    validate_request(&body)?;
    let session = state
        .auth
        .complete_signup(
            &body.email,
            &body.otp_code,
            SessionMeta {
                ip: meta.ip,
                user_agent: meta.user_agent,
            },
        )
        .await?;
    Ok(session_response(jar, session))
}

/// POST /api/v1/auth/resend-otp
async fn resend_otp(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResendOtpRequest>,
) -> AppResult<impl IntoResponse> {
    validate_request(&body)?;
    state.auth.resend_verification(&body.email).await?;
    Ok(message("Verification code sent"))
}

/// POST /api/v1/auth/signin
async fn sign_in(
    State(state): State<Arc<AppState>>,
    meta: ClientMeta,
    jar: CookieJar,
    Json(body): Json<SignInRequest>,
) -> AppResult<impl IntoResponse> {
    validate_request(&body)?;
    let session = state
        .auth
        .sign_in(
            &body.email,
            &body.password,
            SessionMeta {
                ip: meta.ip,
                user_agent: meta.user_agent,
            },
        )
        .await?;
    Ok(session_response(jar, session))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody {
    refresh_token: Option<String>,
}

/// POST /api/v1/auth/refresh
///
/// Exchange the refresh token (cookie, or body fallback for non-browser
/// clients) for a new access token. The refresh token itself is not rotated.
async fn refresh(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: Result<Json<RefreshBody>, JsonRejection>,
) -> AppResult<Json<RefreshResponse>> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| payload.ok().and_then(|Json(b)| b.refresh_token));
    let token = token.ok_or(AppError::Unauthorized)?;

    let access_token = state.auth.refresh_access_token(&token).await?;
    Ok(Json(RefreshResponse { access_token }))
}

/// POST /api/v1/auth/signout
///
/// Revoke the presented session. Tolerant: guests and stale tokens get the
/// same 200.
async fn sign_out(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    if let Some(cookie) = jar.get(REFRESH_COOKIE) {
        state
            .auth
            .sign_out(cookie.value(), user.map(|u| u.user_id))
            .await?;
    }
    let jar = jar.remove(removal_cookie());
    Ok((jar, message("Signed out")))
}

/// POST /api/v1/auth/signout-all
async fn sign_out_all(
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    state.auth.sign_out_all(ctx.user_id).await?;
    let jar = jar.remove(removal_cookie());
    Ok((jar, message("Signed out everywhere")))
}

/// GET /api/v1/auth/me
async fn me(
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
) -> AppResult<Json<MeResponse>> {
    let identity = state.auth.current_user(ctx.user_id).await?;
    Ok(Json(MeResponse {
        user: identity.into(),
    }))
}

/// POST /api/v1/auth/create-user
///
/// Admin-only (enforced by the route's authorize layer). The new identity
/// joins the admin's company and can never be another admin.
async fn create_user(
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
    Json(body): Json<CreateUserRequest>,
) -> AppResult<impl IntoResponse> {
    validate_request(&body)?;
    let identity = state.auth.create_user(ctx.company_id, body).await?;
    Ok((
        StatusCode::CREATED,
        Json(MeResponse {
            user: identity.into(),
        }),
    ))
}

/// POST /api/v1/auth/forgot-password
///
/// Always the same neutral acknowledgment — no account enumeration.
async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ForgotPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    validate_request(&body)?;
    state.auth.request_password_reset(&body.email).await?;
    Ok(message(MSG_RESET_NEUTRAL))
}

/// POST /api/v1/auth/reset-password
async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResetPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    validate_request(&body)?;
    state
        .auth
        .reset_password(&body.email, &body.otp_code, &body.new_password)
        .await?;
    Ok(message(
        "Password reset successfully. Please sign in with your new password.",
    ))
}
