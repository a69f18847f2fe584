//! Auth service — orchestrates signup, verification, sign-in, token refresh,
//! revocation, admin user creation, and password reset.
//!
//! Sole writer of the pending-registration and refresh-session tables.
//! Signup is a staged state machine: nothing real exists until the OTP is
//! verified, at which point the draft is promoted to Company + admin
//! Identity in one transaction.

use chrono::Duration;
use sitecrew_common::{
    clock::SharedClock,
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        company::{SubscriptionTier, TRIAL_PERIOD_DAYS},
        identity::{CreateUserRequest, Identity, Role, SignUpRequest},
        otp::OtpPurpose,
        pending::PENDING_REGISTRATION_TTL_HOURS,
    },
    validation::{normalize_email, validate_email_format, validate_password_strength},
};
use sitecrew_db::repository::{companies, identities, pending, sessions};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    email::{self, SharedMailer},
    otp::OtpEngine,
    tokens,
};

const MSG_SIGNUP_EXPIRED: &str = "Registration not found or expired. Please sign up again.";
pub const MSG_RESET_NEUTRAL: &str = "If an account exists for that email, a reset code was sent.";

/// Client metadata recorded on stored refresh sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// A signed-in identity plus its freshly minted token pair.
pub struct AuthenticatedSession {
    pub user: Identity,
    pub access_token: String,
    pub refresh_token: String,
}

pub struct AuthService {
    pool: PgPool,
    mailer: SharedMailer,
    clock: SharedClock,
    otp: OtpEngine,
    cfg: AuthConfig,
}

impl AuthService {
    pub fn new(pool: PgPool, mailer: SharedMailer, clock: SharedClock, cfg: AuthConfig) -> Self {
        let otp = OtpEngine::new(pool.clone(), mailer.clone(), clock.clone(), &cfg);
        Self {
            pool,
            mailer,
            clock,
            otp,
            cfg,
        }
    }

    pub fn otp(&self) -> &OtpEngine {
        &self.otp
    }

    // ── Signup ────────────────────────────────────────────────────────────

    /// Stage a signup draft and issue a verification OTP. No tokens, no
    /// Company or Identity rows — those wait for OTP verification.
    pub async fn sign_up(&self, draft: SignUpRequest) -> AppResult<String> {
        let email = normalize_email(&draft.email);
        let company_email = normalize_email(&draft.company_email);

        let mut errors = Vec::new();
        if !validate_email_format(&email) {
            errors.push("Invalid email format".to_string());
        }
        if !validate_email_format(&company_email) {
            errors.push("Invalid company email format".to_string());
        }
        let strength = validate_password_strength(&draft.password);
        errors.extend(strength.errors);
        if !errors.is_empty() {
            return Err(AppError::Validation {
                message: "Signup validation failed".into(),
                errors,
            });
        }

        // Fast-path duplicate checks; the unique indexes remain authoritative
        // within each table. Both emails are checked against both tables — a
        // personal email already registered as a company address (or the
        // reverse) is taken, and no index spans the two tables to catch it.
        let email_taken = identities::exists_by_email(&self.pool, &email).await?
            || companies::exists_by_email(&self.pool, &email).await?;
        let company_email_taken = companies::exists_by_email(&self.pool, &company_email).await?
            || identities::exists_by_email(&self.pool, &company_email).await?;
        if let Some(conflict) = duplicate_email_conflict(email_taken, company_email_taken) {
            return Err(conflict);
        }

        let password_hash = tokens::hash_password(&draft.password)?;
        let now = self.clock.now();

        pending::stage(
            &self.pool,
            Uuid::now_v7(),
            &email,
            &password_hash,
            &draft.first_name,
            &draft.last_name,
            draft.phone.as_deref(),
            &draft.company_name,
            &company_email,
            draft.company_phone.as_deref(),
            draft.company_abn.as_deref(),
            &Uuid::new_v4().simple().to_string(),
            now + Duration::hours(PENDING_REGISTRATION_TTL_HOURS),
        )
        .await
        .map_err(|e| {
            if AppError::is_unique_violation(&e) {
                AppError::Conflict {
                    resource: "An account with this email".into(),
                }
            } else {
                e.into()
            }
        })?;

        self.otp.create(&email, OtpPurpose::EmailVerification).await?;

        tracing::info!(%email, "signup staged, verification OTP sent");
        Ok(email)
    }

    /// Verify the signup OTP and promote the draft: create the Company and
    /// its admin Identity in one transaction, then sign the user in.
    pub async fn complete_signup(
        &self,
        email: &str,
        code: &str,
        meta: SessionMeta,
    ) -> AppResult<AuthenticatedSession> {
        let email = normalize_email(email);

        self.otp
            .verify(&email, code, OtpPurpose::EmailVerification)
            .await?;

        let Some(draft) = pending::find_by_email(&self.pool, &email).await? else {
            return Err(AppError::validation(MSG_SIGNUP_EXPIRED));
        };

        let now = self.clock.now();
        if draft.is_expired(now) {
            // Reap on touch; never promote a stale draft.
            pending::delete_by_email(&self.pool, &email).await?;
            return Err(AppError::validation(MSG_SIGNUP_EXPIRED));
        }

        let mut tx = self.pool.begin().await?;

        let company = companies::create(
            &mut *tx,
            Uuid::now_v7(),
            &draft.company_name,
            &draft.company_email,
            draft.company_phone.as_deref(),
            draft.company_abn.as_deref(),
            SubscriptionTier::Free,
            now + Duration::days(TRIAL_PERIOD_DAYS),
        )
        .await
        .map_err(conflict_on_unique("A company with this email"))?;

        let identity = identities::create(
            &mut *tx,
            Uuid::now_v7(),
            company.id,
            &draft.email,
            &draft.password_hash,
            &draft.first_name,
            &draft.last_name,
            draft.phone.as_deref(),
            Role::Admin,
            Some(now),
        )
        .await
        .map_err(conflict_on_unique("An account with this email"))?;

        pending::delete_by_email(&mut *tx, &email).await?;

        tx.commit().await?;

        tracing::info!(user_id = %identity.id, company_id = %company.id, "signup completed");

        self.mailer
            .send(email::welcome_email(&identity.email, &identity.first_name, &company.name));

        self.issue_session(identity, meta).await
    }

    /// Reissue the verification OTP for a still-active draft. An expired
    /// draft is reaped on touch, same as promotion.
    pub async fn resend_verification(&self, email: &str) -> AppResult<()> {
        let email = normalize_email(email);

        match pending::find_by_email(&self.pool, &email).await? {
            Some(draft) if !draft.is_expired(self.clock.now()) => {
                self.otp.resend(&email, OtpPurpose::EmailVerification).await?;
                Ok(())
            }
            Some(_) => {
                pending::delete_by_email(&self.pool, &email).await?;
                Err(AppError::validation(MSG_SIGNUP_EXPIRED))
            }
            None => Err(AppError::validation(MSG_SIGNUP_EXPIRED)),
        }
    }

    // ── Sessions ──────────────────────────────────────────────────────────

    /// Authenticate with email + password. "No such user" and "wrong
    /// password" both map to the same invalid-credentials failure; an
    /// inactive company is reported distinctly.
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
        meta: SessionMeta,
    ) -> AppResult<AuthenticatedSession> {
        let email = normalize_email(email);

        let Some((identity, company)) =
            identities::find_by_email_with_company(&self.pool, &email).await?
        else {
            return Err(AppError::InvalidCredentials);
        };

        if !identity.active {
            return Err(AppError::InvalidCredentials);
        }
        if !company.active {
            return Err(AppError::CompanyInactive);
        }

        if !tokens::verify_password(password, &identity.password_hash)? {
            return Err(AppError::InvalidCredentials);
        }

        tracing::info!(user_id = %identity.id, "user signed in");
        self.issue_session(identity, meta).await
    }

    /// Exchange a refresh token for a new access token. The refresh token is
    /// not rotated: the same token stays valid until its own expiry or
    /// explicit revocation. Both the JWT and the stored session must check out.
    pub async fn refresh_access_token(&self, raw_refresh_token: &str) -> AppResult<String> {
        let claims =
            tokens::verify_refresh_token(raw_refresh_token, &self.cfg.refresh_token_secret)?;
        let user_id = claims.user_id()?;

        let now = self.clock.now();
        let token_hash = tokens::hash_refresh_token(raw_refresh_token);
        let Some(session) =
            sessions::find_live_by_hash(&self.pool, &token_hash, user_id, now).await?
        else {
            // Syntactically valid but revoked/unknown — same generic failure.
            return Err(AppError::InvalidToken);
        };

        let identity = identities::find_by_id(&self.pool, user_id)
            .await?
            .filter(|i| i.active)
            .ok_or(AppError::InvalidToken)?;

        sessions::touch_last_used(&self.pool, session.id, now).await?;

        tokens::sign_access_token(
            identity.id,
            &identity.email,
            identity.role,
            identity.company_id,
            &self.cfg.access_token_secret,
            self.cfg.access_token_ttl_secs as i64,
        )
    }

    /// Revoke the session matching this refresh token. Tolerant: an unknown
    /// or already-revoked token is a no-op, not an error.
    pub async fn sign_out(&self, raw_refresh_token: &str, user_id: Option<Uuid>) -> AppResult<()> {
        let token_hash = tokens::hash_refresh_token(raw_refresh_token);
        let revoked = sessions::revoke_by_hash(&self.pool, &token_hash, user_id).await?;
        if revoked > 0 {
            tracing::info!("session revoked on sign-out");
        }
        Ok(())
    }

    /// Revoke every session for the user.
    pub async fn sign_out_all(&self, user_id: Uuid) -> AppResult<u64> {
        let revoked = sessions::revoke_all(&self.pool, user_id).await?;
        tracing::info!(%user_id, revoked, "all sessions revoked");
        Ok(revoked)
    }

    // ── Admin & account management ────────────────────────────────────────

    /// Admin-invoked creation of a site manager, worker, or client account.
    /// Role and company checks for the *caller* belong to the authorization
    /// middleware; this only polices the draft itself.
    pub async fn create_user(
        &self,
        caller_company_id: Uuid,
        draft: CreateUserRequest,
    ) -> AppResult<Identity> {
        if draft.role == Role::Admin {
            return Err(AppError::validation(
                "Cannot create another admin account",
            ));
        }

        let email = normalize_email(&draft.email);
        let mut errors = Vec::new();
        if !validate_email_format(&email) {
            errors.push("Invalid email format".to_string());
        }
        errors.extend(validate_password_strength(&draft.password).errors);
        if !errors.is_empty() {
            return Err(AppError::Validation {
                message: "User validation failed".into(),
                errors,
            });
        }

        if identities::exists_by_email(&self.pool, &email).await? {
            return Err(AppError::Conflict {
                resource: "An account with this email".into(),
            });
        }

        let password_hash = tokens::hash_password(&draft.password)?;
        let now = self.clock.now();

        // The admin vouches for the address: created accounts are
        // email-verified from the start.
        let identity = identities::create(
            &self.pool,
            Uuid::now_v7(),
            caller_company_id,
            &email,
            &password_hash,
            &draft.first_name,
            &draft.last_name,
            draft.phone.as_deref(),
            draft.role,
            Some(now),
        )
        .await
        .map_err(conflict_on_unique("An account with this email"))?;

        tracing::info!(user_id = %identity.id, role = ?identity.role, "user created by admin");
        Ok(identity)
    }

    /// Issue a password-reset OTP if the email belongs to a real identity.
    /// The caller always gets the same neutral acknowledgment either way —
    /// no account enumeration.
    pub async fn request_password_reset(&self, email: &str) -> AppResult<()> {
        let email = normalize_email(email);
        if identities::find_by_email(&self.pool, &email).await?.is_some() {
            self.otp.create(&email, OtpPurpose::PasswordReset).await?;
        } else {
            tracing::debug!("password reset requested for unknown email");
        }
        Ok(())
    }

    /// Verify the reset OTP, set the new password, and revoke every session
    /// for the user — a password change invalidates all refresh tokens.
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let email = normalize_email(email);

        self.otp.verify(&email, code, OtpPurpose::PasswordReset).await?;

        let strength = validate_password_strength(new_password);
        if !strength.is_valid {
            return Err(AppError::Validation {
                message: "Password does not meet requirements".into(),
                errors: strength.errors,
            });
        }

        let identity = identities::find_by_email(&self.pool, &email)
            .await?
            .ok_or_else(|| AppError::validation("Unable to reset password"))?;

        let password_hash = tokens::hash_password(new_password)?;
        identities::update_password_hash(&self.pool, identity.id, &password_hash).await?;
        sessions::revoke_all(&self.pool, identity.id).await?;

        tracing::info!(user_id = %identity.id, "password reset, all sessions revoked");

        self.mailer.send(email::password_changed_email(&identity.email));
        Ok(())
    }

    pub async fn current_user(&self, user_id: Uuid) -> AppResult<Identity> {
        identities::find_by_id(&self.pool, user_id)
            .await?
            .ok_or(AppError::NotFound {
                resource: "User".into(),
            })
    }

    /// Periodic sweep: reap expired OTP challenges, refresh sessions, and
    /// pending registrations. Idempotent and safe alongside live traffic.
    pub async fn cleanup_expired(&self) -> AppResult<()> {
        let now = self.clock.now();
        self.otp.cleanup_expired().await?;
        sessions::delete_expired(&self.pool, now).await?;
        pending::delete_expired(&self.pool, now).await?;
        Ok(())
    }

    // ── Internals ─────────────────────────────────────────────────────────

    /// Mint the token pair, persist the hashed refresh session, and stamp
    /// last-login.
    async fn issue_session(
        &self,
        identity: Identity,
        meta: SessionMeta,
    ) -> AppResult<AuthenticatedSession> {
        let access_token = tokens::sign_access_token(
            identity.id,
            &identity.email,
            identity.role,
            identity.company_id,
            &self.cfg.access_token_secret,
            self.cfg.access_token_ttl_secs as i64,
        )?;
        let refresh_token = tokens::sign_refresh_token(
            identity.id,
            &identity.email,
            identity.role,
            identity.company_id,
            &self.cfg.refresh_token_secret,
            self.cfg.refresh_token_ttl_secs as i64,
        )?;

        let now = self.clock.now();
        sessions::store(
            &self.pool,
            Uuid::now_v7(),
            identity.id,
            &tokens::hash_refresh_token(&refresh_token),
            now + Duration::seconds(self.cfg.refresh_token_ttl_secs as i64),
            now,
            meta.ip.as_deref(),
            meta.user_agent.as_deref(),
        )
        .await?;

        identities::update_last_login(&self.pool, identity.id, now).await?;

        let mut user = identity;
        user.last_login_at = Some(now);

        Ok(AuthenticatedSession {
            user,
            access_token,
            refresh_token,
        })
    }
}

/// Translate a unique-constraint violation into the domain conflict it
/// actually means; everything else passes through.
fn conflict_on_unique(resource: &str) -> impl Fn(sqlx::Error) -> AppError + '_ {
    move |e| {
        if AppError::is_unique_violation(&e) {
            AppError::Conflict {
                resource: resource.to_string(),
            }
        } else {
            e.into()
        }
    }
}

/// First conflict for a signup's email pair; the personal email is reported
/// before the company email.
fn duplicate_email_conflict(email_taken: bool, company_email_taken: bool) -> Option<AppError> {
    if email_taken {
        return Some(AppError::Conflict {
            resource: "An account with this email".into(),
        });
    }
    if company_email_taken {
        return Some(AppError::Conflict {
            resource: "A company with this email".into(),
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_conflicts_cover_either_email() {
        assert!(duplicate_email_conflict(false, false).is_none());

        // A personal email taken by either an identity or a company conflicts
        let Some(AppError::Conflict { resource }) = duplicate_email_conflict(true, false) else {
            panic!("expected a conflict on the personal email");
        };
        assert_eq!(resource, "An account with this email");

        let Some(AppError::Conflict { resource }) = duplicate_email_conflict(false, true) else {
            panic!("expected a conflict on the company email");
        };
        assert_eq!(resource, "A company with this email");

        // Both taken: the personal email is reported first
        let Some(AppError::Conflict { resource }) = duplicate_email_conflict(true, true) else {
            panic!("expected a conflict");
        };
        assert_eq!(resource, "An account with this email");
    }
}
