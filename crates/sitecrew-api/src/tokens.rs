//! Credential and token utilities — pure functions, no state.
//!
//! Password hashing uses Argon2id. Access and refresh JWTs are HS256 with
//! separate signing secrets and a `token_type` discriminator so one can never
//! stand in for the other. Refresh tokens are stored at rest only as SHA-256
//! digests; [`hash_refresh_token`] is the sole bridge between the raw token
//! and the session store's lookup key.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sitecrew_common::{
    error::{AppError, AppResult},
    models::identity::Role,
};
use uuid::Uuid;

/// Issuer claim stamped on every token this service signs.
pub const ISSUER: &str = "sitecrew";

const TOKEN_TYPE_ACCESS: &str = "access";
const TOKEN_TYPE_REFRESH: &str = "refresh";

/// JWT claims carried by both access and refresh tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Unique token id. `iat`/`exp` only have second granularity, so without
    /// this two tokens minted in the same second for the same user would be
    /// byte-identical and collide in the session store.
    pub jti: String,
    pub email: String,
    pub role: Role,
    pub company_id: Uuid,
    /// Issuer
    pub iss: String,
    /// Issued at
    pub iat: i64,
    /// Expiration
    pub exp: i64,
    /// Token type ("access" or "refresh")
    pub token_type: String,
}

impl Claims {
    pub fn user_id(&self) -> AppResult<Uuid> {
        self.sub.parse().map_err(|_| AppError::InvalidToken)
    }
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Verify a password against an Argon2id hash.
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("malformed password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn sign(
    user_id: Uuid,
    email: &str,
    role: Role,
    company_id: Uuid,
    secret: &str,
    ttl_secs: i64,
    token_type: &str,
) -> AppResult<String> {
    if secret.trim().is_empty() {
        return Err(AppError::Configuration(format!(
            "{token_type} token signing secret is not configured"
        )));
    }

    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        jti: Uuid::now_v7().to_string(),
        email: email.to_string(),
        role,
        company_id,
        iss: ISSUER.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl_secs)).timestamp(),
        token_type: token_type.to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("token signing failed: {e}")))
}

/// Generate a short-lived access token.
pub fn sign_access_token(
    user_id: Uuid,
    email: &str,
    role: Role,
    company_id: Uuid,
    secret: &str,
    ttl_secs: i64,
) -> AppResult<String> {
    sign(user_id, email, role, company_id, secret, ttl_secs, TOKEN_TYPE_ACCESS)
}

/// Generate a long-lived refresh token.
pub fn sign_refresh_token(
    user_id: Uuid,
    email: &str,
    role: Role,
    company_id: Uuid,
    secret: &str,
    ttl_secs: i64,
) -> AppResult<String> {
    sign(user_id, email, role, company_id, secret, ttl_secs, TOKEN_TYPE_REFRESH)
}

fn verify(token: &str, secret: &str, expected_type: &str) -> AppResult<Claims> {
    if secret.trim().is_empty() {
        return Err(AppError::Configuration(format!(
            "{expected_type} token signing secret is not configured"
        )));
    }

    let mut validation = Validation::default();
    validation.set_issuer(&[ISSUER]);

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })?;

    if data.claims.token_type != expected_type {
        return Err(AppError::InvalidToken);
    }

    Ok(data.claims)
}

/// Validate and decode an access token.
pub fn verify_access_token(token: &str, secret: &str) -> AppResult<Claims> {
    verify(token, secret, TOKEN_TYPE_ACCESS)
}

/// Validate and decode a refresh token.
pub fn verify_refresh_token(token: &str, secret: &str) -> AppResult<Claims> {
    verify(token, secret, TOKEN_TYPE_REFRESH)
}

/// Deterministic one-way digest of a raw refresh token — the session store's
/// lookup key. Raw tokens are never compared against stored values.
pub fn hash_refresh_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
/// Returns `None` for anything that is not exactly that shape.
pub fn extract_bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty() && !t.contains(char::is_whitespace))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-with-enough-entropy-0123456789";
    const OTHER_SECRET: &str = "a-different-secret-with-enough-entropy";

    fn ids() -> (Uuid, Uuid) {
        (Uuid::now_v7(), Uuid::now_v7())
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("Correct-Horse-9!").unwrap();
        assert_ne!(hash, "Correct-Horse-9!");
        assert!(verify_password("Correct-Horse-9!", &hash).unwrap());
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn access_token_round_trip() {
        let (user_id, company_id) = ids();
        let token = sign_access_token(
            user_id,
            "foreman@site.com",
            Role::SiteManager,
            company_id,
            SECRET,
            3600,
        )
        .unwrap();

        let claims = verify_access_token(&token, SECRET).unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.email, "foreman@site.com");
        assert_eq!(claims.role, Role::SiteManager);
        assert_eq!(claims.company_id, company_id);
        assert_eq!(claims.iss, ISSUER);
    }

    #[test]
    fn wrong_secret_is_invalid_token() {
        let (user_id, company_id) = ids();
        let token =
            sign_access_token(user_id, "a@x.com", Role::Admin, company_id, SECRET, 3600).unwrap();
        assert!(matches!(
            verify_access_token(&token, OTHER_SECRET),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let (user_id, company_id) = ids();
        // Past the default 60s leeway
        let token =
            sign_access_token(user_id, "a@x.com", Role::Admin, company_id, SECRET, -120).unwrap();
        assert!(matches!(
            verify_access_token(&token, SECRET),
            Err(AppError::TokenExpired)
        ));
    }

    #[test]
    fn refresh_token_cannot_pass_as_access_token() {
        let (user_id, company_id) = ids();
        let refresh =
            sign_refresh_token(user_id, "a@x.com", Role::Admin, company_id, SECRET, 3600).unwrap();
        assert!(matches!(
            verify_access_token(&refresh, SECRET),
            Err(AppError::InvalidToken)
        ));
        assert!(verify_refresh_token(&refresh, SECRET).is_ok());
    }

    #[test]
    fn empty_secret_is_a_configuration_error() {
        let (user_id, company_id) = ids();
        assert!(matches!(
            sign_access_token(user_id, "a@x.com", Role::Admin, company_id, "", 3600),
            Err(AppError::Configuration(_))
        ));
        assert!(matches!(
            verify_access_token("whatever", "  "),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn tokens_minted_together_are_distinct() {
        let (user_id, company_id) = ids();
        let a = sign_refresh_token(user_id, "a@x.com", Role::Admin, company_id, SECRET, 3600)
            .unwrap();
        let b = sign_refresh_token(user_id, "a@x.com", Role::Admin, company_id, SECRET, 3600)
            .unwrap();
        // Identical payload in the same second must still produce two tokens
        // that store under different session digests.
        assert_ne!(a, b);
        assert_ne!(hash_refresh_token(&a), hash_refresh_token(&b));
        assert_ne!(
            verify_refresh_token(&a, SECRET).unwrap().jti,
            verify_refresh_token(&b, SECRET).unwrap().jti
        );
    }

    #[test]
    fn refresh_token_digest_is_deterministic_and_one_way() {
        let (user_id, company_id) = ids();
        let raw =
            sign_refresh_token(user_id, "a@x.com", Role::Admin, company_id, SECRET, 3600).unwrap();
        let digest = hash_refresh_token(&raw);
        // sha256 hex
        assert_eq!(digest.len(), 64);
        assert_ne!(digest, raw);
        assert_eq!(digest, hash_refresh_token(&raw));
        assert_ne!(digest, hash_refresh_token("some-other-token"));
    }

    #[test]
    fn bearer_extraction_is_strict() {
        assert_eq!(extract_bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(extract_bearer_token("bearer abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Bearer abc def"), None);
        assert_eq!(extract_bearer_token("Token abc"), None);
    }
}
