//! Centralized error types for Sitecrew.
//!
//! Uses `thiserror` for ergonomic error definitions and provides HTTP-friendly
//! error variants that convert directly into the stable API error envelope:
//! `{"success": false, "error": CODE, "message": ..., "errors": [...]}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Core application error type used across all Sitecrew services.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // === Auth errors ===
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Company account is inactive")]
    CompanyInactive,

    // === Resource errors ===
    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("{resource} already exists")]
    Conflict { resource: String },

    // === Validation errors ===
    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<String>,
    },

    /// OTP engine rejections — the engine's message is surfaced verbatim.
    #[error("{0}")]
    OtpRejected(String),

    // === Configuration errors ===
    #[error("Configuration error: {0}")]
    Configuration(String),

    // === Infrastructure errors ===
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error envelope sent to clients.
#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<String>>,
}

impl AppError {
    /// Shorthand for a single-message validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            errors: Vec::new(),
        }
    }

    /// Map error to HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials
            | Self::TokenExpired
            | Self::InvalidToken
            | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::CompanyInactive => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Validation { .. } | Self::OtpRejected(_) => StatusCode::BAD_REQUEST,
            Self::Configuration(_) | Self::Database(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Error code string for programmatic handling by clients.
    pub fn error_code(&self) -> &str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::CompanyInactive => "COMPANY_INACTIVE",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "ALREADY_EXISTS",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::OtpRejected(_) => "OTP_REJECTED",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True when a database write failed on a unique constraint. The
    /// constraint is the authoritative duplicate-email guard; service-level
    /// existence checks are only a fast path.
    pub fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(
            err,
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't leak internal details to clients
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                "An internal error occurred".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e}");
                "An internal error occurred".to_string()
            }
            AppError::Configuration(e) => {
                tracing::error!("Configuration error: {e}");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let errors = match &self {
            AppError::Validation { errors, .. } if !errors.is_empty() => Some(errors.clone()),
            _ => None,
        };

        let body = ErrorBody {
            success: false,
            error: self.error_code().to_string(),
            message,
            errors,
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results using AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            AppError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::CompanyInactive.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Conflict {
                resource: "Email".into()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::OtpRejected("OTP has expired".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Configuration("missing secret".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_errors_enumerate_fields() {
        let err = AppError::Validation {
            message: "Password does not meet requirements".into(),
            errors: vec!["missing uppercase".into(), "missing digit".into()],
        };
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
