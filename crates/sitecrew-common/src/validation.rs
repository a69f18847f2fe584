//! Input validation utilities.
//!
//! Request DTOs use `validator` derives; password strength and email format
//! have bespoke checks because every violated password rule must be reported,
//! not just the first.

use std::sync::LazyLock;

use validator::Validate;

use crate::error::AppError;

/// Validate a request body, returning an AppError::Validation on failure.
pub fn validate_request<T: Validate>(body: &T) -> Result<(), AppError> {
    body.validate().map_err(|e| AppError::Validation {
        message: "Invalid request".into(),
        errors: collect_validation_errors(e),
    })
}

fn collect_validation_errors(errors: validator::ValidationErrors) -> Vec<String> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for '{field}'"))
            })
        })
        .collect()
}

/// Outcome of a password-strength check. Every violated rule is listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordStrength {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

const PASSWORD_SYMBOLS: &str = r##"!@#$%^&*()_+-=[]{};':"\|,.<>/?~`"##;

/// Check a password against the platform policy: at least 8 characters with
/// an uppercase letter, a lowercase letter, a digit, and a symbol.
pub fn validate_password_strength(password: &str) -> PasswordStrength {
    let mut errors = Vec::new();

    if password.chars().count() < 8 {
        errors.push("Password must be at least 8 characters long".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("Password must contain at least one uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("Password must contain at least one lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password must contain at least one number".to_string());
    }
    if !password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)) {
        errors.push("Password must contain at least one special character".to_string());
    }

    PasswordStrength {
        is_valid: errors.is_empty(),
        errors,
    }
}

static EMAIL_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap()
});

/// Conservative RFC-like email check: local@domain.tld with a TLD of at
/// least two letters.
pub fn validate_email_format(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// Canonical form used for storage and lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_password_passes() {
        let result = validate_password_strength("Password123!");
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn weak_password_reports_every_missing_class() {
        // lowercase only: missing uppercase, digit, and symbol
        let result = validate_password_strength("password");
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 3);
    }

    #[test]
    fn short_password_reports_length_and_classes() {
        let result = validate_password_strength("aB1");
        assert!(!result.is_valid);
        // too short + missing symbol
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn each_missing_class_is_reported_individually() {
        assert_eq!(validate_password_strength("nouppercase1!").errors.len(), 1);
        assert_eq!(validate_password_strength("NOLOWERCASE1!").errors.len(), 1);
        assert_eq!(validate_password_strength("NoDigitsHere!").errors.len(), 1);
        assert_eq!(validate_password_strength("NoSymbols123").errors.len(), 1);
    }

    #[test]
    fn email_format_accepts_plain_addresses() {
        assert!(validate_email_format("a@x.com"));
        assert!(validate_email_format("first.last+tag@sub.domain.co"));
    }

    #[test]
    fn email_format_rejects_malformed_addresses() {
        assert!(!validate_email_format("not-an-email"));
        assert!(!validate_email_format("missing@tld"));
        assert!(!validate_email_format("@no-local.com"));
        assert!(!validate_email_format("one@letter.c"));
        assert!(!validate_email_format("spaces in@local.com"));
    }

    #[test]
    fn normalize_email_lowercases_and_trims() {
        assert_eq!(normalize_email("  Foreman@Site.COM "), "foreman@site.com");
    }
}
