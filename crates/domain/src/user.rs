//! Account credential rules.

use ecclesia_core::{AppError, AppResult};

/// Maximum stored email length.
pub const EMAIL_MAX_LENGTH: usize = 254;

/// Minimum password length for staff-created accounts.
pub const PASSWORD_MIN_LENGTH: usize = 8;

/// Maximum password length; bounds Argon2 work per login attempt.
pub const PASSWORD_MAX_LENGTH: usize = 128;

/// Lower-cased, structurally valid email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Normalises and validates an email address.
    pub fn new(value: impl AsRef<str>) -> AppResult<Self> {
        let normalized = value.as_ref().trim().to_lowercase();

        if normalized.is_empty() {
            return Err(AppError::Validation(
                "email address must not be empty".to_owned(),
            ));
        }

        if normalized.len() > EMAIL_MAX_LENGTH {
            return Err(AppError::Validation(format!(
                "email address must not exceed {EMAIL_MAX_LENGTH} characters"
            )));
        }

        let Some((local, domain)) = normalized.split_once('@') else {
            return Err(AppError::Validation(
                "email address must contain '@'".to_owned(),
            ));
        };

        if local.is_empty() || domain.contains('@') {
            return Err(AppError::Validation(
                "email address must contain exactly one '@' after a non-empty local part"
                    .to_owned(),
            ));
        }

        if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
            return Err(AppError::Validation(
                "email domain must contain at least one inner '.'".to_owned(),
            ));
        }

        Ok(Self(normalized))
    }

    /// Returns the normalised address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

/// Validates a plaintext password before it is hashed.
pub fn validate_password(password: &str) -> AppResult<()> {
    let length = password.chars().count();

    if length < PASSWORD_MIN_LENGTH {
        return Err(AppError::Validation(format!(
            "password must be at least {PASSWORD_MIN_LENGTH} characters"
        )));
    }

    if length > PASSWORD_MAX_LENGTH {
        return Err(AppError::Validation(format!(
            "password must not exceed {PASSWORD_MAX_LENGTH} characters"
        )));
    }

    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        return Err(AppError::Validation(
            "this password is too common".to_owned(),
        ));
    }

    Ok(())
}

static COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "12345678",
    "123456789",
    "1234567890",
    "qwerty123",
    "qwertyuiop",
    "iloveyou",
    "sunshine",
    "princess",
    "football",
    "baseball",
    "welcome1",
    "letmein1",
    "passw0rd",
    "trustno1",
    "blessed1",
    "jesus123",
    "church123",
];

#[cfg(test)]
mod tests {
    use super::{EmailAddress, PASSWORD_MAX_LENGTH, validate_password};

    #[test]
    fn email_is_trimmed_and_lowercased() {
        let email = EmailAddress::new("  Grace@Example.ORG ");
        assert_eq!(
            email.map(String::from).unwrap_or_default(),
            "grace@example.org"
        );
    }

    #[test]
    fn malformed_emails_are_rejected() {
        assert!(EmailAddress::new("").is_err());
        assert!(EmailAddress::new("grace.example.org").is_err());
        assert!(EmailAddress::new("@example.org").is_err());
        assert!(EmailAddress::new("grace@example").is_err());
        assert!(EmailAddress::new("grace@a@example.org").is_err());
        assert!(EmailAddress::new("grace@example.").is_err());
    }

    #[test]
    fn password_length_bounds_are_enforced() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("correct horse").is_ok());
        assert!(validate_password(&"a".repeat(PASSWORD_MAX_LENGTH)).is_ok());
        assert!(validate_password(&"a".repeat(PASSWORD_MAX_LENGTH + 1)).is_err());
    }

    #[test]
    fn common_passwords_are_rejected_case_insensitively() {
        assert!(validate_password("Password123").is_err());
        assert!(validate_password("Blessed1").is_err());
    }
}
