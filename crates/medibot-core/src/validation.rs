//! Client-side checks run before any request is sent.
//!
//! A failed check is reported as `SessionError::Validation` carrying a
//! message ready for display.

use std::sync::LazyLock;

use regex::Regex;

use crate::auth::SessionError;
use crate::models::NewAccount;

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LENGTH: usize = 6;

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(EMAIL_PATTERN).expect("email pattern is valid"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Both sign-in fields must be filled in
pub fn require_credentials(email: &str, password: &str) -> Result<(), SessionError> {
    if email.trim().is_empty() || password.trim().is_empty() {
        return Err(SessionError::Validation(
            "Please enter both email and password".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_new_account(account: &NewAccount) -> Result<(), SessionError> {
    if account.name.trim().is_empty()
        || account.email.trim().is_empty()
        || account.password.trim().is_empty()
    {
        return Err(SessionError::Validation("Please fill in all fields".to_string()));
    }
    if !is_valid_email(account.email.trim()) {
        return Err(SessionError::Validation(
            "Please enter a valid email address".to_string(),
        ));
    }
    if account.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(SessionError::Validation(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Confirmation check for front ends that ask for the password twice
pub fn passwords_match(password: &str, confirmation: &str) -> Result<(), SessionError> {
    if password != confirmation {
        return Err(SessionError::Validation("Passwords do not match".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(email: &str, password: &str, name: &str) -> NewAccount {
        NewAccount {
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
            ..NewAccount::default()
        }
    }

    fn message(result: Result<(), SessionError>) -> String {
        result.expect_err("expected validation failure").to_string()
    }

    #[test]
    fn test_email_pattern_compiles() {
        assert!(Regex::new(EMAIL_PATTERN).is_ok());
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("first.last+tag@mail.example.org"));

        assert!(!is_valid_email(""));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("@b.com"));
        assert!(!is_valid_email("a@b.c"));
    }

    #[test]
    fn test_require_credentials() {
        assert!(require_credentials("a@b.com", "secret1").is_ok());
        assert_eq!(
            message(require_credentials("   ", "secret1")),
            "Please enter both email and password"
        );
        assert!(require_credentials("a@b.com", "").is_err());
    }

    #[test]
    fn test_validate_new_account() {
        assert!(validate_new_account(&account("a@b.com", "secret1", "Asha")).is_ok());
        assert_eq!(
            message(validate_new_account(&account("a@b.com", "secret1", " "))),
            "Please fill in all fields"
        );
        assert_eq!(
            message(validate_new_account(&account("not-an-email", "secret1", "Asha"))),
            "Please enter a valid email address"
        );
        assert_eq!(
            message(validate_new_account(&account("a@b.com", "12345", "Asha"))),
            "Password must be at least 6 characters long"
        );
    }

    #[test]
    fn test_passwords_match() {
        assert!(passwords_match("secret1", "secret1").is_ok());
        assert_eq!(message(passwords_match("secret1", "secret2")), "Passwords do not match");
    }
}
