use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ApiError;

const MIN_PASSWORD_LEN: usize = 8;
const PASSWORD_SYMBOLS: &str = "@$!%*#?&";

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(ApiError::Validation("Invalid email".into()))
    }
}

/// Minimum password policy: at least 8 characters with at least one
/// letter, one digit and one symbol from the fixed punctuation set.
pub fn validate_password(password: &str) -> Result<(), ApiError> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LEN;
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| PASSWORD_SYMBOLS.contains(c));

    if long_enough && has_letter && has_digit && has_symbol {
        Ok(())
    } else {
        Err(ApiError::Validation(
            "Password must contain at least 8 characters, one letter, \
             one digit, and one special character."
                .into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_policy_compliant_password() {
        assert!(validate_password("Passw0rd!").is_ok());
        assert!(validate_password("a1@aaaaa").is_ok());
    }

    #[test]
    fn rejects_short_passwords() {
        assert!(validate_password("a1@a").is_err());
    }

    #[test]
    fn rejects_missing_digit() {
        assert!(validate_password("Password!").is_err());
    }

    #[test]
    fn rejects_missing_symbol() {
        assert!(validate_password("Passw0rd1").is_err());
    }

    #[test]
    fn rejects_missing_letter() {
        assert!(validate_password("12345678!").is_err());
    }

    #[test]
    fn email_shapes() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("missing@tld").is_err());
        assert!(validate_email("spaces in@mail.com").is_err());
    }
}
