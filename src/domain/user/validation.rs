//! User validation utilities

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use validator::ValidateEmail;

/// Errors that can occur during user validation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UserValidationError {
    #[error("{0} is required")]
    MissingField(String),

    #[error("{0} should not be empty")]
    EmptyField(String),

    #[error("{0} must be a string")]
    NotAString(String),

    #[error("email must be an email")]
    InvalidEmail,

    #[error("Invalid phone number format")]
    InvalidPhone,

    #[error("{0} must be a valid ISO 8601 date string")]
    InvalidDate(String),

    #[error("{0} must be a boolean value")]
    InvalidBoolean(String),
}

/// `(555) 555-5555` or `(555) 555 5555`
static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\(\d{3}\) \d{3}[-\s]\d{4}$").expect("phone pattern is a valid regex")
});

/// Validate that a required text field is not empty
pub fn validate_not_empty(field: &str, value: &str) -> Result<(), UserValidationError> {
    if value.is_empty() {
        return Err(UserValidationError::EmptyField(field.to_string()));
    }

    Ok(())
}

/// Validate an email address
///
/// Rules:
/// - Cannot be empty
/// - Must be a syntactically valid address
pub fn validate_email(email: &str) -> Result<(), UserValidationError> {
    validate_not_empty("email", email)?;

    if !email.validate_email() {
        return Err(UserValidationError::InvalidEmail);
    }

    Ok(())
}

/// Validate a phone number
///
/// Rules:
/// - Cannot be empty
/// - Must match `(XXX) XXX-XXXX`, with a space or hyphen as the last separator
pub fn validate_phone(phone: &str) -> Result<(), UserValidationError> {
    validate_not_empty("phone", phone)?;

    if !PHONE_PATTERN.is_match(phone) {
        return Err(UserValidationError::InvalidPhone);
    }

    Ok(())
}

/// Parse an ISO 8601 date (`YYYY-MM-DD`) or RFC 3339 date-time into UTC
pub fn parse_iso_date(field: &str, value: &str) -> Result<DateTime<Utc>, UserValidationError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| UserValidationError::InvalidDate(field.to_string()))
}

/// Parse a boolean the way query strings spell it
pub fn parse_bool(field: &str, value: &str) -> Result<bool, UserValidationError> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(UserValidationError::InvalidBoolean(field.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_validate_not_empty() {
        assert!(validate_not_empty("firstName", "Daniel").is_ok());
        assert_eq!(
            validate_not_empty("firstName", ""),
            Err(UserValidationError::EmptyField("firstName".to_string()))
        );
    }

    #[test]
    fn test_valid_emails() {
        assert!(validate_email("d@x.com").is_ok());
        assert!(validate_email("dalanis@nestjs.com").is_ok());
    }

    #[test]
    fn test_invalid_emails() {
        assert_eq!(validate_email("not-an-email"), Err(UserValidationError::InvalidEmail));
        assert_eq!(
            validate_email(""),
            Err(UserValidationError::EmptyField("email".to_string()))
        );
    }

    #[test]
    fn test_valid_phones() {
        assert!(validate_phone("(555) 555-5555").is_ok());
        assert!(validate_phone("(555) 555 5555").is_ok());
    }

    #[test]
    fn test_invalid_phones() {
        assert_eq!(validate_phone("555-555-5555"), Err(UserValidationError::InvalidPhone));
        assert_eq!(validate_phone("(555)555-5555"), Err(UserValidationError::InvalidPhone));
        assert_eq!(validate_phone("(555) 555-55555"), Err(UserValidationError::InvalidPhone));
    }

    #[test]
    fn test_parse_iso_date_plain_date() {
        let parsed = parse_iso_date("birthDate", "1990-01-01").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(1990, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_iso_date_with_offset() {
        let parsed = parse_iso_date("birthDate", "1990-01-01T02:00:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(1990, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_iso_date_invalid() {
        assert_eq!(
            parse_iso_date("birthDate", "01/01/1990"),
            Err(UserValidationError::InvalidDate("birthDate".to_string()))
        );
        assert!(parse_iso_date("birthDate", "1990-02-30").is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("isDeleted", "true"), Ok(true));
        assert_eq!(parse_bool("isDeleted", "0"), Ok(false));
        assert!(parse_bool("isDeleted", "yes").is_err());
    }
}
