use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::ApiError;

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static email regex");
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Unwraps a required body field, `400 <name> is required` otherwise.
pub fn required<T>(value: Option<T>, name: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::bad_request(format!("{name} is required")))
}

/// Like [`required`] but also rejects blank strings.
pub fn required_str(value: Option<String>, name: &str) -> Result<String, ApiError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::bad_request(format!("{name} is required"))),
    }
}

/// Optional update field: blank strings mean "leave unchanged".
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn check_status(status: i16, max: i16) -> Result<i16, ApiError> {
    if (0..=max).contains(&status) {
        Ok(status)
    } else {
        Err(ApiError::bad_request(format!(
            "status must be between 0 and {max}"
        )))
    }
}

pub fn check_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn check_email(email: &str) -> Result<(), ApiError> {
    if !is_valid_email(email) {
        return Err(ApiError::bad_request("Invalid email"));
    }
    Ok(())
}

pub fn check_non_negative(value: Decimal, name: &str) -> Result<Decimal, ApiError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ApiError::bad_request(format!("{name} must not be negative")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("admin@sunshare.io"));
        assert!(!is_valid_email("admin@sunshare"));
        assert!(!is_valid_email("not an email"));
        assert_eq!(normalize_email("  Admin@SunShare.IO "), "admin@sunshare.io");
    }

    #[test]
    fn blank_update_fields_are_dropped() {
        assert_eq!(non_blank(Some("   ".into())), None);
        assert_eq!(non_blank(Some("".into())), None);
        assert_eq!(non_blank(Some(" Asha ".into())), Some("Asha".into()));
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn required_str_rejects_blank() {
        assert!(required_str(Some("  ".into()), "name").is_err());
        assert!(required_str(None, "name").is_err());
        assert_eq!(required_str(Some(" Solar ".into()), "name").unwrap(), "Solar");
    }

    #[test]
    fn required_names_the_field() {
        let err = required::<i32>(None, "offtaker_id").unwrap_err();
        assert_eq!(err.to_string(), "offtaker_id is required");
    }

    #[test]
    fn status_range() {
        assert!(check_status(0, 1).is_ok());
        assert!(check_status(1, 1).is_ok());
        assert!(check_status(2, 1).is_err());
        assert!(check_status(-1, 3).is_err());
        assert!(check_status(3, 3).is_ok());
    }

    #[test]
    fn negative_amounts_rejected() {
        assert!(check_non_negative(Decimal::new(-1, 0), "amount").is_err());
        assert!(check_non_negative(Decimal::ZERO, "amount").is_ok());
        assert!(check_non_negative(Decimal::new(1250, 2), "amount").is_ok());
    }
}
