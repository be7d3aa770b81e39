//! Field validators, usable directly or through `#[validate(custom(function = ...))]`.

use chrono::NaiveDate;
use uuid::Uuid;
use validator::ValidationError;

fn error(code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

pub fn validate_uuid(value: &str) -> Result<(), ValidationError> {
    Uuid::parse_str(value)
        .map(|_| ())
        .map_err(|_| error("uuid", format!("'{value}' is not a valid UUID")))
}

pub fn validate_non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(error("blank", "value must not be empty or whitespace".to_string()));
    }
    Ok(())
}

/// `YYYY-MM-DD`, or any timestamp [`crate::time::Time`] accepts.
pub fn validate_date(value: &str) -> Result<(), ValidationError> {
    if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok() || crate::time::Time::parse(value).is_ok() {
        return Ok(());
    }
    Err(error("date", format!("'{value}' is not a valid date")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("6b724908-ef14-45cf-84f8-768b5384da45").is_ok());
        assert!(validate_uuid("not-a-uuid").is_err());
        assert!(validate_uuid("").is_err());
    }

    #[test]
    fn test_validate_non_blank() {
        assert!(validate_non_blank("demo").is_ok());
        assert!(validate_non_blank("   ").is_err());
    }

    #[test]
    fn test_validate_date() {
        assert!(validate_date("2024-02-29").is_ok());
        assert!(validate_date("2024-02-30").is_err());
        assert!(validate_date("2024-01-01T00:00:00Z").is_ok());
        assert!(validate_date("soon").is_err());
    }
}
