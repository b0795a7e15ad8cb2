use chrono::NaiveDate;

use super::ApiError;
use crate::db::repositories::user::normalize_email;

const MAX_NAME_LEN: usize = 120;
const MAX_REASON_LEN: usize = 500;

/// Normalise and check an email address. Returns the lower-cased form.
pub fn validate_email(email: &str) -> Result<String, ApiError> {
    let email = normalize_email(email);
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::validation("Enter a valid email address"));
    }
    Ok(email)
}

pub fn validate_full_name(name: &str) -> Result<String, ApiError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Full name cannot be empty"));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::validation(format!(
            "Full name must be {MAX_NAME_LEN} characters or less"
        )));
    }
    Ok(trimmed.to_string())
}

pub fn validate_project_name(name: &str) -> Result<String, ApiError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Project name cannot be empty"));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::validation(format!(
            "Project name must be {MAX_NAME_LEN} characters or less"
        )));
    }
    Ok(trimmed.to_string())
}

pub fn validate_id(id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid ID: {id}. ID must be a positive integer"
        )));
    }
    Ok(id)
}

/// Parse an inclusive `YYYY-MM-DD` range; the end may not precede the start.
pub fn validate_date_range(start: &str, end: &str) -> Result<(NaiveDate, NaiveDate), ApiError> {
    let start = parse_date(start, "start_date")?;
    let end = parse_date(end, "end_date")?;
    if end < start {
        return Err(ApiError::validation("End date cannot be before start date"));
    }
    Ok((start, end))
}

pub fn validate_reason(reason: &str) -> Result<String, ApiError> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("A reason is required"));
    }
    if trimmed.chars().count() > MAX_REASON_LEN {
        return Err(ApiError::validation(format!(
            "Reason must be {MAX_REASON_LEN} characters or less"
        )));
    }
    Ok(trimmed.to_string())
}

fn parse_date(value: &str, field: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ApiError::validation(format!("Invalid {field}: expected a date as YYYY-MM-DD"))
    })
}
