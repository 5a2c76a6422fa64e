//! Field-level validators for event payloads.
//!
//! Everything here is pure: no I/O, no clock. Each failure names the
//! offending field so the HTTP layer can report it back to the client.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::models::event::EventStatus;

/// Accepted shapes for a local (offset-less) date-time.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Accepted shapes for a date-time carrying a UTC offset, colon optional.
const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M%:z",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: Option<String>,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// A failure that cannot be pinned to a single field (malformed body, empty patch).
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }
}

/// Configurable bounds for event fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationLimits {
    pub max_title_length: usize,
    pub max_description_length: usize,
    pub max_location_length: usize,
    pub max_organizer_length: usize,
    pub min_capacity: i64,
    pub max_capacity: i64,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_title_length: 200,
            max_description_length: 1000,
            max_location_length: 200,
            max_organizer_length: 100,
            min_capacity: 1,
            max_capacity: 100_000,
        }
    }
}

/// Trims `value` and checks it is non-empty and at most `max_length` characters.
pub fn validate_non_empty_string(
    field: &str,
    value: &str,
    max_length: usize,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(
            field,
            "Field cannot be empty or contain only whitespace",
        ));
    }
    if trimmed.chars().count() > max_length {
        return Err(ValidationError::new(
            field,
            format!("Field exceeds maximum length of {} characters", max_length),
        ));
    }
    Ok(trimmed.to_string())
}

/// Accepts an ISO-8601 date-time (offset optional, `Z` allowed) or a bare `YYYY-MM-DD`.
///
/// The value is returned untouched; callers persist exactly what the client sent.
/// Surrounding whitespace is therefore rejected rather than trimmed.
pub fn validate_date(field: &str, value: &str) -> Result<String, ValidationError> {
    if value != value.trim() {
        return Err(ValidationError::new(
            field,
            "Date must not contain leading or trailing whitespace",
        ));
    }
    if is_iso_datetime(value) || NaiveDate::parse_from_str(value, DATE_FORMAT).is_ok() {
        return Ok(value.to_string());
    }
    Err(ValidationError::new(
        field,
        "Date must be in ISO 8601 format (e.g., 2024-06-15 or 2024-06-15T09:00:00Z)",
    ))
}

fn is_iso_datetime(value: &str) -> bool {
    if DateTime::parse_from_rfc3339(value).is_ok() {
        return true;
    }
    let with_offset = match value.strip_suffix('Z') {
        Some(local) => format!("{}+00:00", local),
        None => value.to_string(),
    };
    if OFFSET_DATETIME_FORMATS
        .iter()
        .any(|format| DateTime::parse_from_str(&with_offset, format).is_ok())
    {
        return true;
    }
    NAIVE_DATETIME_FORMATS
        .iter()
        .any(|format| NaiveDateTime::parse_from_str(value, format).is_ok())
}

/// Inclusive range check.
pub fn validate_capacity(
    field: &str,
    value: i64,
    min: i64,
    max: i64,
) -> Result<i64, ValidationError> {
    if value < min {
        return Err(ValidationError::new(
            field,
            format!("Capacity must be at least {}", min),
        ));
    }
    if value > max {
        return Err(ValidationError::new(
            field,
            format!("Capacity cannot exceed {}", max),
        ));
    }
    Ok(value)
}

pub fn validate_status(
    field: &str,
    value: &str,
    allowed: &[EventStatus],
) -> Result<EventStatus, ValidationError> {
    allowed
        .iter()
        .copied()
        .find(|status| status.as_str() == value)
        .ok_or_else(|| {
            let names: Vec<&str> = allowed.iter().map(|s| s.as_str()).collect();
            ValidationError::new(
                field,
                format!("Status must be one of: {}", names.join(", ")),
            )
        })
}
