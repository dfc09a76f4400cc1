//! Parse-and-validate step between loosely typed payloads and the numeric
//! domain. Numbers and numeric strings are accepted; anything else is a
//! validation error carrying the offending field.

use chrono::{DateTime, Utc};
use serde_json::{json, Value as JsonValue};

use crate::error::{AppError, AppResult};

pub fn coerce_number(field: &str, value: &JsonValue) -> AppResult<f64> {
    let parsed = match value {
        JsonValue::Number(number) => number.as_f64(),
        JsonValue::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        _ => None,
    };

    parsed.ok_or_else(|| {
        AppError::validation_with_details(
            format!("{field} must be a number"),
            json!({ "field": field, "value": value }),
        )
    })
}

/// Missing or `null` falls back to `default`.
pub fn coerce_optional_number(
    field: &str,
    value: Option<&JsonValue>,
    default: f64,
) -> AppResult<f64> {
    match value {
        None | Some(JsonValue::Null) => Ok(default),
        Some(value) => coerce_number(field, value),
    }
}

pub fn parse_event_time(field: &str, raw: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| {
            AppError::validation_with_details(
                format!("{field} must be an RFC 3339 timestamp"),
                json!({ "field": field, "value": raw, "reason": err.to_string() }),
            )
        })
}
