use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::bail;
use crate::error::{ErrorKind, SinkResult};

/// Parses an ISO-8601 timestamp.
///
/// Accepts RFC 3339 with a `Z` suffix or a numeric offset. A timestamp without offset is
/// interpreted as UTC.
pub fn parse_iso_timestamp(value: &str) -> SinkResult<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))?;

    Ok(naive.and_utc())
}

/// Converts a Unix epoch in seconds into a timestamp.
///
/// Accepts integers, floats with fractional seconds and numeric strings.
pub fn epoch_to_timestamp(value: &Value) -> SinkResult<DateTime<Utc>> {
    let seconds = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };

    let Some(seconds) = seconds else {
        bail!(
            ErrorKind::ConversionError,
            "Epoch timestamp is not numeric",
            format!("got `{value}`")
        );
    };

    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1_000_000_000.0).round() as u32;

    match DateTime::from_timestamp(whole as i64, nanos.min(999_999_999)) {
        Some(timestamp) => Ok(timestamp),
        None => bail!(
            ErrorKind::ConversionError,
            "Epoch timestamp is out of range",
            format!("got `{value}`")
        ),
    }
}
