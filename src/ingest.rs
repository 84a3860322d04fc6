//! Parser for the device's line-oriented telemetry records.
//!
//! The serial feed emits one record per line:
//!
//! ```text
//! date:2024-01-01 00-00-05; flow:3.2; temperature:18.5; turbidity:80.1
//! ```
//!
//! Fields are `;`-separated `label:value` pairs in fixed order. Anything
//! that deviates is a [`ParseError`]; nothing is coerced.

use chrono::NaiveDateTime;

use crate::error::ParseError;
use crate::models::Reading;

// ---

/// Timestamp layout used by the device (dashes in the time part).
pub const DEVICE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H-%M-%S";

const LABELS: [&str; 4] = ["date", "flow", "temperature", "turbidity"];

/// Parse one device record into a [`Reading`].
///
/// Trailing whitespace and line terminators are ignored. The field labels
/// must appear in the order `date`, `flow`, `temperature`, `turbidity`.
pub fn parse_record(line: &str) -> Result<Reading, ParseError> {
    // ---
    let parts: Vec<&str> = line.trim().split(';').collect();
    if parts.len() != LABELS.len() {
        return Err(ParseError::FieldCount {
            expected: LABELS.len(),
            found: parts.len(),
        });
    }

    let mut values = [""; 4];
    for (index, (part, expected)) in parts.iter().zip(LABELS).enumerate() {
        let (label, value) = part
            .split_once(':')
            .ok_or_else(|| ParseError::MissingSeparator {
                index,
                field: part.trim().to_string(),
            })?;

        let label = label.trim();
        if !label.eq_ignore_ascii_case(expected) {
            return Err(ParseError::UnexpectedLabel {
                index,
                expected,
                found: label.to_string(),
            });
        }
        values[index] = value.trim();
    }

    let timestamp = NaiveDateTime::parse_from_str(values[0], DEVICE_TIMESTAMP_FORMAT)
        .map_err(|_| ParseError::InvalidTimestamp(values[0].to_string()))?;

    Ok(Reading {
        timestamp,
        flow_rate: parse_number("flow", values[1])?,
        temperature: parse_number("temperature", values[2])?,
        purity: parse_number("turbidity", values[3])?,
    })
}

fn parse_number(label: &'static str, value: &str) -> Result<f64, ParseError> {
    // ---
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::InvalidNumber {
            label,
            value: value.to_string(),
        })
}
