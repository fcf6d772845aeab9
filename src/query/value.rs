// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Value type detection.
//!
//! Kubernetes documents carry no schema, so the type of a field is decided
//! per comparison from its text. The same detector is used for condition
//! literals and for values pulled out of documents.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

/// Semantic kind of a textual value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    Boolean,
    Number,
    Time,
    String,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::Time => "time",
            ValueKind::String => "string",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value coerced to the first type it parses as
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Boolean(bool),
    Number(f64),
    Time(DateTime<FixedOffset>),
    Text(String),
}

impl TypedValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            TypedValue::Boolean(_) => ValueKind::Boolean,
            TypedValue::Number(_) => ValueKind::Number,
            TypedValue::Time(_) => ValueKind::Time,
            TypedValue::Text(_) => ValueKind::String,
        }
    }
}

impl Default for TypedValue {
    fn default() -> Self {
        TypedValue::Text(String::new())
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Boolean(b) => write!(f, "{}", b),
            TypedValue::Number(n) => write!(f, "{}", n),
            TypedValue::Time(t) => write!(f, "{}", t.to_rfc3339()),
            TypedValue::Text(s) => f.write_str(s),
        }
    }
}

/// Detect the type of a textual value.
///
/// Tried in order, first success wins: boolean, number, time, string.
pub fn detect_type(value: &str) -> TypedValue {
    if let Some(b) = parse_bool(value) {
        return TypedValue::Boolean(b);
    }
    if let Some(n) = parse_number(value) {
        return TypedValue::Number(n);
    }
    if let Some(t) = parse_time(value) {
        return TypedValue::Time(t);
    }
    TypedValue::Text(value.to_string())
}

/// Parse `true` / `false`, ignoring case
pub fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Parse an integer or float. Non-finite results (`inf`, `NaN`) are rejected.
pub fn parse_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse a timestamp using the supported layouts, first match wins:
///
/// - RFC3339 (`2024-12-05T14:11:44Z`)
/// - date only (`2024-12-05`), midnight UTC
/// - date and time (`2024-12-05 14:11:44`), UTC
/// - date, time, offset and zone name (`2024-12-05 14:11:44 +0000 UTC`)
pub fn parse_time(value: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Some(t);
    }
    if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(d.and_time(NaiveTime::MIN).and_utc().fixed_offset());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().fixed_offset());
    }
    parse_time_with_zone(value)
}

/// `2024-12-05 14:11:44 +0000 UTC`: the zone abbreviation must be present but
/// only the numeric offset is used.
fn parse_time_with_zone(value: &str) -> Option<DateTime<FixedOffset>> {
    let (rest, zone) = value.rsplit_once(' ')?;
    if zone.is_empty() || !zone.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    DateTime::parse_from_str(rest, "%Y-%m-%d %H:%M:%S %z").ok()
}
