//! Lenient parsing of proposal values and dates
//!
//! Monetary values arrive in Brazilian locale format (`.` groups thousands,
//! `,` separates decimals). Dates arrive as ISO-8601-like strings. The strict
//! `parse_value` / `try_parse_date` report failures; the row deriver decides
//! what to substitute.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::ParseError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Largest accepted amount in either direction. Any number of rows at this
/// bound still sums well inside `Decimal`'s range.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000_000;

const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%:z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a locale-formatted amount such as `"1.234,56"`.
///
/// `None` and blank strings are zero. Every `.` is dropped and `,` becomes the
/// decimal point before parsing. Amounts beyond [`MAX_AMOUNT`] are rejected.
pub fn parse_value(raw: Option<&str>) -> Result<Decimal, ParseError> {
    let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(Decimal::ZERO);
    };

    let cleaned = text.replace('.', "").replace(',', ".");
    let value = parse_decimal(&cleaned).ok_or_else(|| ParseError::Value(text.to_string()))?;
    bounded(value, text)
}

/// Parse the raw JSON `value` field.
///
/// JSON numbers are already plain numbers and skip the separator rewrite.
pub fn parse_value_field(raw: Option<&Value>) -> Result<Decimal, ParseError> {
    match raw {
        None | Some(Value::Null) => Ok(Decimal::ZERO),
        Some(Value::String(s)) => parse_value(Some(s.as_str())),
        Some(Value::Number(n)) => {
            let text = n.to_string();
            match parse_decimal(&text) {
                Some(value) => bounded(value, &text),
                None => Err(ParseError::Value(text)),
            }
        }
        Some(other) => Err(ParseError::Value(other.to_string())),
    }
}

fn bounded(value: Decimal, text: &str) -> Result<Decimal, ParseError> {
    if value.abs() > Decimal::from(MAX_AMOUNT) {
        return Err(ParseError::OutOfRange(text.to_string()));
    }
    Ok(value)
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// A date field before normalization
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawDate<'a> {
    /// Already a calendar date
    Native(NaiveDate),
    Text(&'a str),
    Missing,
}

impl From<NaiveDate> for RawDate<'_> {
    fn from(date: NaiveDate) -> Self {
        RawDate::Native(date)
    }
}

impl<'a> From<&'a str> for RawDate<'a> {
    fn from(text: &'a str) -> Self {
        RawDate::Text(text)
    }
}

impl<'a> From<Option<&'a Value>> for RawDate<'a> {
    fn from(value: Option<&'a Value>) -> Self {
        match value {
            Some(Value::String(s)) => RawDate::Text(s.as_str()),
            _ => RawDate::Missing,
        }
    }
}

/// Parse an ISO-8601-like date or date-time string.
///
/// A trailing `Z` is read as `+00:00`. Date-times with an offset keep the
/// calendar date written in the string.
pub fn try_parse_date(raw: &str) -> Result<NaiveDate, ParseError> {
    let text = raw.trim();
    let normalized = match text.strip_suffix('Z').or_else(|| text.strip_suffix('z')) {
        Some(head) => format!("{head}+00:00"),
        None => text.to_string(),
    };

    if let Ok(date) = NaiveDate::parse_from_str(&normalized, DATE_FORMAT) {
        return Ok(date);
    }

    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(datetime) = DateTime::parse_from_str(&normalized, format) {
            return Ok(datetime.date_naive());
        }
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Ok(datetime.date());
        }
    }

    Err(ParseError::Date(text.to_string()))
}

/// Parse a date, falling back to `today` when it cannot be read
pub fn parse_date<'a>(raw: impl Into<RawDate<'a>>, today: NaiveDate) -> NaiveDate {
    match raw.into() {
        RawDate::Native(date) => date,
        RawDate::Text(text) => try_parse_date(text).unwrap_or(today),
        RawDate::Missing => today,
    }
}
