//! # fechou-core
//!
//! Core domain model for the fechou sales dashboard generator.
//!
//! This crate provides:
//! - Input types: `ProposalBatch`, `ProposalInput`
//! - The derived row model (`DerivedRow`) and the deriver in [`derive`]
//! - Lenient value/date parsing in [`parse`]
//! - Precomputed rollups (KPIs, per-client, monthly, ranking) in [`rollup`]
//! - Report configuration in [`config`]
//! - Core traits: `Clock`, `Renderer`
//! - Error types
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use fechou_core::{derive_rows, FixedClock, ProposalBatch, ReportConfig};
//!
//! let batch = ProposalBatch::from_json(
//!     r#"{"proposals": [{"id": 1, "status": "vendida", "createdAt": "2024-03-01",
//!         "value": "1.234,56", "clientName": "ACME"}]}"#,
//! )
//! .unwrap();
//!
//! let clock = FixedClock(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
//! let rows = derive_rows(&batch.proposals, &ReportConfig::default(), &clock);
//!
//! assert_eq!(rows[0].channel, "Cartão");
//! assert!(rows[0].paid);
//! ```

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod config;
pub mod derive;
pub mod parse;
pub mod rollup;

pub use config::{LookupTables, ReportConfig, StatusLabels};
pub use derive::derive_rows;
pub use rollup::{ClientRollup, Kpis, MonthBucket, RankedClient, Rollup};

// ============================================================================
// Input
// ============================================================================

/// Top-level input document: `{"proposals": [...]}`
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ProposalBatch {
    /// Missing or `null` means no proposals
    #[serde(default, deserialize_with = "null_as_empty")]
    pub proposals: Vec<ProposalInput>,
}

impl ProposalBatch {
    /// Parse the input document. Blank input is treated as `{}`.
    pub fn from_json(text: &str) -> Result<Self, InputError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(text)?)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<ProposalInput>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ProposalInput>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One sales proposal as it arrives on the wire.
///
/// Fields are kept as raw JSON scalars: a field holding the wrong type must
/// fall back to its default during derivation instead of rejecting the whole
/// document.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalInput {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub created_at: Option<Value>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub client_name: Option<Value>,
    #[serde(default)]
    pub title: Option<Value>,
}

impl ProposalInput {
    /// Integer id; integral floats truncate, numeric strings parse, anything else is 0
    pub fn numeric_id(&self) -> i64 {
        match &self.id {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
                .unwrap_or(0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            Some(Value::Bool(b)) => i64::from(*b),
            _ => 0,
        }
    }

    pub fn status_text(&self) -> Option<String> {
        scalar_text(self.status.as_ref())
    }

    pub fn client_text(&self) -> Option<String> {
        scalar_text(self.client_name.as_ref())
    }

    pub fn title_text(&self) -> Option<String> {
        scalar_text(self.title.as_ref())
    }
}

/// Render a JSON scalar as text; `null`, arrays and objects have no text form
fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

// ============================================================================
// Derived rows
// ============================================================================

/// Normalized row written to the raw data sheet
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DerivedRow {
    pub date: NaiveDate,
    pub client_name: String,
    pub title: String,
    pub status: String,
    pub channel: String,
    /// Non-negative, two decimal places
    pub value: Decimal,
    pub paid: bool,
    pub seller: String,
    pub category: String,
    pub region: String,
}

impl DerivedRow {
    pub fn has_status(&self, status: &str) -> bool {
        self.status == status
    }

    /// Text shown in the "Pago?" column
    pub fn paid_label(&self) -> &'static str {
        if self.paid {
            "Sim"
        } else {
            "Não"
        }
    }

    pub fn in_month(&self, year: i32, month: u32) -> bool {
        self.date.year() == year && self.date.month() == month
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Source of "today" for date fallbacks and trailing month windows
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

/// Wall-clock time in the local timezone
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// Clock pinned to a single date
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Output rendering
pub trait Renderer {
    type Output;

    /// Render the derived rows to the output format
    fn render(&self, rows: &[DerivedRow]) -> Result<Self::Output, RenderError>;
}

// ============================================================================
// Errors
// ============================================================================

/// Input document error
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),
}

/// Field-level parse error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Not a numeric value: {0:?}")]
    Value(String),

    #[error("Amount out of range: {0:?}")]
    OutOfRange(String),

    #[error("Not an ISO-8601 date: {0:?}")]
    Date(String),
}

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Lookup table '{0}' must not be empty")]
    EmptyTable(&'static str),

    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Rendering error
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Format error: {0}")]
    Format(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_proposals_key_is_empty() {
        let batch = ProposalBatch::from_json("{}").unwrap();
        assert!(batch.proposals.is_empty());
    }

    #[test]
    fn null_proposals_is_empty() {
        let batch = ProposalBatch::from_json(r#"{"proposals": null}"#).unwrap();
        assert!(batch.proposals.is_empty());
    }

    #[test]
    fn blank_input_is_empty() {
        let batch = ProposalBatch::from_json("  \n").unwrap();
        assert!(batch.proposals.is_empty());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let result = ProposalBatch::from_json("{\"proposals\": [");
        assert!(matches!(result, Err(InputError::Json(_))));
    }

    #[test]
    fn wrongly_typed_fields_still_deserialize() {
        let batch = ProposalBatch::from_json(
            r#"{"proposals": [{"id": "7", "status": 3, "value": {"x": 1}, "title": null}]}"#,
        )
        .unwrap();
        let p = &batch.proposals[0];
        assert_eq!(p.numeric_id(), 7);
        assert_eq!(p.status_text().as_deref(), Some("3"));
        assert_eq!(p.title_text(), None);
    }

    #[test]
    fn numeric_id_variants() {
        let with_id = |v: Value| ProposalInput {
            id: Some(v),
            ..Default::default()
        };
        assert_eq!(with_id(serde_json::json!(5)).numeric_id(), 5);
        assert_eq!(with_id(serde_json::json!(5.9)).numeric_id(), 5);
        assert_eq!(with_id(serde_json::json!(" 12 ")).numeric_id(), 12);
        assert_eq!(with_id(serde_json::json!("abc")).numeric_id(), 0);
        assert_eq!(with_id(serde_json::json!(true)).numeric_id(), 1);
        assert_eq!(ProposalInput::default().numeric_id(), 0);
    }

    #[test]
    fn fixed_clock_returns_pinned_date() {
        let date = NaiveDate::from_ymd_opt(2025, 2, 28).unwrap();
        assert_eq!(FixedClock(date).today(), date);
    }

    #[test]
    fn paid_label_follows_flag() {
        let mut row = DerivedRow {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            client_name: String::new(),
            title: String::new(),
            status: "vendida".into(),
            channel: "Pix".into(),
            value: Decimal::ZERO,
            paid: true,
            seller: String::new(),
            category: String::new(),
            region: String::new(),
        };
        assert_eq!(row.paid_label(), "Sim");
        row.paid = false;
        assert_eq!(row.paid_label(), "Não");
        assert!(row.in_month(2024, 1));
        assert!(!row.in_month(2024, 2));
    }
}
