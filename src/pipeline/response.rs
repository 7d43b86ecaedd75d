//! Response parsing: provider text → typed [`ExtractionResult`].
//!
//! The prompt forbids code fences, and this module does not strip them: a
//! fenced answer fails as [`MalformedKind::InvalidJson`] with the raw text
//! attached, so contract violations stay visible instead of being papered over.

use crate::error::{ExtractError, MalformedKind};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

static CANONICAL_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}/(0[1-9]|1[0-2])/(0[1-9]|[12]\d|3[01])$").unwrap());

/// The four fields extracted from an invoice or purchase order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Name of the buyer.
    pub receiver_name: String,
    /// Name of the seller.
    pub supplier_name: String,
    /// Invoice total as a plain number.
    pub invoice_total: f64,
    /// Transaction date, requested as `YYYY/MM/DD`.
    pub invoice_date: String,
}

impl ExtractionResult {
    /// Whether `invoice_date` has the `YYYY/MM/DD` shape the prompt asks for.
    pub fn has_canonical_date(&self) -> bool {
        CANONICAL_DATE.is_match(&self.invoice_date)
    }
}

/// Parse the provider's completion text.
pub fn parse_response(text: &str) -> Result<ExtractionResult, ExtractError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ExtractError::MalformedResponse {
            kind: MalformedKind::InvalidJson,
            detail: e.to_string(),
            raw: text.to_string(),
        })?;

    // Derived struct deserialisation also accepts positional arrays.
    if !value.is_object() {
        return Err(ExtractError::MalformedResponse {
            kind: MalformedKind::SchemaMismatch,
            detail: format!("expected a JSON object, got {}", json_kind(&value)),
            raw: text.to_string(),
        });
    }

    let result: ExtractionResult =
        serde_json::from_value(value).map_err(|e| ExtractError::MalformedResponse {
            kind: MalformedKind::SchemaMismatch,
            detail: e.to_string(),
            raw: text.to_string(),
        })?;

    if !result.has_canonical_date() {
        warn!(
            "invoice_date {:?} is not in YYYY/MM/DD form; returning it unchanged",
            result.invoice_date
        );
    }

    Ok(result)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
