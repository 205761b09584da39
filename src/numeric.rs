//! Locale-tolerant numeric coercion for the raw dataset fields.
//!
//! The exported spreadsheets mix JSON numbers with strings such as `"5,5"`,
//! `"50,6123"` or `"12 000"`. Everything numeric goes through [`parse_decimal`].

use serde::{Deserialize, Serialize};

/// A raw numeric field as it appears in the source JSON.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericField {
    Number(f64),
    Text(String),
    #[default]
    Missing,
    /// Anything else (booleans, arrays, objects). Always fails coercion.
    Other(serde_json::Value),
}

impl NumericField {
    /// Coerce to a finite float.
    ///
    /// `Ok(None)` means the field is absent (missing, null or blank).
    /// `Err(raw)` carries the offending text for diagnostics.
    pub fn coerce(&self) -> Result<Option<f64>, String> {
        match self {
            NumericField::Number(v) if v.is_finite() => Ok(Some(*v)),
            NumericField::Number(v) => Err(v.to_string()),
            NumericField::Text(s) if s.trim().is_empty() => Ok(None),
            NumericField::Text(s) => parse_decimal(s).map(Some).ok_or_else(|| s.clone()),
            NumericField::Missing => Ok(None),
            NumericField::Other(v) => Err(v.to_string()),
        }
    }

    /// Raw text form, used for labels that echo the source value.
    pub fn raw(&self) -> String {
        match self {
            NumericField::Number(v) => v.to_string(),
            NumericField::Text(s) => s.clone(),
            NumericField::Missing => String::new(),
            NumericField::Other(v) => v.to_string(),
        }
    }
}

impl From<f64> for NumericField {
    fn from(v: f64) -> Self {
        NumericField::Number(v)
    }
}

impl From<&str> for NumericField {
    fn from(s: &str) -> Self {
        NumericField::Text(s.to_string())
    }
}

/// Parse a decimal that may use a comma as decimal separator.
///
/// Inner spaces (including no-break spaces) are treated as digit grouping.
/// When both `,` and `.` are present the one appearing first is the grouping
/// separator. Returns `None` for anything that does not parse in full or is
/// not finite.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{00A0}' | '\u{202F}' | '\''))
        .collect();
    if compact.is_empty() {
        return None;
    }

    let normalized = match (compact.find(','), compact.find('.')) {
        (Some(_), None) => {
            if compact.matches(',').count() > 1 {
                return None;
            }
            compact.replace(',', ".")
        }
        (Some(comma), Some(dot)) if comma < dot => compact.replace(',', ""),
        (Some(_), Some(_)) => compact.replace('.', "").replace(',', "."),
        (None, _) => compact,
    };

    // Reject the textual specials str::parse accepts ("inf", "NaN", ...).
    if !normalized
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
    {
        return None;
    }

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}
