pub mod csv;
pub mod danfe;
pub mod json;
pub mod report;

pub use self::csv::{CsvOptions, CsvRenderer};
pub use self::danfe::{DanfePageFormat, DanfeRenderer};
pub use self::json::JsonRenderer;
pub use self::report::{AccessSummary, PdfOptions, ReportRenderer};

use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;

pub const DEFAULT_TRUE_TOKEN: &str = "Sim";
pub const DEFAULT_FALSE_TOKEN: &str = "Não";

/// Flattens a field value to display text.
///
/// Null becomes empty, numbers are kept verbatim, booleans use the given
/// tokens, timestamps are rewritten as ISO-8601 and nested values are
/// serialized as compact JSON.
pub fn normalize_value(value: &Value, true_token: &str, false_token: &str) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => true_token.to_string(),
        Value::Bool(false) => false_token.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => normalize_text(s),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn normalize_text(value: &str) -> String {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return dt.to_rfc3339();
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string();
        }
    }
    trimmed.to_string()
}
