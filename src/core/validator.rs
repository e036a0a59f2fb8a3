use crate::domain::model::{ExportFormat, ExportRequest};
use crate::utils::error::{ExportError, Result};
use chrono::NaiveDate;
use serde_json::{Map, Value};

/// Loosely-typed request as received from the CLI or an API layer.
pub type RawParams = Map<String, Value>;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 驗證並正規化匯出參數，不做任何 I/O
pub fn validate(params: &RawParams) -> Result<ExportRequest> {
    let file_type = required_str(params, "file_type");
    let date_start = required_str(params, "date_start");
    let date_end = required_str(params, "date_end");

    let (file_type, date_start, date_end) = match (file_type, date_start, date_end) {
        (Some(f), Some(s), Some(e)) => (f, s, e),
        _ => {
            return Err(ExportError::invalid_parameters(
                "Required parameters: file_type, date_start, date_end",
            ))
        }
    };

    let format: ExportFormat = file_type.parse().map_err(ExportError::invalid_parameters)?;

    let (date_start, date_end) = match (parse_date(date_start), parse_date(date_end)) {
        (Some(s), Some(e)) => (s, e),
        _ => {
            return Err(ExportError::invalid_parameters(
                "Invalid date format. Use YYYY-MM-DD.",
            ))
        }
    };

    if date_start > date_end {
        return Err(ExportError::invalid_parameters(format!(
            "End date {} cannot be earlier than start date {}",
            date_end, date_start
        )));
    }

    Ok(ExportRequest {
        format,
        date_start,
        date_end,
        filters: filters(params)?,
        requester_id: requester_id(params)?,
    })
}

fn required_str<'a>(params: &'a RawParams, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    // chrono 接受 "2024-1-5"，這裡要求固定寬度
    if value.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

fn filters(params: &RawParams) -> Result<Option<Map<String, Value>>> {
    match params.get("filters") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(obj)) => Ok(Some(obj.clone())),
        Some(other) => Err(ExportError::invalid_parameters(format!(
            "filters must be an object, got {}",
            other
        ))),
    }
}

fn requester_id(params: &RawParams) -> Result<Option<i64>> {
    let value = params
        .get("requester_id")
        .or_else(|| params.get("user_id"))
        .filter(|v| !v.is_null());

    match value {
        None => Ok(None),
        Some(v) => v.as_i64().map(Some).ok_or_else(|| {
            ExportError::invalid_parameters(format!("requester_id must be an integer, got {}", v))
        }),
    }
}
