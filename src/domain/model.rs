use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A movement record as handed over by a record source. The pipeline treats it
/// as an unordered bag of named fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub data: HashMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record from a JSON object; any other JSON value yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(obj) => Some(Self::from(obj)),
            _ => None,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Same fields with a stable key order, used by the JSON renderer.
    pub fn sorted(&self) -> BTreeMap<&str, &Value> {
        self.data.iter().map(|(k, v)| (k.as_str(), v)).collect()
    }
}

/// Sorted union of the field names across all records.
pub fn field_union(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .flat_map(Record::field_names)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

impl From<Map<String, Value>> for Record {
    fn from(obj: Map<String, Value>) -> Self {
        Self {
            data: obj.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Pdf,
    Xlsx,
    Json,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [
        ExportFormat::Csv,
        ExportFormat::Pdf,
        ExportFormat::Xlsx,
        ExportFormat::Json,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Json => "json",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        ExportFormat::ALL
            .into_iter()
            .find(|f| f.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "File type '{}' is not supported. Supported formats: {}",
                    normalized,
                    ExportFormat::ALL.map(|f| f.as_str()).join(", ")
                )
            })
    }
}

/// A validated export request. Only the validator constructs one.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub(crate) format: ExportFormat,
    pub(crate) date_start: NaiveDate,
    pub(crate) date_end: NaiveDate,
    pub(crate) filters: Option<Map<String, Value>>,
    pub(crate) requester_id: Option<i64>,
}

impl ExportRequest {
    pub fn format(&self) -> ExportFormat {
        self.format
    }

    pub fn date_start(&self) -> NaiveDate {
        self.date_start
    }

    pub fn date_end(&self) -> NaiveDate {
        self.date_end
    }

    pub fn filters(&self) -> Option<&Map<String, Value>> {
        self.filters.as_ref()
    }

    pub fn requester_id(&self) -> Option<i64> {
        self.requester_id
    }
}

/// What a renderer reports back after writing its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderSummary {
    pub rows_written: usize,
    pub pages: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportMetadata {
    pub format: ExportFormat,
    pub date_range: DateRange,
    pub filters: Option<Map<String, Value>>,
    pub requester_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportOutcome {
    pub file_path: PathBuf,
    #[serde(rename = "file_size")]
    pub file_size_bytes: u64,
    pub record_count: usize,
    #[serde(rename = "export_time")]
    pub completed_at: DateTime<Local>,
    pub metadata: ExportMetadata,
}
