use crate::domain::model::Record;
use crate::domain::ports::RecordSource;
use crate::utils::error::{ExportError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

pub const DEFAULT_DATE_FIELD: &str = "timestamp";

/// Date of a record: the first ten characters of `date_field` as `YYYY-MM-DD`.
fn record_date(record: &Record, date_field: &str) -> Option<NaiveDate> {
    let raw = record.get(date_field)?.as_str()?;
    let day = raw.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn matches_filters(record: &Record, filters: Option<&Map<String, Value>>) -> bool {
    let Some(filters) = filters else {
        return true;
    };
    filters.iter().all(|(key, expected)| {
        let actual = record.get(key);
        match expected {
            Value::Array(options) => actual.is_some_and(|v| options.contains(v)),
            other => actual == Some(other),
        }
    })
}

/// Records whose date falls in `[start, end]` and that satisfy every filter.
pub fn select_records(
    records: &[Record],
    date_field: &str,
    start: NaiveDate,
    end: NaiveDate,
    filters: Option<&Map<String, Value>>,
) -> Vec<Record> {
    records
        .iter()
        .filter(|r| match record_date(r, date_field) {
            Some(date) => date >= start && date <= end,
            None => false,
        })
        .filter(|r| matches_filters(r, filters))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    records: Vec<Record>,
    date_field: String,
}

impl InMemorySource {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            date_field: DEFAULT_DATE_FIELD.to_string(),
        }
    }

    pub fn with_date_field(mut self, date_field: impl Into<String>) -> Self {
        self.date_field = date_field.into();
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordSource for InMemorySource {
    async fn find_by_date_range(
        &self,
        date_start: NaiveDate,
        date_end: NaiveDate,
        filters: Option<&Map<String, Value>>,
    ) -> Result<Vec<Record>> {
        Ok(select_records(
            &self.records,
            &self.date_field,
            date_start,
            date_end,
            filters,
        ))
    }
}

/// Movement log stored as a JSON array of objects, read on every query.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
    date_field: String,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            date_field: DEFAULT_DATE_FIELD.to_string(),
        }
    }

    pub fn with_date_field(mut self, date_field: impl Into<String>) -> Self {
        self.date_field = date_field.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<Record>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ExportError::Source {
                message: format!("Failed to read {}: {}", self.path.display(), e),
            })?;

        let value: Value = serde_json::from_str(&content).map_err(|e| ExportError::Source {
            message: format!("Invalid JSON in {}: {}", self.path.display(), e),
        })?;

        let Value::Array(items) = value else {
            return Err(ExportError::Source {
                message: format!("{} must contain a JSON array of records", self.path.display()),
            });
        };

        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                Record::from_value(item).ok_or_else(|| ExportError::Source {
                    message: format!("Item {} in {} is not an object", i, self.path.display()),
                })
            })
            .collect()
    }
}

#[async_trait]
impl RecordSource for JsonFileSource {
    async fn find_by_date_range(
        &self,
        date_start: NaiveDate,
        date_end: NaiveDate,
        filters: Option<&Map<String, Value>>,
    ) -> Result<Vec<Record>> {
        let records = self.load().await?;
        let selected = select_records(&records, &self.date_field, date_start, date_end, filters);
        tracing::debug!(
            "Loaded {} records from {}, {} in range",
            records.len(),
            self.path.display(),
            selected.len()
        );
        Ok(selected)
    }
}
