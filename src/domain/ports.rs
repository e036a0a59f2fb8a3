use crate::domain::model::{ExportFormat, Record, RenderSummary};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::path::Path;

/// Supplies movement records for a date range. Owned by the caller and
/// injected into the export pipeline.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn find_by_date_range(
        &self,
        date_start: NaiveDate,
        date_end: NaiveDate,
        filters: Option<&Map<String, Value>>,
    ) -> Result<Vec<Record>>;
}

/// Writes a complete file of one output format.
pub trait Renderer: Send + Sync {
    fn format(&self) -> ExportFormat;

    fn supports(&self, format: ExportFormat) -> bool {
        self.format() == format
    }

    fn render(&self, records: &[Record], output_path: &Path) -> Result<RenderSummary>;
}
