use crate::adapters::render::{CsvRenderer, JsonRenderer, ReportRenderer};
use crate::config::toml_config::ExportConfig;
use crate::core::paths::ExportDirectory;
use crate::core::validator::{validate, RawParams};
use crate::domain::model::{
    DateRange, ExportFormat, ExportMetadata, ExportOutcome, ExportRequest, Record, RenderSummary,
};
use crate::domain::ports::{RecordSource, Renderer};
use crate::utils::error::{ExportError, Result};
use chrono::Local;
use std::collections::HashMap;
use std::path::Path;
use tracing::Instrument;

pub const DEFAULT_FILE_PREFIX: &str = "export";
pub const DEFAULT_MAX_RECORDS: usize = 100_000;

/// Validate → fetch → path → render → outcome, for one request at a time.
///
/// Either returns a complete [`ExportOutcome`] or exactly one typed error;
/// a failed render never leaves its partial file behind.
pub struct ExportPipeline<S: RecordSource> {
    source: S,
    directory: ExportDirectory,
    renderers: HashMap<ExportFormat, Box<dyn Renderer>>,
    file_prefix: String,
    max_records: usize,
    span: tracing::Span,
}

impl<S: RecordSource> ExportPipeline<S> {
    pub fn new(source: S, directory: ExportDirectory) -> Self {
        let span = tracing::info_span!(
            "export_pipeline",
            output_dir = %directory.base_dir().display()
        );
        Self {
            source,
            directory,
            renderers: HashMap::new(),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            max_records: DEFAULT_MAX_RECORDS,
            span,
        }
    }

    /// Pipeline with the CSV, PDF report and JSON renderers configured from `config`.
    pub fn from_config(source: S, config: &ExportConfig) -> Result<Self> {
        let directory = ExportDirectory::new(&config.export.output_dir);
        Self::new(source, directory)
            .with_prefix(config.export.file_prefix.clone())
            .with_max_records(config.export.max_records)
            .with_default_renderers(config)
    }

    /// Registers `renderer` under its format, replacing any previous one.
    pub fn with_renderer<R: Renderer + 'static>(mut self, renderer: R) -> Self {
        let format = renderer.format();
        if self.renderers.insert(format, Box::new(renderer)).is_some() {
            tracing::debug!("Replaced renderer for {}", format);
        }
        self
    }

    pub fn with_default_renderers(self, config: &ExportConfig) -> Result<Self> {
        Ok(self
            .with_renderer(CsvRenderer::new(config.csv_options()?))
            .with_renderer(ReportRenderer::new(config.pdf_options()?))
            .with_renderer(JsonRenderer::default()))
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    pub fn directory(&self) -> &ExportDirectory {
        &self.directory
    }

    pub fn registered_formats(&self) -> Vec<ExportFormat> {
        ExportFormat::ALL
            .iter()
            .copied()
            .filter(|f| self.renderer_for(*f).is_some())
            .collect()
    }

    fn renderer_for(&self, format: ExportFormat) -> Option<&dyn Renderer> {
        self.renderers
            .get(&format)
            .or_else(|| self.renderers.values().find(|r| r.supports(format)))
            .map(|r| &**r)
    }

    pub async fn execute(&self, params: &RawParams) -> Result<ExportOutcome> {
        async {
            match self.run(params).await {
                Ok(outcome) => Ok(outcome),
                Err(e) => {
                    let e = e.into_boundary();
                    match &e {
                        ExportError::NoDataFound { .. } => tracing::info!("{}", e),
                        _ => tracing::error!("❌ Export failed: {}", e),
                    }
                    Err(e)
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }

    async fn run(&self, params: &RawParams) -> Result<ExportOutcome> {
        // 1. 驗證參數
        let request = validate(params)?;
        tracing::info!(
            "🚀 Export requested: {} from {} to {}",
            request.format(),
            request.date_start(),
            request.date_end()
        );

        // 2. 取得資料
        let records = self.fetch(&request).await?;

        // 3. 輸出路徑
        self.directory.ensure()?;
        let output_path = self
            .directory
            .generate_path(request.format().extension(), &self.file_prefix);

        // 4. 找 renderer
        let renderer = self.renderer_for(request.format()).ok_or_else(|| {
            ExportError::UnsupportedFileType {
                format: request.format().to_string(),
            }
        })?;

        // 5. 產生檔案
        let summary = self.render(renderer, request.format(), &records, &output_path)?;

        // 6. 檔案大小
        let file_size_bytes = match self.directory.get_size(&output_path) {
            Ok(size) => size,
            Err(e) => {
                tracing::warn!("⚠️ Could not read size of {}: {}", output_path.display(), e);
                0
            }
        };

        tracing::info!(
            "✅ Exported {} records to {} ({} bytes)",
            records.len(),
            output_path.display(),
            file_size_bytes
        );

        // 7. 組合結果
        Ok(ExportOutcome {
            file_path: output_path,
            file_size_bytes,
            record_count: records.len(),
            completed_at: Local::now(),
            metadata: ExportMetadata {
                format: request.format(),
                date_range: DateRange {
                    start: request.date_start(),
                    end: request.date_end(),
                },
                filters: request.filters().cloned(),
                requester_id: request.requester_id(),
                pages: summary.pages,
            },
        })
    }

    async fn fetch(&self, request: &ExportRequest) -> Result<Vec<Record>> {
        let records = self
            .source
            .find_by_date_range(request.date_start(), request.date_end(), request.filters())
            .await
            .map_err(|e| match e {
                e @ ExportError::NoDataFound { .. } => e,
                other => ExportError::Pipeline {
                    message: format!("Failed to fetch records: {}", other),
                },
            })?;

        if records.is_empty() {
            return Err(ExportError::NoDataFound {
                start: request.date_start().to_string(),
                end: request.date_end().to_string(),
            });
        }

        if records.len() > self.max_records {
            tracing::warn!(
                "⚠️ {} records exceed the recommended maximum of {}; export may be slow",
                records.len(),
                self.max_records
            );
        }

        tracing::info!("📥 Fetched {} records", records.len());
        Ok(records)
    }

    fn render(
        &self,
        renderer: &dyn Renderer,
        format: ExportFormat,
        records: &[Record],
        output_path: &Path,
    ) -> Result<RenderSummary> {
        renderer.render(records, output_path).map_err(|e| {
            self.directory.remove_partial_output(output_path);
            ExportError::Render {
                format: format.to_string(),
                source: Box::new(e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::source::InMemorySource;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::{json, Map, Value};
    use std::fs;
    use tempfile::TempDir;

    fn params(value: Value) -> RawParams {
        value.as_object().cloned().unwrap()
    }

    fn movements() -> Vec<Record> {
        vec![
            Record::from_value(json!({"id": 1, "timestamp": "2024-01-05 08:00:00", "vehicle_plate": "ABC1D23"})).unwrap(),
            Record::from_value(json!({"id": 2, "timestamp": "2024-01-10 09:15:00", "gate_id": 2})).unwrap(),
        ]
    }

    fn pipeline(temp: &TempDir) -> ExportPipeline<InMemorySource> {
        ExportPipeline::new(
            InMemorySource::new(movements()),
            ExportDirectory::new(temp.path().join("exports")),
        )
        .with_prefix("test")
        .with_default_renderers(&ExportConfig::default())
        .unwrap()
    }

    struct PartialWriteRenderer;

    impl Renderer for PartialWriteRenderer {
        fn format(&self) -> ExportFormat {
            ExportFormat::Csv
        }

        fn render(&self, _records: &[Record], output_path: &Path) -> Result<RenderSummary> {
            fs::write(output_path, b"id,name\n1,")?;
            Err(ExportError::InvalidData {
                message: "disk full".to_string(),
            })
        }
    }

    /// Leaves a directory where the file should be, so cleanup cannot remove it.
    struct DirectoryAtOutputRenderer;

    impl Renderer for DirectoryAtOutputRenderer {
        fn format(&self) -> ExportFormat {
            ExportFormat::Csv
        }

        fn render(&self, _records: &[Record], output_path: &Path) -> Result<RenderSummary> {
            fs::create_dir_all(output_path)?;
            Err(ExportError::InvalidData {
                message: "cannot write".to_string(),
            })
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl RecordSource for BrokenSource {
        async fn find_by_date_range(
            &self,
            _start: NaiveDate,
            _end: NaiveDate,
            _filters: Option<&Map<String, Value>>,
        ) -> Result<Vec<Record>> {
            Err(ExportError::Source {
                message: "database is locked".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_execute_csv() {
        let temp = TempDir::new().unwrap();
        let outcome = pipeline(&temp)
            .execute(&params(json!({
                "file_type": "csv",
                "date_start": "2024-01-01",
                "date_end": "2024-01-31",
                "user_id": 9
            })))
            .await
            .unwrap();

        assert_eq!(outcome.record_count, 2);
        assert!(outcome.file_path.starts_with(temp.path().join("exports")));
        assert_eq!(outcome.file_path.extension().unwrap(), "csv");
        assert_eq!(outcome.file_size_bytes, fs::metadata(&outcome.file_path).unwrap().len());
        assert_eq!(outcome.metadata.requester_id, Some(9));
        assert_eq!(outcome.metadata.pages, None);
    }

    #[tokio::test]
    async fn test_execute_pdf_reports_pages() {
        let temp = TempDir::new().unwrap();
        let outcome = pipeline(&temp)
            .execute(&params(json!({
                "file_type": "PDF",
                "date_start": "2024-01-01",
                "date_end": "2024-01-31"
            })))
            .await
            .unwrap();

        assert_eq!(outcome.metadata.format, ExportFormat::Pdf);
        assert_eq!(outcome.metadata.pages, Some(1));
        assert!(fs::read(&outcome.file_path).unwrap().starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_invalid_params_touch_nothing() {
        let temp = TempDir::new().unwrap();
        let err = pipeline(&temp)
            .execute(&params(json!({
                "file_type": "xml",
                "date_start": "2024-01-01",
                "date_end": "2024-01-31"
            })))
            .await
            .unwrap_err();

        assert!(matches!(err, ExportError::InvalidParameters { .. }));
        assert!(!temp.path().join("exports").exists());
    }

    #[tokio::test]
    async fn test_no_data_found() {
        let temp = TempDir::new().unwrap();
        let err = pipeline(&temp)
            .execute(&params(json!({
                "file_type": "csv",
                "date_start": "2023-01-01",
                "date_end": "2023-01-31"
            })))
            .await
            .unwrap_err();

        assert!(matches!(err, ExportError::NoDataFound { .. }));
        assert!(!temp.path().join("exports").exists());
    }

    #[tokio::test]
    async fn test_xlsx_has_no_renderer() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(&temp);
        assert_eq!(
            pipeline.registered_formats(),
            vec![ExportFormat::Csv, ExportFormat::Pdf, ExportFormat::Json]
        );

        let err = pipeline
            .execute(&params(json!({
                "file_type": "xlsx",
                "date_start": "2024-01-01",
                "date_end": "2024-01-31"
            })))
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::UnsupportedFileType { .. }));
    }

    #[tokio::test]
    async fn test_failed_render_removes_partial_file() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(&temp).with_renderer(PartialWriteRenderer);

        let err = pipeline
            .execute(&params(json!({
                "file_type": "csv",
                "date_start": "2024-01-01",
                "date_end": "2024-01-31"
            })))
            .await
            .unwrap_err();

        match err {
            ExportError::Render { format, source } => {
                assert_eq!(format, "csv");
                assert!(source.to_string().contains("disk full"));
            }
            other => panic!("expected render error, got {:?}", other),
        }
        let leftovers = fs::read_dir(temp.path().join("exports")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_failed_cleanup_keeps_render_error() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(&temp).with_renderer(DirectoryAtOutputRenderer);

        let err = pipeline
            .execute(&params(json!({
                "file_type": "csv",
                "date_start": "2024-01-01",
                "date_end": "2024-01-31"
            })))
            .await
            .unwrap_err();

        match err {
            ExportError::Render { format, source } => {
                assert_eq!(format, "csv");
                assert!(source.to_string().contains("cannot write"));
            }
            other => panic!("expected render error, got {:?}", other),
        }
        // 清理失敗只記錄警告，目錄仍留在原處
        let leftovers = fs::read_dir(temp.path().join("exports")).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_source_failure_is_wrapped() {
        let temp = TempDir::new().unwrap();
        let pipeline = ExportPipeline::new(BrokenSource, ExportDirectory::new(temp.path()))
            .with_renderer(CsvRenderer::default());

        let err = pipeline
            .execute(&params(json!({
                "file_type": "csv",
                "date_start": "2024-01-01",
                "date_end": "2024-01-31"
            })))
            .await
            .unwrap_err();

        match err {
            ExportError::Pipeline { message } => assert!(message.contains("database is locked")),
            other => panic!("expected pipeline error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_soft_limit_still_exports() {
        let temp = TempDir::new().unwrap();
        let outcome = pipeline(&temp)
            .with_max_records(1)
            .execute(&params(json!({
                "file_type": "json",
                "date_start": "2024-01-01",
                "date_end": "2024-01-31"
            })))
            .await
            .unwrap();
        assert_eq!(outcome.record_count, 2);
    }
}
