use crate::adapters::render::{normalize_value, DEFAULT_FALSE_TOKEN, DEFAULT_TRUE_TOKEN};
use crate::domain::model::{field_union, ExportFormat, Record, RenderSummary};
use crate::domain::ports::Renderer;
use crate::utils::error::{ExportError, Result};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub quote: u8,
    pub quote_all: bool,
    pub include_headers: bool,
    /// Rows written between flushes in chunked mode.
    pub chunk_size: usize,
    /// Record count above which `render` switches to chunked mode.
    pub chunked_threshold: usize,
    pub true_token: String,
    pub false_token: String,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            quote_all: false,
            include_headers: true,
            chunk_size: 1000,
            chunked_threshold: 10_000,
            true_token: DEFAULT_TRUE_TOKEN.to_string(),
            false_token: DEFAULT_FALSE_TOKEN.to_string(),
        }
    }
}

impl CsvOptions {
    /// Semicolon separated, every field quoted.
    pub fn european() -> Self {
        Self {
            delimiter: b';',
            quote_all: true,
            ..Self::default()
        }
    }

    pub fn tab_delimited() -> Self {
        Self {
            delimiter: b'\t',
            ..Self::default()
        }
    }

    pub fn large_file() -> Self {
        Self {
            chunk_size: 5000,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CsvRenderer {
    options: CsvOptions,
}

impl CsvRenderer {
    pub fn new(options: CsvOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CsvOptions {
        &self.options
    }

    /// Sorted union of the field names of every record.
    pub fn collect_headers(records: &[Record]) -> Vec<String> {
        field_union(records)
    }

    pub fn normalize_value(&self, value: &Value) -> String {
        normalize_value(value, &self.options.true_token, &self.options.false_token)
    }

    fn row(&self, record: &Record, headers: &[String]) -> Vec<String> {
        headers
            .iter()
            .map(|h| record.get(h).map(|v| self.normalize_value(v)).unwrap_or_default())
            .collect()
    }

    fn writer<W: Write>(&self, inner: W) -> csv::Writer<W> {
        let quote_style = if self.options.quote_all {
            csv::QuoteStyle::Always
        } else {
            csv::QuoteStyle::Necessary
        };
        csv::WriterBuilder::new()
            .delimiter(self.options.delimiter)
            .quote(self.options.quote)
            .quote_style(quote_style)
            .from_writer(inner)
    }

    fn open(output_path: &Path) -> Result<BufWriter<File>> {
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(BufWriter::new(File::create(output_path)?))
    }

    fn ensure_records(records: &[Record]) -> Result<Vec<String>> {
        if records.is_empty() {
            return Err(ExportError::InvalidData {
                message: "no records provided for CSV export".to_string(),
            });
        }
        let headers = Self::collect_headers(records);
        if headers.is_empty() {
            return Err(ExportError::InvalidData {
                message: "records carry no fields to use as CSV headers".to_string(),
            });
        }
        Ok(headers)
    }

    /// Normalizes every row first, then writes the file in one pass.
    pub fn render_buffered(&self, records: &[Record], output_path: &Path) -> Result<RenderSummary> {
        let headers = Self::ensure_records(records)?;
        let rows: Vec<Vec<String>> = records.iter().map(|r| self.row(r, &headers)).collect();

        let mut wtr = self.writer(Self::open(output_path)?);
        if self.options.include_headers {
            wtr.write_record(&headers)?;
        }
        for row in &rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;

        Ok(RenderSummary {
            rows_written: rows.len(),
            pages: None,
        })
    }

    /// Streams rows chunk by chunk; only one normalized row is held at a time.
    pub fn render_chunked(&self, records: &[Record], output_path: &Path) -> Result<RenderSummary> {
        let headers = Self::ensure_records(records)?;
        let chunk_size = self.options.chunk_size.max(1);

        let mut wtr = self.writer(Self::open(output_path)?);
        if self.options.include_headers {
            wtr.write_record(&headers)?;
        }

        let mut rows_written = 0;
        for (index, chunk) in records.chunks(chunk_size).enumerate() {
            for record in chunk {
                wtr.write_record(self.row(record, &headers))?;
                rows_written += 1;
            }
            wtr.flush()?;
            tracing::debug!(
                "Wrote chunk {} (rows {}-{})",
                index + 1,
                index * chunk_size,
                index * chunk_size + chunk.len()
            );
        }

        Ok(RenderSummary {
            rows_written,
            pages: None,
        })
    }

    pub fn render_to_string(&self, records: &[Record]) -> Result<String> {
        let headers = Self::ensure_records(records)?;
        let mut wtr = self.writer(Vec::new());
        if self.options.include_headers {
            wtr.write_record(&headers)?;
        }
        for record in records {
            wtr.write_record(self.row(record, &headers))?;
        }
        into_string(wtr)
    }

    /// Header row plus one empty row, every field quoted.
    pub fn template(&self, headers: &[String]) -> Result<String> {
        if headers.is_empty() {
            return Err(ExportError::InvalidData {
                message: "template needs at least one header".to_string(),
            });
        }
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(self.options.delimiter)
            .quote(self.options.quote)
            .quote_style(csv::QuoteStyle::Always)
            .from_writer(Vec::new());
        wtr.write_record(headers)?;
        wtr.write_record(vec![""; headers.len()])?;
        into_string(wtr)
    }
}

impl Renderer for CsvRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }

    fn render(&self, records: &[Record], output_path: &Path) -> Result<RenderSummary> {
        if records.len() > self.options.chunked_threshold {
            tracing::info!(
                "📦 {} records exceed the chunked threshold ({}), streaming in chunks of {}",
                records.len(),
                self.options.chunked_threshold,
                self.options.chunk_size
            );
            self.render_chunked(records, output_path)
        } else {
            self.render_buffered(records, output_path)
        }
    }
}

fn into_string(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = wtr.into_inner().map_err(|e| ExportError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| ExportError::InvalidData {
        message: format!("CSV output is not valid UTF-8: {}", e),
    })
}
