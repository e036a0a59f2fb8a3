use crate::adapters::pdf::{
    page_count, page_slice, truncate_to_width, Font, Orientation, Page, PageSize, PdfDocument,
};
use crate::adapters::render::{normalize_value, DEFAULT_FALSE_TOKEN, DEFAULT_TRUE_TOKEN};
use crate::domain::model::{field_union, ExportFormat, Record, RenderSummary};
use crate::domain::ports::Renderer;
use crate::utils::error::Result;
use chrono::{Local, NaiveDate};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

const MARGIN: f32 = 40.0;
const FOOTER_HEIGHT: f32 = 40.0;
const MAX_ROW_HEIGHT: f32 = 18.0;
const CELL_FONT_SIZE: f32 = 7.5;

/// Fields shown first in the table when a record carries them.
const PREFERRED_COLUMNS: [&str; 7] = [
    "vehicle_plate",
    "timestamp",
    "direction",
    "access_type",
    "gate_id",
    "driver_name",
    "carrier_name",
];

#[derive(Debug, Clone, PartialEq)]
pub struct PdfOptions {
    pub page_size: PageSize,
    pub orientation: Orientation,
    pub title: String,
    pub author: String,
    /// Overrides the page size's default row capacity.
    pub rows_per_page: Option<usize>,
    pub max_columns: usize,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            orientation: Orientation::Portrait,
            title: "Relatório Sentry Logística".to_string(),
            author: "Sentry Logística".to_string(),
            rows_per_page: None,
            max_columns: 6,
        }
    }
}

impl PdfOptions {
    pub fn rows_per_page(&self) -> usize {
        self.rows_per_page
            .unwrap_or_else(|| self.page_size.rows_per_page())
            .max(1)
    }
}

/// Counts shown in the report's summary block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessSummary {
    pub total: usize,
    pub entries: usize,
    pub exits: usize,
    pub security_alerts: usize,
    pub unique_vehicles: usize,
}

impl AccessSummary {
    pub fn from_records(records: &[Record]) -> Self {
        let mut summary = AccessSummary {
            total: records.len(),
            ..Default::default()
        };
        let mut plates = HashSet::new();

        for record in records {
            let direction = record
                .get("direction")
                .or_else(|| record.get("access_type"))
                .and_then(Value::as_str)
                .map(|s| s.trim().to_lowercase());
            match direction.as_deref() {
                Some("entry" | "entrada") => summary.entries += 1,
                Some("exit" | "saida" | "saída") => summary.exits += 1,
                _ => {}
            }

            if record.get("security_alert").is_some_and(is_truthy) {
                summary.security_alerts += 1;
            }

            if let Some(plate) = record.get("vehicle_plate").and_then(Value::as_str) {
                plates.insert(plate.trim().to_uppercase());
            }
        }

        summary.unique_vehicles = plates.len();
        summary
    }
}

/// Earliest and latest `timestamp` dates among the records.
pub fn report_period(records: &[Record]) -> Option<(NaiveDate, NaiveDate)> {
    records
        .iter()
        .filter_map(|r| r.get("timestamp").and_then(Value::as_str))
        .filter_map(|ts| ts.get(..10))
        .filter_map(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
        .fold(None, |period, day| match period {
            None => Some((day, day)),
            Some((start, end)) => Some((start.min(day), end.max(day))),
        })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false"),
        Value::Null => false,
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Paginated movement report: title, summary block, table, page footer.
#[derive(Debug, Clone, Default)]
pub struct ReportRenderer {
    options: PdfOptions,
}

impl ReportRenderer {
    pub fn new(options: PdfOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PdfOptions {
        &self.options
    }

    /// Preferred movement fields first, then the remaining names in order,
    /// capped at `max_columns`.
    pub fn select_columns(&self, records: &[Record]) -> Vec<String> {
        let all = field_union(records);
        let mut columns: Vec<String> = PREFERRED_COLUMNS
            .iter()
            .filter(|c| all.iter().any(|a| a == *c))
            .map(|c| c.to_string())
            .collect();
        for name in &all {
            if !columns.contains(name) {
                columns.push(name.clone());
            }
        }
        if columns.len() > self.options.max_columns {
            tracing::debug!(
                "Report table limited to {} of {} columns",
                self.options.max_columns,
                columns.len()
            );
            columns.truncate(self.options.max_columns.max(1));
        }
        columns
    }

    pub fn build(&self, records: &[Record]) -> PdfDocument {
        let capacity = self.options.rows_per_page();
        let total_pages = page_count(records.len(), capacity);
        let columns = self.select_columns(records);
        let summary = AccessSummary::from_records(records);
        let generated_at = Local::now().format("%d/%m/%Y %H:%M").to_string();
        let mut subtitle = format!("Generated at: {}  |  Records: {}", generated_at, records.len());
        if let Some((start, end)) = report_period(records) {
            subtitle = format!("Period: {} to {}  |  {}", start, end, subtitle);
        }

        let mut doc = PdfDocument::new(self.options.page_size, self.options.orientation)
            .with_info(self.options.title.clone(), self.options.author.clone());

        for page_index in 0..total_pages {
            let page = doc.add_page();
            let mut y = self.draw_header(page, &subtitle);
            if page_index == 0 {
                y = draw_summary(page, y, &summary);
            }
            let rows = page_slice(records, page_index, capacity);
            if records.is_empty() {
                page.text(MARGIN, y - 14.0, 10.0, Font::Regular, "No records.");
            } else {
                self.draw_table(page, y, &columns, rows, capacity);
            }
            draw_footer(page, &self.options.author, page_index + 1, total_pages);
            tracing::debug!("Drew report page {} of {}", page_index + 1, total_pages);
        }

        doc
    }

    fn draw_header(&self, page: &mut Page, subtitle: &str) -> f32 {
        let top = page.height() - MARGIN;
        page.text(MARGIN, top - 10.0, 16.0, Font::Bold, &self.options.title);
        page.text(MARGIN, top - 28.0, 9.0, Font::Regular, subtitle);
        page.line(MARGIN, top - 36.0, page.width() - MARGIN, top - 36.0);
        top - 50.0
    }

    fn draw_table(
        &self,
        page: &mut Page,
        top: f32,
        columns: &[String],
        rows: &[Record],
        capacity: usize,
    ) {
        let table_width = page.width() - 2.0 * MARGIN;
        let available = top - (MARGIN + FOOTER_HEIGHT);
        let row_height = (available / (capacity + 1) as f32).min(MAX_ROW_HEIGHT);
        let col_width = table_width / columns.len().max(1) as f32;

        // 表頭
        let mut y = top - row_height;
        page.fill_rect(MARGIN, y, table_width, row_height, 0.85);
        for (i, column) in columns.iter().enumerate() {
            let text = truncate_to_width(column, col_width - 4.0, CELL_FONT_SIZE);
            page.text(
                MARGIN + i as f32 * col_width + 2.0,
                y + row_height * 0.3,
                CELL_FONT_SIZE,
                Font::Bold,
                &text,
            );
        }

        for (row_index, record) in rows.iter().enumerate() {
            y -= row_height;
            if row_index % 2 == 1 {
                page.fill_rect(MARGIN, y, table_width, row_height, 0.95);
            }
            for (i, column) in columns.iter().enumerate() {
                let value = record
                    .get(column)
                    .map(|v| normalize_value(v, DEFAULT_TRUE_TOKEN, DEFAULT_FALSE_TOKEN))
                    .unwrap_or_default();
                let text = truncate_to_width(&value, col_width - 4.0, CELL_FONT_SIZE);
                page.text(
                    MARGIN + i as f32 * col_width + 2.0,
                    y + row_height * 0.3,
                    CELL_FONT_SIZE,
                    Font::Regular,
                    &text,
                );
            }
        }

        page.rect(MARGIN, y, table_width, top - y);
    }
}

fn draw_summary(page: &mut Page, top: f32, summary: &AccessSummary) -> f32 {
    page.text(MARGIN, top - 12.0, 11.0, Font::Bold, "Summary");
    let lines = [
        format!("Total movements: {}", summary.total),
        format!("Entries: {}", summary.entries),
        format!("Exits: {}", summary.exits),
        format!("Security alerts: {}", summary.security_alerts),
        format!("Unique vehicles: {}", summary.unique_vehicles),
    ];
    let mut y = top - 26.0;
    for line in &lines {
        page.text(MARGIN + 8.0, y, 9.0, Font::Regular, line);
        y -= 12.0;
    }
    y - 8.0
}

fn draw_footer(page: &mut Page, author: &str, page_number: usize, total_pages: usize) {
    let y = MARGIN;
    page.line(MARGIN, y + 12.0, page.width() - MARGIN, y + 12.0);
    page.text(MARGIN, y, 8.0, Font::Regular, author);
    let label = format!("Page {} of {}", page_number, total_pages);
    page.text(page.width() - MARGIN - 60.0, y, 8.0, Font::Regular, &label);
}

impl Renderer for ReportRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Pdf
    }

    fn render(&self, records: &[Record], output_path: &Path) -> Result<RenderSummary> {
        let doc = self.build(records);
        let bytes = doc.save(output_path)?;
        tracing::info!(
            "📄 PDF report written: {} ({} pages, {} bytes)",
            output_path.display(),
            doc.page_count(),
            bytes
        );
        Ok(RenderSummary {
            rows_written: records.len(),
            pages: Some(doc.page_count()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn movements(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                Record::from_value(json!({
                    "id": i,
                    "vehicle_plate": format!("ABC{:04}", i % 3),
                    "timestamp": "2024-01-15 08:30:00",
                    "direction": if i % 2 == 0 { "entry" } else { "exit" },
                    "security_alert": i == 0,
                }))
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_summary_counts() {
        let summary = AccessSummary::from_records(&movements(5));
        assert_eq!(
            summary,
            AccessSummary {
                total: 5,
                entries: 3,
                exits: 2,
                security_alerts: 1,
                unique_vehicles: 3,
            }
        );
    }

    #[test]
    fn test_summary_reads_portuguese_directions() {
        let records = vec![
            Record::new().with_field("access_type", "Entrada"),
            Record::new().with_field("access_type", "Saída"),
            Record::new().with_field("security_alert", 1),
        ];
        let summary = AccessSummary::from_records(&records);
        assert_eq!(summary.entries, 1);
        assert_eq!(summary.exits, 1);
        assert_eq!(summary.security_alerts, 1);
    }

    #[test]
    fn test_select_columns_prefers_movement_fields() {
        let renderer = ReportRenderer::new(PdfOptions {
            max_columns: 4,
            ..PdfOptions::default()
        });
        let columns = renderer.select_columns(&movements(2));
        assert_eq!(columns, vec!["vehicle_plate", "timestamp", "direction", "id"]);
    }

    #[test]
    fn test_header_shows_record_period() {
        let records = vec![
            Record::new().with_field("timestamp", "2024-01-31 18:30:00"),
            Record::new().with_field("timestamp", "2024-01-02T07:45:00"),
            Record::new().with_field("vehicle_plate", "XYZ9W87"),
        ];
        assert_eq!(
            report_period(&records),
            Some((
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
            ))
        );

        let doc = ReportRenderer::default().build(&records);
        assert!(doc.pages()[0]
            .content()
            .contains("Period: 2024-01-02 to 2024-01-31  |  Generated at: "));
    }

    #[test]
    fn test_header_without_dates_has_no_period() {
        let doc = ReportRenderer::default().build(&[Record::new().with_field("gate_id", 1)]);
        assert!(!doc.pages()[0].content().contains("Period:"));
        assert!(doc.pages()[0].content().contains("Records: 1"));
    }

    #[test]
    fn test_page_count_follows_capacity() {
        let a4 = ReportRenderer::default();
        assert_eq!(a4.build(&movements(20)).page_count(), 1);
        assert_eq!(a4.build(&movements(21)).page_count(), 2);
        assert_eq!(a4.build(&movements(45)).page_count(), 3);

        let a5 = ReportRenderer::new(PdfOptions {
            page_size: PageSize::A5,
            ..PdfOptions::default()
        });
        assert_eq!(a5.build(&movements(25)).page_count(), 3);
    }

    #[test]
    fn test_every_page_has_footer() {
        let doc = ReportRenderer::default().build(&movements(41));
        assert_eq!(doc.page_count(), 3);
        for (i, page) in doc.pages().iter().enumerate() {
            assert!(page.content().contains(&format!("(Page {} of 3)", i + 1)));
        }
        assert!(doc.pages()[0].content().contains("(Summary)"));
        assert!(!doc.pages()[1].content().contains("(Summary)"));
    }

    #[test]
    fn test_render_writes_pdf() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("report.pdf");
        let summary = ReportRenderer::default().render(&movements(3), &path).unwrap();

        assert_eq!(summary.rows_written, 3);
        assert_eq!(summary.pages, Some(1));
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.4"));
    }
}
