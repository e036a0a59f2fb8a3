use crate::domain::model::{ExportFormat, Record, RenderSummary};
use crate::domain::ports::Renderer;
use crate::utils::error::Result;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes the records as a JSON array of objects with sorted keys.
#[derive(Debug, Clone)]
pub struct JsonRenderer {
    pretty: bool,
}

impl JsonRenderer {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl Default for JsonRenderer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Renderer for JsonRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Json
    }

    fn render(&self, records: &[Record], output_path: &Path) -> Result<RenderSummary> {
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(output_path)?);

        let sorted: Vec<_> = records.iter().map(Record::sorted).collect();
        if self.pretty {
            serde_json::to_writer_pretty(&mut writer, &sorted)?;
        } else {
            serde_json::to_writer(&mut writer, &sorted)?;
        }
        writer.write_all(b"\n")?;
        writer.flush()?;

        Ok(RenderSummary {
            rows_written: records.len(),
            pages: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    #[test]
    fn test_render_json_array() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("movements.json");
        let records = vec![
            Record::from_value(json!({"vehicle_plate": "ABC1D23", "id": 1})).unwrap(),
            Record::from_value(json!({"id": 2, "security_alert": true})).unwrap(),
        ];

        let summary = JsonRenderer::new(false).render(&records, &path).unwrap();
        assert_eq!(summary.rows_written, 2);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content.trim_end(),
            r#"[{"id":1,"vehicle_plate":"ABC1D23"},{"id":2,"security_alert":true}]"#
        );

        let parsed: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
    }
}
