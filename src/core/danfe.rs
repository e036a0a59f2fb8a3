use crate::adapters::nfe::NfeXmlParser;
use crate::adapters::render::{DanfePageFormat, DanfeRenderer};
use crate::config::toml_config::ExportConfig;
use crate::core::paths::ExportDirectory;
use crate::domain::nfe::{DanfeMetadata, DanfeOutcome};
use crate::utils::error::{ExportError, Result};
use chrono::Local;
use std::path::Path;
use std::time::Instant;

pub const DEFAULT_DANFE_DIR: &str = "data/danfes";

/// NFe XML in, DANFE PDF out.
pub struct GenerateDanfe {
    parser: NfeXmlParser,
    renderer: DanfeRenderer,
    directory: ExportDirectory,
    span: tracing::Span,
}

impl GenerateDanfe {
    pub fn new(directory: ExportDirectory, renderer: DanfeRenderer) -> Self {
        let span = tracing::info_span!(
            "generate_danfe",
            output_dir = %directory.base_dir().display(),
            page_format = renderer.page_format().as_str()
        );
        Self {
            parser: NfeXmlParser::new(),
            renderer,
            directory,
            span,
        }
    }

    pub fn from_config(config: &ExportConfig) -> Result<Self> {
        let renderer = DanfeRenderer::new(config.danfe_page_format()?)
            .with_homologation(config.is_homologation());
        Ok(Self::new(
            ExportDirectory::new(&config.danfe.output_dir),
            renderer,
        ))
    }

    pub fn page_format(&self) -> DanfePageFormat {
        self.renderer.page_format()
    }

    pub fn execute(&self, xml: &str) -> Result<DanfeOutcome> {
        let _guard = self.span.enter();
        self.run(xml).map_err(|e| {
            let e = e.into_boundary();
            tracing::error!("❌ DANFE generation failed: {}", e);
            e
        })
    }

    pub fn execute_from_file(&self, xml_path: impl AsRef<Path>) -> Result<DanfeOutcome> {
        let xml_path = xml_path.as_ref();
        let xml = std::fs::read_to_string(xml_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ExportError::NfeNotFound {
                path: xml_path.display().to_string(),
            },
            _ => ExportError::Pipeline {
                message: format!("Failed to read {}: {}", xml_path.display(), e),
            },
        })?;
        tracing::info!("📄 Read NFe XML from {}", xml_path.display());
        self.execute(&xml)
    }

    fn run(&self, xml: &str) -> Result<DanfeOutcome> {
        let started = Instant::now();

        let nfe = self.parser.parse(xml)?;
        tracing::info!(
            "🧾 Parsed NFe {} with {} products",
            nfe.access_key,
            nfe.products.len()
        );

        self.directory.ensure()?;
        let output_path = self
            .directory
            .generate_path("pdf", &format!("DANFE_{}", nfe.access_key));

        let pages = self.renderer.render(&nfe, &output_path).map_err(|e| {
            self.directory.remove_partial_output(&output_path);
            ExportError::Render {
                format: "danfe".to_string(),
                source: Box::new(e),
            }
        })?;

        let file_size_bytes = match self.directory.get_size(&output_path) {
            Ok(size) => size,
            Err(e) => {
                tracing::warn!("⚠️ Could not read size of {}: {}", output_path.display(), e);
                0
            }
        };

        Ok(DanfeOutcome {
            file_path: output_path,
            access_key: nfe.access_key.clone(),
            file_size_bytes,
            pages,
            completed_at: Local::now(),
            metadata: DanfeMetadata {
                issuer_cnpj: nfe.issuer.tax_id.clone(),
                recipient_cnpj: nfe.recipient.tax_id.clone(),
                total_value: nfe.totals.invoice,
                product_count: nfe.products.len(),
                generation_seconds: started.elapsed().as_secs_f64(),
                page_format: self.renderer.page_format().as_str().to_string(),
            },
        })
    }
}

impl Default for GenerateDanfe {
    fn default() -> Self {
        Self::new(ExportDirectory::new(DEFAULT_DANFE_DIR), DanfeRenderer::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"<NFe><infNFe Id="NFe35240112345678000190550010000012341000012345">
        <emit><CNPJ>12345678000190</CNPJ><xNome>Emitente</xNome></emit>
        <det><prod><cProd>1</cProd><xProd>Item</xProd><vProd>10.00</vProd></prod></det>
        <total><ICMSTot><vNF>10.00</vNF></ICMSTot></total>
    </infNFe></NFe>"#;

    fn use_case(temp: &TempDir) -> GenerateDanfe {
        GenerateDanfe::new(ExportDirectory::new(temp.path()), DanfeRenderer::default())
    }

    #[test]
    fn test_execute_writes_named_pdf() {
        let temp = TempDir::new().unwrap();
        let outcome = use_case(&temp).execute(MINIMAL).unwrap();

        let name = outcome.file_path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("DANFE_35240112345678000190550010000012341000012345_"));
        assert!(name.ends_with(".pdf"));
        assert_eq!(outcome.pages, 1);
        assert_eq!(outcome.metadata.issuer_cnpj, "12345678000190");
        assert_eq!(outcome.metadata.product_count, 1);
        assert_eq!(outcome.metadata.page_format, "A4");
        assert!(outcome.file_size_bytes > 0);
    }

    #[test]
    fn test_invalid_xml_creates_nothing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("danfes");
        let use_case = GenerateDanfe::new(ExportDirectory::new(&dir), DanfeRenderer::default());

        let err = use_case.execute("<NFe><infNFe").unwrap_err();
        assert!(matches!(err, ExportError::InvalidNfe { .. }));
        assert!(!dir.exists());
    }

    #[test]
    fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = use_case(&temp)
            .execute_from_file(temp.path().join("missing.xml"))
            .unwrap_err();
        assert!(matches!(err, ExportError::NfeNotFound { .. }));
    }

    #[test]
    fn test_from_config_reads_danfe_section() {
        let config = ExportConfig::from_toml_str("[danfe]\npage_format = \"A5\"").unwrap();
        let use_case = GenerateDanfe::from_config(&config).unwrap();
        assert_eq!(use_case.page_format(), DanfePageFormat::A5);
    }
}
