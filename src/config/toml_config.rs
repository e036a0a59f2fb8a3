use crate::adapters::pdf::{Orientation, PageSize};
use crate::adapters::render::{CsvOptions, DanfePageFormat, PdfOptions};
use crate::utils::error::{ExportError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_one_of, validate_path, validate_positive_number,
    validate_single_byte_char, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub export: ExportSection,
    pub csv: CsvSection,
    pub pdf: PdfSection,
    pub danfe: DanfeSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSection {
    pub output_dir: String,
    pub file_prefix: String,
    /// Soft limit: larger result sets are exported with a warning.
    pub max_records: usize,
    pub source_date_field: String,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            output_dir: "data/exports".to_string(),
            file_prefix: "export".to_string(),
            max_records: 100_000,
            source_date_field: "timestamp".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvSection {
    pub delimiter: String,
    pub quote_char: String,
    pub quote_all: bool,
    pub include_headers: bool,
    pub chunk_size: usize,
    pub chunked_threshold: usize,
    pub true_token: String,
    pub false_token: String,
}

impl Default for CsvSection {
    fn default() -> Self {
        let options = CsvOptions::default();
        Self {
            delimiter: ",".to_string(),
            quote_char: "\"".to_string(),
            quote_all: options.quote_all,
            include_headers: options.include_headers,
            chunk_size: options.chunk_size,
            chunked_threshold: options.chunked_threshold,
            true_token: options.true_token,
            false_token: options.false_token,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfSection {
    pub page_size: String,
    pub orientation: String,
    pub title: String,
    pub author: String,
    pub rows_per_page: Option<usize>,
    pub max_columns: usize,
}

impl Default for PdfSection {
    fn default() -> Self {
        let options = PdfOptions::default();
        Self {
            page_size: options.page_size.as_str().to_string(),
            orientation: "portrait".to_string(),
            title: options.title,
            author: options.author,
            rows_per_page: None,
            max_columns: options.max_columns,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DanfeSection {
    pub output_dir: String,
    pub page_format: String,
    /// `producao` or `homologacao`.
    pub environment: String,
}

impl Default for DanfeSection {
    fn default() -> Self {
        Self {
            output_dir: "data/danfes".to_string(),
            page_format: "A4".to_string(),
            environment: "producao".to_string(),
        }
    }
}

impl ExportConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            ExportError::config(
                "config_file",
                format!("Cannot read {}: {}", path.as_ref().display(), e),
            )
        })?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content)
            .map_err(|e| ExportError::config("toml_parsing", format!("TOML parsing error: {}", e)))
    }

    /// 替換環境變數 (例如 ${EXPORT_DIR})，未設定的變數保留原字串
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ExportError::config("toml_parsing", e.to_string()))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn csv_options(&self) -> Result<CsvOptions> {
        Ok(CsvOptions {
            delimiter: validate_single_byte_char("csv.delimiter", &self.csv.delimiter)?,
            quote: validate_single_byte_char("csv.quote_char", &self.csv.quote_char)?,
            quote_all: self.csv.quote_all,
            include_headers: self.csv.include_headers,
            chunk_size: self.csv.chunk_size,
            chunked_threshold: self.csv.chunked_threshold,
            true_token: self.csv.true_token.clone(),
            false_token: self.csv.false_token.clone(),
        })
    }

    pub fn pdf_options(&self) -> Result<PdfOptions> {
        let page_size: PageSize = self
            .pdf
            .page_size
            .parse()
            .map_err(|e: String| ExportError::config("pdf.page_size", e))?;
        let orientation: Orientation = self
            .pdf
            .orientation
            .parse()
            .map_err(|e: String| ExportError::config("pdf.orientation", e))?;

        Ok(PdfOptions {
            page_size,
            orientation,
            title: self.pdf.title.clone(),
            author: self.pdf.author.clone(),
            rows_per_page: self.pdf.rows_per_page,
            max_columns: self.pdf.max_columns,
        })
    }

    pub fn danfe_page_format(&self) -> Result<DanfePageFormat> {
        self.danfe
            .page_format
            .parse()
            .map_err(|e: String| ExportError::config("danfe.page_format", e))
    }

    pub fn is_homologation(&self) -> bool {
        self.danfe.environment.eq_ignore_ascii_case("homologacao")
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_path("export.output_dir", &self.export.output_dir)?;
        validate_non_empty_string("export.file_prefix", &self.export.file_prefix)?;
        validate_non_empty_string("export.source_date_field", &self.export.source_date_field)?;
        validate_positive_number("export.max_records", self.export.max_records, 1)?;

        self.csv_options()?;
        validate_positive_number("csv.chunk_size", self.csv.chunk_size, 1)?;

        self.pdf_options()?;
        validate_positive_number("pdf.max_columns", self.pdf.max_columns, 1)?;
        if let Some(rows) = self.pdf.rows_per_page {
            validate_positive_number("pdf.rows_per_page", rows, 1)?;
        }

        validate_path("danfe.output_dir", &self.danfe.output_dir)?;
        self.danfe_page_format()?;
        validate_one_of(
            "danfe.environment",
            &self.danfe.environment.to_lowercase(),
            &["producao", "homologacao"],
        )?;

        Ok(())
    }
}

impl Validate for ExportConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
