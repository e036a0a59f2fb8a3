use crate::config::toml_config::ExportConfig;
use crate::core::validator::RawParams;
use crate::utils::error::{ExportError, Result};
use crate::utils::validation::Validate;
use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "sentry-export")]
#[command(about = "Export yard movement records to CSV, PDF or JSON")]
pub struct CliConfig {
    /// Output format: csv, pdf, xlsx or json
    #[arg(long)]
    pub file_type: String,

    /// First day of the period (YYYY-MM-DD)
    #[arg(long)]
    pub date_start: String,

    /// Last day of the period (YYYY-MM-DD), inclusive
    #[arg(long)]
    pub date_end: String,

    /// JSON file holding an array of movement records
    #[arg(long)]
    pub source: PathBuf,

    /// Equality filter as key=value; repeat a key to match any of its values
    #[arg(long = "filter", value_name = "KEY=VALUE")]
    pub filters: Vec<String>,

    #[arg(long)]
    pub requester_id: Option<i64>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Overrides export.output_dir
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Overrides export.file_prefix
    #[arg(long)]
    pub prefix: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines on stderr")]
    pub json_logs: bool,
}

impl CliConfig {
    /// Configuration file (or defaults) with the command-line overrides applied.
    pub fn load_config(&self) -> Result<ExportConfig> {
        let mut config = load_or_default(self.config.as_ref())?;
        if let Some(dir) = &self.output_dir {
            config.export.output_dir = dir.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.export.file_prefix = prefix.clone();
        }
        config.validate()?;
        Ok(config)
    }

    /// The request as the loosely-typed parameter bag the pipeline validates.
    pub fn to_params(&self) -> Result<RawParams> {
        let mut params = RawParams::new();
        params.insert("file_type".into(), Value::String(self.file_type.clone()));
        params.insert("date_start".into(), Value::String(self.date_start.clone()));
        params.insert("date_end".into(), Value::String(self.date_end.clone()));
        if let Some(id) = self.requester_id {
            params.insert("requester_id".into(), Value::from(id));
        }
        if !self.filters.is_empty() {
            params.insert("filters".into(), Value::Object(parse_filters(&self.filters)?));
        }
        Ok(params)
    }
}

/// `key=value` pairs into a filter object. Values that parse as JSON scalars
/// (`gate_id=2`, `security_alert=true`) keep their type; a repeated key
/// collects its values into an array.
pub fn parse_filters(pairs: &[String]) -> Result<serde_json::Map<String, Value>> {
    let mut filters = serde_json::Map::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .filter(|(k, _)| !k.trim().is_empty())
            .ok_or_else(|| {
                ExportError::invalid_parameters(format!(
                    "Filter '{}' must have the form key=value",
                    pair
                ))
            })?;
        let value = match serde_json::from_str::<Value>(raw.trim()) {
            Ok(v @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => v,
            _ => Value::String(raw.trim().to_string()),
        };

        match filters.get_mut(key.trim()) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                filters.insert(key.trim().to_string(), value);
            }
        }
    }
    Ok(filters)
}

#[derive(Debug, Clone, Parser)]
#[command(name = "danfe")]
#[command(about = "Generate the DANFE PDF of an NFe XML")]
pub struct DanfeCli {
    /// NFe or nfeProc XML file
    #[arg(long)]
    pub xml: PathBuf,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Overrides danfe.output_dir
    #[arg(long)]
    pub output_dir: Option<String>,

    /// A4 or A5; overrides danfe.page_format
    #[arg(long)]
    pub page_format: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl DanfeCli {
    pub fn load_config(&self) -> Result<ExportConfig> {
        let mut config = load_or_default(self.config.as_ref())?;
        if let Some(dir) = &self.output_dir {
            config.danfe.output_dir = dir.clone();
        }
        if let Some(format) = &self.page_format {
            config.danfe.page_format = format.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

fn load_or_default(path: Option<&PathBuf>) -> Result<ExportConfig> {
    match path {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path.display());
            ExportConfig::from_file(path)
        }
        None => Ok(ExportConfig::default()),
    }
}
