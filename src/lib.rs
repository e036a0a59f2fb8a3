pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, DanfeCli};

pub use adapters::{InMemorySource, JsonFileSource, NfeXmlParser};
pub use config::ExportConfig;
pub use self::core::{danfe::GenerateDanfe, export::ExportPipeline, paths::ExportDirectory};
pub use domain::model::{ExportFormat, ExportOutcome, Record};
pub use utils::error::{ExportError, Result};
