pub mod danfe;
pub mod export;
pub mod paths;
pub mod validator;

pub use crate::domain::model::{ExportFormat, ExportOutcome, ExportRequest, Record};
pub use crate::domain::ports::{RecordSource, Renderer};
pub use crate::utils::error::Result;
