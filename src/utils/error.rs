use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Invalid export parameters: {message}")]
    InvalidParameters { message: String },

    #[error("No records found for the period {start} to {end}")]
    NoDataFound { start: String, end: String },

    #[error("No renderer registered for file type '{format}'")]
    UnsupportedFileType { format: String },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Failed to render {format} file: {source}")]
    Render {
        format: String,
        #[source]
        source: Box<ExportError>,
    },

    #[error("Export failed: {message}")]
    Pipeline { message: String },

    #[error("Record source error: {message}")]
    Source { message: String },

    #[error("Invalid data for export: {message}")]
    InvalidData { message: String },

    #[error("Invalid NFe document: {message}")]
    InvalidNfe { message: String },

    #[error("NFe XML file not found: {path}")]
    NfeNotFound { path: String },

    #[error("Configuration error in '{field}': {message}")]
    Config { field: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV processing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Data,
    Storage,
    Rendering,
    Configuration,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Process exit code used by the binaries.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,    // 警告，但成功
            ErrorSeverity::Medium => 2, // 重試錯誤
            ErrorSeverity::High => 1,   // 處理錯誤
            ErrorSeverity::Critical => 3,
        }
    }
}

impl ExportError {
    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        Self::InvalidParameters {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Keeps the error kinds callers are expected to branch on and folds every
    /// lower-level failure into [`ExportError::Pipeline`].
    pub fn into_boundary(self) -> Self {
        match self {
            e @ (Self::InvalidParameters { .. }
            | Self::NoDataFound { .. }
            | Self::UnsupportedFileType { .. }
            | Self::Storage { .. }
            | Self::Render { .. }
            | Self::Pipeline { .. }
            | Self::InvalidNfe { .. }
            | Self::NfeNotFound { .. }) => e,
            other => Self::Pipeline {
                message: other.to_string(),
            },
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidParameters { .. } | Self::InvalidNfe { .. } => ErrorCategory::Validation,
            Self::NoDataFound { .. } | Self::InvalidData { .. } | Self::Source { .. } => {
                ErrorCategory::Data
            }
            Self::Storage { .. } | Self::Io(_) | Self::NfeNotFound { .. } => ErrorCategory::Storage,
            Self::Render { .. } | Self::Csv(_) | Self::Serialization(_) => ErrorCategory::Rendering,
            Self::UnsupportedFileType { .. } | Self::Config { .. } => ErrorCategory::Configuration,
            Self::Pipeline { .. } => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 查無資料是正常結果，不視為失敗
            Self::NoDataFound { .. } => ErrorSeverity::Low,
            Self::Source { .. } => ErrorSeverity::Medium,
            Self::InvalidParameters { .. }
            | Self::UnsupportedFileType { .. }
            | Self::InvalidData { .. }
            | Self::InvalidNfe { .. }
            | Self::NfeNotFound { .. }
            | Self::Config { .. }
            | Self::Render { .. }
            | Self::Csv(_)
            | Self::Serialization(_) => ErrorSeverity::High,
            Self::Storage { .. } | Self::Io(_) | Self::Pipeline { .. } => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::InvalidParameters { message } => format!("The export request is invalid: {}", message),
            Self::NoDataFound { start, end } => {
                format!("There are no movements to export between {} and {}", start, end)
            }
            Self::UnsupportedFileType { format } => {
                format!("Exporting to '{}' is not available in this installation", format)
            }
            Self::Render { format, .. } => format!("The {} file could not be generated", format),
            Self::NfeNotFound { path } => format!("The NFe file '{}' does not exist", path),
            Self::InvalidNfe { .. } => "The NFe XML could not be read".to_string(),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::InvalidParameters { .. } => {
                "Provide file_type (csv, pdf, xlsx, json) and dates as YYYY-MM-DD with start <= end"
            }
            Self::NoDataFound { .. } => "Widen the date range or relax the filters",
            Self::UnsupportedFileType { .. } => "Choose one of the formats with a registered renderer",
            Self::Storage { .. } | Self::Io(_) => {
                "Check that the output directory exists and is writable"
            }
            Self::Render { .. } | Self::Csv(_) | Self::Serialization(_) => {
                "Check the records for unexpected values and try again"
            }
            Self::InvalidData { .. } => "Make sure the record source returns at least one record",
            Self::Source { .. } => "Check that the record source is reachable and well formed",
            Self::InvalidNfe { .. } | Self::NfeNotFound { .. } => {
                "Point to an authorized NFe XML (NFe or nfeProc root element)"
            }
            Self::Config { .. } => "Fix the configuration value and run again",
            Self::Pipeline { .. } => "Run again with --verbose and inspect the logs",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_boundary_keeps_typed_errors() {
        let err = ExportError::invalid_parameters("missing file_type").into_boundary();
        assert!(matches!(err, ExportError::InvalidParameters { .. }));

        let err = ExportError::NoDataFound {
            start: "2024-01-01".into(),
            end: "2024-01-31".into(),
        }
        .into_boundary();
        assert!(matches!(err, ExportError::NoDataFound { .. }));
    }

    #[test]
    fn test_into_boundary_wraps_low_level_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ExportError::Io(io).into_boundary();
        match err {
            ExportError::Pipeline { message } => assert!(message.contains("denied")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_no_data_is_low_severity() {
        let err = ExportError::NoDataFound {
            start: "2024-01-01".into(),
            end: "2024-01-02".into(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert_eq!(err.category(), ErrorCategory::Data);
        assert_eq!(err.severity().exit_code(), 0);
    }

    #[test]
    fn test_render_error_message_includes_cause() {
        let err = ExportError::Render {
            format: "csv".into(),
            source: Box::new(ExportError::InvalidData {
                message: "no records".into(),
            }),
        };
        assert_eq!(
            err.to_string(),
            "Failed to render csv file: Invalid data for export: no records"
        );
        assert_eq!(err.severity(), ErrorSeverity::High);
    }
}
