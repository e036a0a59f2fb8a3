use crate::utils::error::{ExportError, Result};
use chrono::{Local, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};

pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Output directory for generated files.
///
/// File names carry a one-second timestamp, so two exports with the same
/// prefix started within the same second resolve to the same path.
#[derive(Debug, Clone)]
pub struct ExportDirectory {
    base_dir: PathBuf,
}

impl ExportDirectory {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn ensure(&self) -> Result<()> {
        Self::ensure_directory(&self.base_dir)
    }

    pub fn ensure_directory(path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(|e| {
            ExportError::storage(
                format!("Failed to create export directory {}", path.display()),
                e,
            )
        })
    }

    /// `{base_dir}/{prefix}_{YYYYMMDD_HHMMSS}.{extension}` at the current local time.
    pub fn generate_path(&self, extension: &str, prefix: &str) -> PathBuf {
        self.generate_path_at(extension, prefix, Local::now().naive_local())
    }

    pub fn generate_path_at(&self, extension: &str, prefix: &str, at: NaiveDateTime) -> PathBuf {
        let filename = format!("{}_{}.{}", prefix, at.format(FILE_TIMESTAMP_FORMAT), extension);
        self.base_dir.join(filename)
    }

    pub fn get_size(&self, path: &Path) -> Result<u64> {
        fs::metadata(path).map(|m| m.len()).map_err(|e| {
            ExportError::storage(format!("Failed to read size of {}", path.display()), e)
        })
    }

    /// Best-effort removal of a file left behind by a failed render.
    pub fn remove_partial_output(&self, path: &Path) {
        if !path.exists() {
            return;
        }
        match fs::remove_file(path) {
            Ok(()) => tracing::info!("🧹 Removed partial output: {}", path.display()),
            Err(e) => tracing::warn!(
                "⚠️ Could not remove partial output {}: {}",
                path.display(),
                e
            ),
        }
    }
}

impl Default for ExportDirectory {
    fn default() -> Self {
        Self::new("data/exports")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    #[test]
    fn test_generate_path_layout() {
        let dir = ExportDirectory::new("data/exports");
        let at = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(8, 5, 9)
            .unwrap();

        let path = dir.generate_path_at("csv", "export", at);
        assert_eq!(path, PathBuf::from("data/exports/export_20240131_080509.csv"));
    }

    #[test]
    fn test_generate_path_uses_prefix_and_extension() {
        let dir = ExportDirectory::new("out");
        let path = dir.generate_path("pdf", "movements");
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("movements_"));
        assert!(name.ends_with(".pdf"));
        // prefix + '_' + 15 timestamp chars + ".pdf"
        assert_eq!(name.len(), "movements_".len() + 15 + 4);
    }

    #[test]
    fn test_ensure_directory_creates_nested_dirs() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b");
        ExportDirectory::ensure_directory(&nested).unwrap();
        assert!(nested.is_dir());
        // 已存在時不報錯
        ExportDirectory::ensure_directory(&nested).unwrap();
    }

    #[test]
    fn test_ensure_directory_fails_when_path_is_a_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("taken");
        fs::write(&file, b"x").unwrap();

        let err = ExportDirectory::ensure_directory(&file.join("sub")).unwrap_err();
        assert!(matches!(err, ExportError::Storage { .. }));
    }

    #[test]
    fn test_get_size() {
        let temp = TempDir::new().unwrap();
        let dir = ExportDirectory::new(temp.path());
        let file = temp.path().join("report.csv");
        fs::write(&file, b"a,b\n1,2\n").unwrap();

        assert_eq!(dir.get_size(&file).unwrap(), 8);
        let err = dir.get_size(&temp.path().join("missing.csv")).unwrap_err();
        assert!(matches!(err, ExportError::Storage { .. }));
    }

    #[test]
    fn test_remove_partial_output() {
        let temp = TempDir::new().unwrap();
        let dir = ExportDirectory::new(temp.path());
        let file = temp.path().join("partial.pdf");
        fs::write(&file, b"%PDF-1.4").unwrap();

        dir.remove_partial_output(&file);
        assert!(!file.exists());
        // 不存在的檔案直接略過
        dir.remove_partial_output(&file);
    }
}
