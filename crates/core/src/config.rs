use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::content::ContentType;
use crate::language::Language;
use crate::mode::{EngineMode, PageSegMode};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid language tag: '{0}'")]
    InvalidLanguage(String),
    #[error("Invalid page segmentation mode: {0}")]
    InvalidPageSegMode(i32),
    #[error("No writable data directory available on this platform")]
    NoDataDir,
}

/// Everything a translate call needs to know about the document and engine.
///
/// Loaded from TOML; every key is optional:
///
/// ```toml
/// content_type = "bank_card"
/// language = "num"
/// page_seg_mode = 7
/// engine_mode = "cube_only"
/// download_dir = "/var/lib/cardscan/downloads"
/// bundle_dir = "/usr/share/cardscan/tessdata"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub content_type: ContentType,
    pub language: Language,
    pub page_seg_mode: PageSegMode,
    pub engine_mode: EngineMode,
    /// Writable directory holding `tessdata/`. Falls back to the platform data dir.
    pub download_dir: Option<PathBuf>,
    /// Read-only directory the trained-data blobs are staged from.
    pub bundle_dir: Option<PathBuf>,
    /// Reject bank-card token pairs that are not all ASCII digits.
    pub strict_pan_digits: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            content_type: ContentType::default(),
            language: Language::default(),
            page_seg_mode: PageSegMode::default(),
            engine_mode: EngineMode::default(),
            download_dir: None,
            bundle_dir: None,
            strict_pan_digits: false,
        }
    }
}

impl OcrConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// The explicit `download_dir`, or `<platform data dir>/downloads`.
    pub fn resolve_download_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.download_dir {
            return Ok(dir.clone());
        }
        let project_dirs = directories::ProjectDirs::from("com", "cardscan", "CardScan")
            .ok_or(ConfigError::NoDataDir)?;
        Ok(project_dirs.data_dir().join("downloads"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = OcrConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, OcrConfig::default());
        assert_eq!(cfg.language.as_str(), "eng");
        assert_eq!(cfg.page_seg_mode, PageSegMode::SparseText);
    }

    #[test]
    fn parses_full_config() {
        let cfg = OcrConfig::from_toml_str(
            r#"
            content_type = "bank_card"
            language = "num"
            page_seg_mode = 7
            engine_mode = "tesseract_only"
            download_dir = "/tmp/dl"
            strict_pan_digits = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.content_type, ContentType::BankCard);
        assert_eq!(cfg.language, Language::num());
        assert_eq!(cfg.page_seg_mode, PageSegMode::SingleLine);
        assert_eq!(cfg.engine_mode, EngineMode::TesseractOnly);
        assert_eq!(cfg.download_dir, Some(PathBuf::from("/tmp/dl")));
        assert!(cfg.strict_pan_digits);
    }

    #[test]
    fn rejects_bad_language_and_mode() {
        assert!(OcrConfig::from_toml_str(r#"language = "../etc""#).is_err());
        assert!(OcrConfig::from_toml_str("page_seg_mode = 42").is_err());
    }

    #[test]
    fn explicit_download_dir_wins() {
        let cfg = OcrConfig {
            download_dir: Some(PathBuf::from("/data/app")),
            ..OcrConfig::default()
        };
        assert_eq!(cfg.resolve_download_dir().unwrap(), PathBuf::from("/data/app"));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ocr.toml");
        std::fs::write(&path, "content_type = \"id_card\"\nlanguage = \"chi_sim\"\n").unwrap();
        let cfg = OcrConfig::load(&path).unwrap();
        assert_eq!(cfg.content_type, ContentType::IdCard);
        assert!(cfg.language.needs_vertical());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = OcrConfig::load(Path::new("/nonexistent/ocr.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
