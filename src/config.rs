//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::DEFAULT_LANGUAGE;

/// Maximum number of characters of OCR text kept in `ContextData::text_content`.
pub const DEFAULT_TEXT_CONTENT_LIMIT: usize = 500;

/// Tesseract page segmentation mode: fully automatic, no OSD.
pub const DEFAULT_PAGE_SEGMENTATION_MODE: u8 = 3;

/// Longest a single tesseract invocation may run before it is killed.
pub const DEFAULT_OCR_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, PartialEq)]
pub struct ContextConfig {
    /// OCR language tag (tesseract traineddata name).
    pub language: String,
    pub text_content_limit: usize,
    /// Where screen captures are written.
    pub capture_dir: PathBuf,
    pub tesseract_path: Option<PathBuf>,
    pub tessdata_dir: Option<PathBuf>,
    pub page_segmentation_mode: u8,
    pub ocr_timeout: Duration,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            text_content_limit: DEFAULT_TEXT_CONTENT_LIMIT,
            capture_dir: default_capture_dir(),
            tesseract_path: None,
            tessdata_dir: None,
            page_segmentation_mode: DEFAULT_PAGE_SEGMENTATION_MODE,
            ocr_timeout: DEFAULT_OCR_TIMEOUT,
        }
    }
}

impl ContextConfig {
    /// Defaults with overrides from `CREATIVE_CONTEXT_LANG`,
    /// `CREATIVE_CONTEXT_CAPTURE_DIR`, `TESSERACT_PATH` and `TESSDATA_PREFIX`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(language) = non_empty("CREATIVE_CONTEXT_LANG") {
            config.language = language.trim().to_string();
        }
        if let Some(dir) = non_empty("CREATIVE_CONTEXT_CAPTURE_DIR") {
            config.capture_dir = PathBuf::from(dir);
        }
        if let Some(path) = non_empty("TESSERACT_PATH") {
            config.tesseract_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = non_empty("TESSDATA_PREFIX") {
            config.tessdata_dir = Some(PathBuf::from(dir));
        }
        config
    }
}

/// Base cache directory for everything this crate writes.
pub fn cache_root() -> PathBuf {
    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("creative-context")
}

pub fn default_capture_dir() -> PathBuf {
    cache_root().join("captures")
}
