use serde::{Deserialize, Serialize};

use crate::classifier::Classification;
use crate::{PERMISSION_REQUIRED, UNKNOWN_SOFTWARE};

/// What the pipeline detected on screen.
///
/// Always well-formed: failure paths produce a degraded value with sentinel
/// software names and empty collections instead of an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextData {
    pub software: String,
    pub confidence: f64,
    pub panels: Vec<String>,
    pub ui_elements: Vec<String>,
    /// Prefix of the raw OCR text, original case, for diagnostics.
    pub text_content: String,
    /// Capture the result was computed from, empty if none was taken.
    pub screenshot_path: String,
}

impl ContextData {
    /// Assemble a result from a classification and the raw text it came from.
    pub fn from_classification(
        classification: Classification,
        raw_text: &str,
        text_limit: usize,
        screenshot_path: String,
    ) -> Self {
        Self {
            software: classification.software,
            confidence: classification.confidence,
            panels: classification.panels,
            ui_elements: classification.ui_elements,
            text_content: truncate_chars(raw_text, text_limit),
            screenshot_path,
        }
    }

    /// Fallback for any capture or extraction failure.
    pub fn unknown() -> Self {
        Self {
            software: UNKNOWN_SOFTWARE.to_string(),
            confidence: 0.0,
            panels: Vec::new(),
            ui_elements: Vec::new(),
            text_content: String::new(),
            screenshot_path: String::new(),
        }
    }

    /// Result when screen capture consent has not been granted.
    pub fn permission_required(explanation: impl Into<String>) -> Self {
        Self {
            software: PERMISSION_REQUIRED.to_string(),
            text_content: explanation.into(),
            ..Self::unknown()
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.software == UNKNOWN_SOFTWARE || self.software == PERMISSION_REQUIRED
    }
}

impl Default for ContextData {
    fn default() -> Self {
        Self::unknown()
    }
}

/// First `limit` characters of `text` (characters, not bytes).
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
