//! Signal classifier: decides which application, panels and controls are on
//! screen from raw OCR text.
//!
//! Matching is plain case-insensitive substring containment. A keyword that
//! appears inside a longer token still counts.

use crate::catalogue::Catalogue;
use crate::UNKNOWN_SOFTWARE;

/// Result of classifying one piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub software: String,
    /// Fraction of the winning signature's keywords found, in `[0, 1]`.
    pub confidence: f64,
    pub panels: Vec<String>,
    pub ui_elements: Vec<String>,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            software: UNKNOWN_SOFTWARE.to_string(),
            confidence: 0.0,
            panels: Vec::new(),
            ui_elements: Vec::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.software == UNKNOWN_SOFTWARE
    }
}

/// Classify `text` against `catalogue`.
///
/// Each signature scores `matched / total` keywords. The strictly highest
/// score wins and ties keep the signature declared first. If nothing scores
/// above zero the software is `"Unknown"` with confidence `0`.
///
/// Panels and elements are scanned independently of the software scoring,
/// each reported once in catalogue order.
pub fn classify(text: &str, catalogue: &Catalogue) -> Classification {
    let lowered = text.to_lowercase();

    let mut best: Option<(&str, f64)> = None;
    for signature in catalogue.signatures {
        if signature.keywords.is_empty() {
            continue;
        }
        let matched = signature
            .keywords
            .iter()
            .filter(|keyword| lowered.contains(*keyword))
            .count();
        let score = matched as f64 / signature.keywords.len() as f64;

        let beats_best = match best {
            Some((_, best_score)) => score > best_score,
            None => score > 0.0,
        };
        if beats_best {
            best = Some((signature.name, score));
        }
    }

    let (software, confidence) = match best {
        Some((name, score)) => (name.to_string(), score.clamp(0.0, 1.0)),
        None => (UNKNOWN_SOFTWARE.to_string(), 0.0),
    };

    Classification {
        software,
        confidence,
        panels: present_in(&lowered, catalogue.panels),
        ui_elements: present_in(&lowered, catalogue.elements),
    }
}

fn present_in(lowered: &str, phrases: &[&str]) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for phrase in phrases {
        if lowered.contains(phrase) && !found.iter().any(|f| f == phrase) {
            found.push(phrase.to_string());
        }
    }
    found
}
