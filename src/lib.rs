//! # creative-context
//!
//! **Detect which creative application is on screen.**
//!
//! Captures the screen, extracts its text with OCR, and classifies which
//! creative tool (video editor, image editor, audio tool, ...) the user is
//! working in, along with the panels and controls that are visible.
//!
//! ## Quick Example
//!
//! ```no_run
//! use creative_context::{ContextConfig, ContextPipeline};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let pipeline = ContextPipeline::new(ContextConfig::from_env());
//! let context = pipeline.capture_and_analyze_context().await;
//! println!("{} ({:.0}%)", context.software, context.confidence * 100.0);
//! pipeline.cleanup();
//! # }
//! ```
//!
//! ## Pipeline
//!
//! permission check → capture → OCR → classify → [`ContextData`]
//!
//! The pipeline never fails: every failure is logged and turned into a
//! degraded [`ContextData`] (`"Permission Required"` or `"Unknown"`).
//!
//! ## OCR
//!
//! Text extraction uses the `tesseract` command line tool. Language data is
//! looked up in the usual tessdata locations and downloaded to the cache
//! directory on first use when missing.

pub mod capture;
pub mod catalogue;
pub mod classifier;
pub mod config;
pub mod context;
pub mod engine;
pub mod extractor;
pub mod model;
pub mod permission;
pub mod pipeline;

pub use capture::{Capture, CaptureError, CommandCapturer, ScreenCapturer};
pub use catalogue::{Catalogue, SoftwareSignature};
pub use classifier::{classify, Classification};
pub use config::ContextConfig;
pub use context::ContextData;
pub use engine::{OcrEngine, Recognition, TesseractEngine};
pub use extractor::TextExtractor;
pub use permission::{ConsentPlatform, PermissionGate, Platform, SystemConsent};
pub use pipeline::{ContextPipeline, Stage};

/// Software name reported when no signature matches.
pub const UNKNOWN_SOFTWARE: &str = "Unknown";

/// Software name reported when screen capture consent is missing.
pub const PERMISSION_REQUIRED: &str = "Permission Required";

/// Default OCR language tag.
pub const DEFAULT_LANGUAGE: &str = "eng";

/// Error raised by the pipeline's building blocks.
///
/// Carries a human-readable message. The pipeline itself never returns it:
/// [`ContextPipeline::capture_and_analyze_context`] logs it and degrades.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error(pub String);

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error(format!("{} ({:?})", e, e.kind()))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
