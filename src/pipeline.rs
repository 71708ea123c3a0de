//! Context pipeline: permission check → capture → OCR → classification.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use log::{debug, info, warn};
use tokio::task::{spawn_blocking, JoinError};

use crate::capture::{CommandCapturer, ScreenCapturer};
use crate::catalogue::Catalogue;
use crate::classifier::classify;
use crate::config::ContextConfig;
use crate::context::ContextData;
use crate::extractor::TextExtractor;
use crate::permission::PermissionGate;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    PermissionCheck,
    Capturing,
    Extracting,
    Classifying,
    Done,
    Failed,
}

/// Stages visited by one run.
#[derive(Debug)]
struct Trace {
    stages: Vec<Stage>,
}

impl Trace {
    fn new() -> Self {
        Self {
            stages: vec![Stage::Idle],
        }
    }

    fn current(&self) -> Stage {
        self.stages.last().copied().unwrap_or(Stage::Idle)
    }

    fn enter(&mut self, stage: Stage) {
        debug!("Context pipeline: {:?} -> {:?}", self.current(), stage);
        self.stages.push(stage);
    }
}

/// Screen context detection.
///
/// Each call to [`capture_and_analyze_context`](Self::capture_and_analyze_context)
/// is an independent run. Runs on the same pipeline are serialized, and the
/// OCR engine stays loaded between runs until [`cleanup`](Self::cleanup).
///
/// # Example
///
/// ```no_run
/// use creative_context::{ContextConfig, ContextPipeline};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() {
/// let pipeline = ContextPipeline::new(ContextConfig::default());
///
/// // Callers own the timeout policy.
/// match tokio::time::timeout(Duration::from_secs(10), pipeline.capture_and_analyze_context()).await {
///     Ok(context) => println!("{}: {:?}", context.software, context.panels),
///     Err(_) => eprintln!("context detection timed out"),
/// }
///
/// pipeline.cleanup();
/// # }
/// ```
pub struct ContextPipeline {
    gate: Arc<PermissionGate>,
    capturer: Arc<dyn ScreenCapturer>,
    extractor: Arc<TextExtractor>,
    catalogue: Catalogue,
    text_limit: usize,
    run_guard: tokio::sync::Mutex<()>,
    last_trace: Mutex<Vec<Stage>>,
}

impl ContextPipeline {
    /// Pipeline over the system permission gate, the platform capture tool
    /// and tesseract.
    pub fn new(config: ContextConfig) -> Self {
        Self::with_parts(
            PermissionGate::system(),
            CommandCapturer::new(config.capture_dir.clone()),
            TextExtractor::tesseract(&config),
            *Catalogue::builtin(),
            &config,
        )
    }

    pub fn with_parts(
        gate: PermissionGate,
        capturer: impl ScreenCapturer + 'static,
        extractor: TextExtractor,
        catalogue: Catalogue,
        config: &ContextConfig,
    ) -> Self {
        Self {
            gate: Arc::new(gate),
            capturer: Arc::new(capturer),
            extractor: Arc::new(extractor),
            catalogue,
            text_limit: config.text_content_limit,
            run_guard: tokio::sync::Mutex::new(()),
            last_trace: Mutex::new(Vec::new()),
        }
    }

    pub fn gate(&self) -> &PermissionGate {
        &self.gate
    }

    pub fn extractor(&self) -> &TextExtractor {
        &self.extractor
    }

    /// Stages the last completed run went through.
    pub fn last_trace(&self) -> Vec<Stage> {
        self.last_trace
            .lock()
            .map(|trace| trace.clone())
            .unwrap_or_default()
    }

    /// Detect the creative application on screen.
    ///
    /// Never fails: missing permission yields `"Permission Required"`, any
    /// capture or OCR failure yields the `"Unknown"` result.
    pub async fn capture_and_analyze_context(&self) -> ContextData {
        let _run = self.run_guard.lock().await;
        let started = Instant::now();
        let mut trace = Trace::new();

        trace.enter(Stage::PermissionCheck);
        let context = if !self.permitted().await {
            warn!("Screen capture permission not granted; skipping capture");
            ContextData::permission_required(self.gate.instructions())
        } else {
            match self.detect(&mut trace).await {
                Ok(context) => context,
                Err(e) => {
                    warn!("Context detection failed while {:?}: {}", trace.current(), e);
                    trace.enter(Stage::Failed);
                    ContextData::unknown()
                }
            }
        };
        trace.enter(Stage::Done);

        info!(
            "Context: {} ({:.0}% confidence, {} panels, {} elements) in {}ms",
            context.software,
            context.confidence * 100.0,
            context.panels.len(),
            context.ui_elements.len(),
            started.elapsed().as_millis()
        );
        if let Ok(mut last) = self.last_trace.lock() {
            *last = trace.stages;
        }
        context
    }

    async fn permitted(&self) -> bool {
        let gate = Arc::clone(&self.gate);
        match spawn_blocking(move || gate.ensure_permission()).await {
            Ok(granted) => granted,
            Err(e) => {
                warn!("Permission check worker failed: {}", e);
                false
            }
        }
    }

    async fn detect(&self, trace: &mut Trace) -> Result<ContextData> {
        let session = self.extractor.session();

        trace.enter(Stage::Capturing);
        let capturer = Arc::clone(&self.capturer);
        // Window management belongs to the host; nothing to hide here.
        let capture = spawn_blocking(move || capturer.capture(&|| {}, &|| {}))
            .await
            .map_err(worker_failed)??;
        let screenshot_path = capture.display_path();

        trace.enter(Stage::Extracting);
        let extractor = Arc::clone(&self.extractor);
        let held = capture.clone();
        let extracted = spawn_blocking(move || extractor.extract_in_session(session, capture))
            .await
            .map_err(worker_failed)
            .and_then(|result| result);
        let text = match extracted {
            Ok(text) => text,
            Err(e) => {
                // Nothing refers to the image once the result is degraded.
                held.discard();
                return Err(e);
            }
        };

        trace.enter(Stage::Classifying);
        let classification = classify(&text, &self.catalogue);

        Ok(ContextData::from_classification(
            classification,
            &text,
            self.text_limit,
            screenshot_path,
        ))
    }

    /// Release the OCR engine. Safe to call when it was never loaded.
    ///
    /// Never waits on a run abandoned by a caller timeout: its engine is
    /// released as soon as its OCR call returns.
    pub fn cleanup(&self) {
        self.extractor.shutdown();
    }
}

fn worker_failed(e: JoinError) -> crate::Error {
    crate::Error(format!("Pipeline worker failed: {}", e))
}
