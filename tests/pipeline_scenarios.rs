use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use creative_context::{
    Capture, CaptureError, Catalogue, ConsentPlatform, ContextConfig, ContextData,
    ContextPipeline, OcrEngine, PermissionGate, Platform, Recognition, ScreenCapturer, Stage,
    TextExtractor, PERMISSION_REQUIRED, UNKNOWN_SOFTWARE,
};
use tempfile::tempdir;

struct Consent {
    granted: bool,
}

impl ConsentPlatform for Consent {
    fn platform(&self) -> Platform {
        Platform::MacOs
    }

    fn requires_consent(&self) -> bool {
        true
    }

    fn query_access(&self) -> creative_context::Result<bool> {
        Ok(self.granted)
    }

    fn probe_capture(&self, _output: &Path) -> creative_context::Result<()> {
        Ok(())
    }

    fn open_url(&self, _url: &str) -> creative_context::Result<()> {
        Ok(())
    }
}

/// Writes a placeholder file per capture, or fails when `broken`.
struct DiskCapturer {
    dir: PathBuf,
    broken: bool,
    calls: Arc<AtomicUsize>,
}

impl ScreenCapturer for DiskCapturer {
    fn capture(
        &self,
        on_before_hide: &dyn Fn(),
        on_after_show: &dyn Fn(),
    ) -> Result<Capture, CaptureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            return Err(CaptureError::Unsupported("no display".into()));
        }
        on_before_hide();
        let path = self.dir.join(format!("shot-{}.png", self.calls.load(Ordering::SeqCst)));
        std::fs::write(&path, b"png")?;
        on_after_show();
        Ok(Capture::new(path))
    }
}

struct FixedText {
    text: Option<String>,
    loads: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl OcrEngine for FixedText {
    fn initialize(&mut self, _language: &str) -> creative_context::Result<()> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn recognize(&mut self, image: &Path) -> creative_context::Result<Recognition> {
        assert!(image.exists(), "capture should be on disk");
        match &self.text {
            Some(text) => Ok(Recognition { text: text.clone() }),
            None => Err(creative_context::Error("unreadable image".into())),
        }
    }

    fn terminate(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    pipeline: ContextPipeline,
    captures: Arc<AtomicUsize>,
    loads: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
    dir: tempfile::TempDir,
}

fn harness(granted: bool, broken_capture: bool, text: Option<&str>) -> Harness {
    let dir = tempdir().expect("tempdir");
    let captures = Arc::new(AtomicUsize::new(0));
    let loads = Arc::new(AtomicUsize::new(0));
    let releases = Arc::new(AtomicUsize::new(0));

    let config = ContextConfig {
        capture_dir: dir.path().to_path_buf(),
        ..ContextConfig::default()
    };
    let gate = PermissionGate::new(Consent { granted }).with_probe_dir(dir.path());
    let capturer = DiskCapturer {
        dir: dir.path().to_path_buf(),
        broken: broken_capture,
        calls: Arc::clone(&captures),
    };
    let engine = FixedText {
        text: text.map(String::from),
        loads: Arc::clone(&loads),
        releases: Arc::clone(&releases),
    };
    let extractor = TextExtractor::new(engine, config.language.clone());

    Harness {
        pipeline: ContextPipeline::with_parts(
            gate,
            capturer,
            extractor,
            *Catalogue::builtin(),
            &config,
        ),
        captures,
        loads,
        releases,
        dir,
    }
}

#[tokio::test]
async fn premiere_screen_is_detected_with_full_confidence() {
    let h = harness(
        true,
        false,
        Some("Adobe Premiere Pro 2024\nTimeline: Sequence 01\nLumetri Color | Essential Graphics\nEffects  Program Monitor"),
    );

    let context = h.pipeline.capture_and_analyze_context().await;

    assert_eq!(context.software, "Adobe Premiere Pro");
    assert_eq!(context.confidence, 1.0);
    assert!(context.panels.iter().any(|p| p == "timeline"));
    assert!(context.panels.iter().any(|p| p == "lumetri color"));
    assert!(context.screenshot_path.ends_with(".png"));
    assert!(context.text_content.starts_with("Adobe Premiere Pro 2024"));
    assert_eq!(
        h.pipeline.last_trace(),
        vec![
            Stage::Idle,
            Stage::PermissionCheck,
            Stage::Capturing,
            Stage::Extracting,
            Stage::Classifying,
            Stage::Done,
        ]
    );
}

#[tokio::test]
async fn denied_permission_skips_capture() {
    let h = harness(false, false, Some("premiere"));

    let context = h.pipeline.capture_and_analyze_context().await;

    assert_eq!(context.software, PERMISSION_REQUIRED);
    assert_eq!(context.confidence, 0.0);
    assert!(context.panels.is_empty());
    assert!(context.ui_elements.is_empty());
    assert!(context.screenshot_path.is_empty());
    assert!(!context.text_content.is_empty());
    assert_eq!(h.captures.load(Ordering::SeqCst), 0);
    assert_eq!(h.loads.load(Ordering::SeqCst), 0);
    assert_eq!(
        h.pipeline.last_trace(),
        vec![Stage::Idle, Stage::PermissionCheck, Stage::Done]
    );
}

#[tokio::test]
async fn extraction_failure_yields_fully_degraded_result() {
    let h = harness(true, false, None);

    let context = h.pipeline.capture_and_analyze_context().await;

    assert_eq!(context, ContextData::unknown());
    assert_eq!(h.captures.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.pipeline.last_trace(),
        vec![
            Stage::Idle,
            Stage::PermissionCheck,
            Stage::Capturing,
            Stage::Extracting,
            Stage::Failed,
            Stage::Done,
        ]
    );
}

fn captures_on_disk(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .expect("read capture dir")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().map_or(false, |ext| ext == "png"))
        .count()
}

#[tokio::test]
async fn degraded_run_leaves_no_capture_behind() {
    let h = harness(true, false, None);

    let context = h.pipeline.capture_and_analyze_context().await;

    assert_eq!(context, ContextData::unknown());
    assert_eq!(h.captures.load(Ordering::SeqCst), 1);
    assert_eq!(captures_on_disk(h.dir.path()), 0);
}

#[tokio::test]
async fn successful_run_keeps_its_capture() {
    let h = harness(true, false, Some("figma frame"));

    let context = h.pipeline.capture_and_analyze_context().await;

    assert!(Path::new(&context.screenshot_path).exists());
    assert_eq!(captures_on_disk(h.dir.path()), 1);
}

#[tokio::test]
async fn capture_failure_matches_extraction_failure() {
    let h = harness(true, true, Some("premiere"));

    let context = h.pipeline.capture_and_analyze_context().await;

    assert_eq!(context.software, UNKNOWN_SOFTWARE);
    assert_eq!(context, ContextData::unknown());
    assert_eq!(h.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn long_text_is_truncated_in_original_case() {
    let text = format!("PREMIERE {}", "Ab".repeat(400));
    let h = harness(true, false, Some(&text));

    let context = h.pipeline.capture_and_analyze_context().await;

    assert_eq!(context.text_content.chars().count(), 500);
    assert_eq!(context.text_content, text.chars().take(500).collect::<String>());
    assert!(context.text_content.starts_with("PREMIERE"));
}

#[tokio::test]
async fn engine_loads_once_and_is_released_by_cleanup() {
    let h = harness(true, false, Some("figma"));

    for _ in 0..3 {
        h.pipeline.capture_and_analyze_context().await;
    }
    assert_eq!(h.loads.load(Ordering::SeqCst), 1);
    assert_eq!(h.releases.load(Ordering::SeqCst), 0);

    h.pipeline.cleanup();
    h.pipeline.cleanup();
    assert_eq!(h.releases.load(Ordering::SeqCst), 1);

    h.pipeline.capture_and_analyze_context().await;
    assert_eq!(h.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cleanup_before_any_run_is_harmless() {
    let h = harness(true, false, Some("figma"));
    h.pipeline.cleanup();
    assert_eq!(h.releases.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn context_serializes_for_hosts() {
    let h = harness(true, false, Some("Blender  Outliner  Properties"));

    let context = h.pipeline.capture_and_analyze_context().await;
    let json = serde_json::to_string(&context).expect("serialize");
    let back: ContextData = serde_json::from_str(&json).expect("deserialize");

    assert!(json.contains("\"software\""));
    assert!(json.contains("\"screenshot_path\""));
    assert_eq!(back, context);
}
