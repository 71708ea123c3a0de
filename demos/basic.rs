//! Basic context detection example - the simplest possible usage
//!
//! This example shows the minimum code needed to detect the creative app on screen.
//! Run with: `cargo run --example basic`

use creative_context::{classify, Catalogue, ContextConfig, ContextPipeline};

#[tokio::main]
async fn main() {
    // Classification alone is pure: no capture or OCR needed.
    let offline = classify(
        "Premiere Pro - Timeline: Sequence 01 | Lumetri Color",
        Catalogue::builtin(),
    );
    println!(
        "Offline sample: {} ({:.0}%)",
        offline.software,
        offline.confidence * 100.0
    );

    // Full pipeline: permission check, screen capture, OCR, classification.
    let pipeline = ContextPipeline::new(ContextConfig::from_env());

    println!("Capturing screen context...");
    let context = pipeline.capture_and_analyze_context().await;

    println!("Software:    {}", context.software);
    println!("Confidence:  {:.2}", context.confidence);
    println!("Panels:      {:?}", context.panels);
    println!("UI elements: {:?}", context.ui_elements);
    println!("Screenshot:  {}", context.screenshot_path);

    if context.software == creative_context::PERMISSION_REQUIRED {
        println!("\n{}", pipeline.gate().instructions());
    }

    // Release the OCR engine when done
    pipeline.cleanup();
}
