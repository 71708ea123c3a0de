//! creative-context binary - screen context detection from the command line
//!
//! Runs the detection pipeline once (or periodically with `--watch`) and
//! prints each result as a `CONTEXT: {json}` line for host applications.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use creative_context::{Capture, ContextConfig, ContextData, ContextPipeline, PermissionGate};
use log::{info, warn};
use tokio::time::MissedTickBehavior;

// OCR dominates a run; anything past this is treated as stuck.
const RUN_TIMEOUT_SECS: u64 = 30;
const MIN_WATCH_SECS: u64 = 1;

enum Mode {
    Once,
    Watch(Duration),
    Instructions,
    OpenSettings,
}

fn usage() -> &'static str {
    "Usage: creative-context [--lang <tag>] [--watch <secs>] [--instructions] [--open-settings]"
}

fn parse_args(args: &[String], config: &mut ContextConfig) -> Result<Mode> {
    let mut mode = Mode::Once;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--lang" => {
                let lang = args.get(i + 1).context("--lang needs a language tag")?;
                config.language = lang.clone();
                i += 1;
            }
            "--watch" => {
                let secs: u64 = args
                    .get(i + 1)
                    .context("--watch needs an interval in seconds")?
                    .parse::<u64>()
                    .context("--watch interval must be a whole number of seconds")?;
                mode = Mode::Watch(Duration::from_secs(secs.max(MIN_WATCH_SECS)));
                i += 1;
            }
            "--instructions" => mode = Mode::Instructions,
            "--open-settings" => mode = Mode::OpenSettings,
            "--help" | "-h" => {
                println!("{}", usage());
                std::process::exit(0);
            }
            other => bail!("Unknown argument '{}'\n{}", other, usage()),
        }
        i += 1;
    }
    Ok(mode)
}

fn emit(context: &ContextData) -> Result<()> {
    println!("CONTEXT: {}", serde_json::to_string(context)?);
    Ok(())
}

async fn run_once(pipeline: &ContextPipeline) -> Result<ContextData> {
    let context = match tokio::time::timeout(
        Duration::from_secs(RUN_TIMEOUT_SECS),
        pipeline.capture_and_analyze_context(),
    )
    .await
    {
        Ok(context) => context,
        Err(_) => {
            warn!("Context detection timed out (> {}s)", RUN_TIMEOUT_SECS);
            ContextData::unknown()
        }
    };
    emit(&context)?;
    Ok(context)
}

/// Keep only the capture behind the latest emitted line.
fn rotate_capture(previous: &mut Option<Capture>, latest: &ContextData) {
    let current = (!latest.screenshot_path.is_empty())
        .then(|| Capture::new(&latest.screenshot_path));
    if let Some(stale) = std::mem::replace(previous, current) {
        if previous.as_ref() != Some(&stale) {
            stale.discard();
        }
    }
}

async fn watch(pipeline: &ContextPipeline, every: Duration) -> Result<()> {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Watching screen context every {}s (Ctrl-C to stop)", every.as_secs());
    let mut previous = None;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let context = run_once(pipeline).await?;
                rotate_capture(&mut previous, &context);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping context watch");
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let mut config = ContextConfig::from_env();
    let mode = parse_args(&args, &mut config)?;

    match mode {
        Mode::Instructions => {
            println!("{}", PermissionGate::system().instructions());
            Ok(())
        }
        Mode::OpenSettings => {
            PermissionGate::system().open_system_settings();
            Ok(())
        }
        Mode::Once => {
            let pipeline = ContextPipeline::new(config);
            let result = run_once(&pipeline).await.map(|_| ());
            pipeline.cleanup();
            result
        }
        Mode::Watch(every) => {
            let pipeline = ContextPipeline::new(config);
            let result = watch(&pipeline, every).await;
            pipeline.cleanup();
            result
        }
    }
}
