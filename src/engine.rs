use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::{ContextConfig, DEFAULT_OCR_TIMEOUT, DEFAULT_PAGE_SEGMENTATION_MODE};
use crate::model::ensure_language_data;
use crate::Result;

/// Text recognized in one image.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Recognition {
    pub text: String,
}

/// An OCR engine with an explicit lifecycle.
///
/// `initialize` loads the language model, `recognize` may only be called
/// afterwards, and `terminate` releases everything so that `initialize` can
/// run again.
pub trait OcrEngine: Send {
    fn initialize(&mut self, language: &str) -> Result<()>;

    fn recognize(&mut self, image: &Path) -> Result<Recognition>;

    fn terminate(&mut self);
}

#[derive(Debug, Clone)]
struct Loaded {
    executable: PathBuf,
    tessdata: PathBuf,
    language: String,
}

/// OCR through the `tesseract` command line tool.
///
/// # Example
///
/// ```no_run
/// use creative_context::{OcrEngine, TesseractEngine};
/// use std::path::Path;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut engine = TesseractEngine::new();
/// engine.initialize("eng")?;
/// let recognition = engine.recognize(Path::new("screen.png"))?;
/// println!("{}", recognition.text);
/// engine.terminate();
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    executable_override: Option<PathBuf>,
    tessdata_override: Option<PathBuf>,
    page_segmentation_mode: u8,
    timeout: Duration,
    loaded: Option<Loaded>,
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TesseractEngine {
    pub fn new() -> Self {
        Self {
            executable_override: None,
            tessdata_override: None,
            page_segmentation_mode: DEFAULT_PAGE_SEGMENTATION_MODE,
            timeout: DEFAULT_OCR_TIMEOUT,
            loaded: None,
        }
    }

    pub fn from_config(config: &ContextConfig) -> Self {
        Self {
            executable_override: config.tesseract_path.clone(),
            tessdata_override: config.tessdata_dir.clone(),
            page_segmentation_mode: config.page_segmentation_mode,
            timeout: config.ocr_timeout,
            loaded: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn language(&self) -> Option<&str> {
        self.loaded.as_ref().map(|l| l.language.as_str())
    }
}

impl OcrEngine for TesseractEngine {
    fn initialize(&mut self, language: &str) -> Result<()> {
        let executable = find_tesseract_executable(self.executable_override.as_deref())?;
        let tessdata = ensure_language_data(language, self.tessdata_override.as_deref())?;

        info!(
            "Tesseract ready: {} (language {}, data in {})",
            executable.display(),
            language,
            tessdata.display()
        );
        self.loaded = Some(Loaded {
            executable,
            tessdata,
            language: language.to_string(),
        });
        Ok(())
    }

    fn recognize(&mut self, image: &Path) -> Result<Recognition> {
        let loaded = self
            .loaded
            .as_ref()
            .ok_or_else(|| crate::Error("OCR engine not initialized".into()))?;

        let mut command = Command::new(&loaded.executable);
        command
            .arg(image)
            .arg("stdout")
            .arg("--tessdata-dir")
            .arg(&loaded.tessdata)
            .arg("-l")
            .arg(&loaded.language)
            .arg("--psm")
            .arg(self.page_segmentation_mode.to_string())
            .env("OMP_THREAD_LIMIT", thread_budget().to_string());
        let output = run_with_deadline(command, "tesseract", self.timeout)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(crate::Error(format!("Tesseract failed: {}", stderr.trim())));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("Tesseract recognized {} characters", text.chars().count());
        Ok(Recognition { text })
    }

    fn terminate(&mut self) {
        if self.loaded.take().is_some() {
            debug!("Tesseract engine released");
        }
    }
}

/// Threads tesseract may use: half the cores, at least one.
fn thread_budget() -> usize {
    (num_cpus::get() / 2).max(1)
}

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Run `command` to completion, killing it once `timeout` has passed.
fn run_with_deadline(mut command: Command, tool: &str, timeout: Duration) -> Result<Output> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| crate::Error(format!("Failed to run {}: {}", tool, e)))?;

    // Pipes are drained on their own threads so a chatty child cannot stall.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                warn!("{} exceeded {}ms and was killed", tool, timeout.as_millis());
                return Err(crate::Error(format!(
                    "{} timed out after {}ms",
                    tool,
                    timeout.as_millis()
                )));
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    };

    Ok(Output {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer);
        }
        buffer
    })
}

/// Finds the Tesseract executable: explicit override, then PATH, then common install paths
pub fn find_tesseract_executable(preferred: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = preferred {
        if runs_version(path) {
            return Ok(path.to_path_buf());
        }
        return Err(crate::Error(format!(
            "Configured tesseract at {} could not be run",
            path.display()
        )));
    }

    let on_path = PathBuf::from("tesseract");
    if runs_version(&on_path) {
        return Ok(on_path);
    }

    let common_paths: &[&str] = if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Tesseract-OCR\tesseract.exe",
            r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
        ]
    } else {
        &[
            "/opt/homebrew/bin/tesseract",
            "/usr/local/bin/tesseract",
            "/opt/local/bin/tesseract",
            "/usr/bin/tesseract",
        ]
    };

    common_paths
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists() && runs_version(p))
        .ok_or_else(|| crate::Error("Tesseract not found. Please install Tesseract-OCR.".into()))
}

fn runs_version(executable: &Path) -> bool {
    Command::new(executable)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
