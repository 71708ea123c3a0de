//! Screen capture to a PNG file the OCR engine can read.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::{fmt, fs, io};

use uuid::Uuid;

#[derive(Debug)]
pub enum CaptureError {
    Unsupported(String),
    CommandFailed {
        tool: String,
        status: Option<i32>,
        stderr: String,
    },
    MissingOutput(PathBuf),
    Io(io::Error),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Unsupported(reason) => {
                write!(formatter, "screen capture unsupported: {reason}")
            }
            CaptureError::CommandFailed {
                tool,
                status,
                stderr,
            } => {
                let code = status.map_or("unknown".to_string(), |value| value.to_string());
                write!(formatter, "{tool} failed (status={code}) {stderr}")
            }
            CaptureError::MissingOutput(path) => {
                write!(formatter, "capture produced no file at {}", path.display())
            }
            CaptureError::Io(error) => write!(formatter, "io error: {error}"),
        }
    }
}

impl std::error::Error for CaptureError {}

impl From<io::Error> for CaptureError {
    fn from(error: io::Error) -> Self {
        CaptureError::Io(error)
    }
}

impl From<CaptureError> for crate::Error {
    fn from(error: CaptureError) -> Self {
        crate::Error(format!("Capture failed: {error}"))
    }
}

/// A just-taken screen capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    path: PathBuf,
}

impl Capture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn display_path(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Delete the image. Best-effort: failures are only logged.
    pub fn discard(self) {
        match fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Discarded capture {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::debug!("Could not remove capture {}: {}", self.path.display(), e),
        }
    }
}

/// Produces a still image of the current screen.
///
/// `on_before_hide` runs right before the screen is grabbed and
/// `on_after_show` right after, so a host can hide its own windows.
pub trait ScreenCapturer: Send + Sync {
    fn capture(
        &self,
        on_before_hide: &dyn Fn(),
        on_after_show: &dyn Fn(),
    ) -> Result<Capture, CaptureError>;
}

/// Captures the main display with the platform's command line tool.
#[derive(Debug, Clone)]
pub struct CommandCapturer {
    output_dir: PathBuf,
}

impl CommandCapturer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl ScreenCapturer for CommandCapturer {
    fn capture(
        &self,
        on_before_hide: &dyn Fn(),
        on_after_show: &dyn Fn(),
    ) -> Result<Capture, CaptureError> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self
            .output_dir
            .join(format!("capture-{}.png", Uuid::new_v4()));

        on_before_hide();
        let result = capture_full_screen(&path);
        on_after_show();
        result?;

        if !path.exists() {
            return Err(CaptureError::MissingOutput(path));
        }
        log::debug!("Captured screen to {}", path.display());
        Ok(Capture::new(path))
    }
}

#[cfg(target_os = "macos")]
fn capture_full_screen(output_path: &Path) -> Result<(), CaptureError> {
    // -x: no sound
    run_tool("screencapture", &[OsStr::new("-x"), output_path.as_os_str()])
}

#[cfg(target_os = "linux")]
fn capture_full_screen(output_path: &Path) -> Result<(), CaptureError> {
    let path = output_path.as_os_str();
    let candidates: [(&str, Vec<&OsStr>); 4] = [
        ("grim", vec![path]),
        ("gnome-screenshot", vec![OsStr::new("-f"), path]),
        ("scrot", vec![OsStr::new("-o"), path]),
        ("import", vec![OsStr::new("-window"), OsStr::new("root"), path]),
    ];

    let mut last_error = None;
    for (tool, args) in candidates.iter() {
        match run_tool(tool, args) {
            Ok(()) if output_path.exists() => return Ok(()),
            Ok(()) => last_error = Some(CaptureError::MissingOutput(output_path.to_path_buf())),
            Err(CaptureError::Io(e)) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                log::debug!("{tool} could not capture the screen: {e}");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        CaptureError::Unsupported(
            "no screenshot tool found (tried grim, gnome-screenshot, scrot, import)".to_string(),
        )
    }))
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn capture_full_screen(_output_path: &Path) -> Result<(), CaptureError> {
    Err(CaptureError::Unsupported(format!(
        "no capture backend for {}",
        std::env::consts::OS
    )))
}

#[cfg(any(target_os = "macos", target_os = "linux"))]
fn run_tool(tool: &str, args: &[&OsStr]) -> Result<(), CaptureError> {
    let output = Command::new(tool).args(args).output()?;
    if !output.status.success() {
        return Err(CaptureError::CommandFailed {
            tool: tool.to_string(),
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::tempdir;

    #[test]
    fn command_failed_display_includes_status_and_stderr() {
        let error = CaptureError::CommandFailed {
            tool: "screencapture".to_string(),
            status: Some(1),
            stderr: "could not create image".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "screencapture failed (status=1) could not create image"
        );

        let unknown = CaptureError::CommandFailed {
            tool: "grim".to_string(),
            status: None,
            stderr: String::new(),
        };
        assert!(unknown.to_string().contains("status=unknown"));
    }

    #[test]
    fn capture_error_converts_to_crate_error() {
        let error: crate::Error = CaptureError::Unsupported("headless".to_string()).into();
        assert!(error.0.contains("headless"));
    }

    #[test]
    fn discard_removes_file_and_tolerates_missing() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("capture-old.png");
        fs::write(&path, b"png").expect("write");

        Capture::new(&path).discard();
        assert!(!path.exists());

        Capture::new(&path).discard();
    }

    #[test]
    fn command_capturer_runs_callbacks_around_capture() {
        let dir = tempdir().expect("tempdir");
        let capturer = CommandCapturer::new(dir.path().join("captures"));
        let before = Cell::new(0);
        let after = Cell::new(0);

        let result = capturer.capture(&|| before.set(before.get() + 1), &|| {
            after.set(after.get() + 1)
        });

        // Headless CI has no display; only check the contract holds either way.
        assert_eq!(before.get(), 1);
        assert_eq!(after.get(), 1);
        assert!(capturer.output_dir().exists());
        if let Ok(capture) = result {
            assert!(capture.path().exists());
            assert!(capture.display_path().ends_with(".png"));
        }
    }
}
