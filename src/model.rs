//! OCR language data management and automatic downloading

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};

use crate::Result;

const TESSDATA_BASE_URL: &str = "https://github.com/tesseract-ocr/tessdata_fast/raw/main";

/// Directory language data is downloaded to when no installed copy exists.
pub fn default_tessdata_dir() -> PathBuf {
    crate::config::cache_root().join("tessdata")
}

/// File name of the language data for `language` (e.g. `eng.traineddata`).
pub fn traineddata_file(language: &str) -> String {
    format!("{}.traineddata", language)
}

/// Language tags are tesseract data names like `eng`, `chi_sim` or `deu_latf`.
pub fn is_valid_language(language: &str) -> bool {
    !language.is_empty()
        && language
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Well-known tessdata locations of system installs.
pub fn system_tessdata_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();

    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let prefix = PathBuf::from(prefix);
        dirs.push(prefix.join("tessdata"));
        dirs.push(prefix);
    }

    let known: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/opt/homebrew/share/tessdata",
            "/usr/local/share/tessdata",
            "/opt/local/share/tessdata",
        ]
    } else if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Tesseract-OCR\tessdata",
            r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
        ]
    } else {
        &[
            "/usr/share/tesseract-ocr/5/tessdata",
            "/usr/share/tesseract-ocr/4.00/tessdata",
            "/usr/share/tessdata",
            "/usr/local/share/tessdata",
        ]
    };
    dirs.extend(known.iter().map(PathBuf::from));
    dirs
}

/// Find a directory holding `language`'s traineddata.
///
/// `preferred` is searched first, then the system locations, then the
/// download cache.
pub fn find_language_data(language: &str, preferred: Option<&Path>) -> Option<PathBuf> {
    let file = traineddata_file(language);
    preferred
        .map(Path::to_path_buf)
        .into_iter()
        .chain(system_tessdata_dirs())
        .chain(std::iter::once(default_tessdata_dir()))
        .find(|dir| dir.join(&file).is_file())
}

/// Ensure the language data exists, downloading it if necessary.
///
/// Returns the tessdata directory to hand to tesseract.
pub fn ensure_language_data(language: &str, preferred: Option<&Path>) -> Result<PathBuf> {
    if !is_valid_language(language) {
        return Err(crate::Error(format!("Invalid OCR language tag: {:?}", language)));
    }

    if let Some(dir) = find_language_data(language, preferred) {
        debug!("Using {} from {}", traineddata_file(language), dir.display());
        return Ok(dir);
    }

    let dest_dir = default_tessdata_dir();
    download_language_data(&dest_dir, language)?;
    Ok(dest_dir)
}

fn download_language_data(dest_dir: &Path, language: &str) -> Result<()> {
    fs::create_dir_all(dest_dir)
        .map_err(|e| crate::Error(format!("Failed to create tessdata directory: {}", e)))?;

    let file = traineddata_file(language);
    let url = format!("{}/{}", TESSDATA_BASE_URL, file);
    let dest = dest_dir.join(&file);
    // Partial downloads never land under the final name.
    let partial = dest_dir.join(format!("{}.part", file));

    info!(
        "No installed {} found; downloading it once from {} to {}",
        file,
        url,
        dest.display()
    );

    let bytes = match download_file(&url, &partial) {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }
    };
    fs::rename(&partial, &dest)
        .map_err(|e| crate::Error(format!("Failed to install language data: {}", e)))?;

    info!("Language data installed ({} bytes)", bytes);
    Ok(())
}

/// Fetch `url` into `dest`, returning the number of bytes written.
fn download_file(url: &str, dest: &Path) -> Result<u64> {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(30))
        .timeout_read(Duration::from_secs(120))
        .build();

    let response = agent
        .get(url)
        .call()
        .map_err(|e| crate::Error(format!("Failed to download language data: {}", e)))?;

    let expected = response
        .header("Content-Length")
        .and_then(|s| s.parse::<u64>().ok());

    let mut file = fs::File::create(dest)
        .map_err(|e| crate::Error(format!("Failed to create language data file: {}", e)))?;
    let mut body = ProgressReader::new(response.into_reader(), expected);
    let written = io::copy(&mut body, &mut file)
        .map_err(|e| crate::Error(format!("Language data download interrupted: {}", e)))?;
    file.sync_all()?;

    check_download_size(written, expected)?;
    Ok(written)
}

/// A traineddata file is never empty, and must match the advertised length.
fn check_download_size(written: u64, expected: Option<u64>) -> Result<()> {
    if written == 0 {
        return Err(crate::Error("Language data download was empty".into()));
    }
    match expected {
        Some(expected) if expected != written => Err(crate::Error(format!(
            "Incomplete language data: expected {} bytes, got {}",
            expected, written
        ))),
        _ => Ok(()),
    }
}

/// Logs download progress in 10% steps when the total size is known.
struct ProgressReader<R> {
    inner: R,
    total: Option<u64>,
    read: u64,
    next_step: u64,
}

impl<R: Read> ProgressReader<R> {
    fn new(inner: R, total: Option<u64>) -> Self {
        Self {
            inner,
            total: total.filter(|t| *t > 0),
            read: 0,
            next_step: 10,
        }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.read += n as u64;
        if let Some(total) = self.total {
            let percent = self.read * 100 / total;
            if percent >= self.next_step {
                debug!("Language data {}% ({} of {} bytes)", percent, self.read, total);
                self.next_step = (percent / 10 + 1) * 10;
            }
        }
        Ok(n)
    }
}
