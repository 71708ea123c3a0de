//! Screen capture permission gate.
//!
//! On macOS reading the screen needs the user's Screen Recording consent.
//! Other platforms have no consent model and always report access as granted.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info, warn};
use uuid::Uuid;

use crate::Result;

pub const SCREEN_RECORDING_SETTINGS_URL: &str =
    "x-apple.systempreferences:com.apple.preference.security?Privacy_ScreenCapture";
pub const PRIVACY_SETTINGS_URL: &str = "x-apple.systempreferences:com.apple.preference.security";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Other
        }
    }
}

/// Human-readable guidance for granting screen access on `platform`.
pub fn instructions_for(platform: Platform) -> &'static str {
    match platform {
        Platform::MacOs => {
            "Screen Recording permission is required to detect your creative app.\n\
             1. Open System Settings > Privacy & Security > Screen Recording\n\
             2. Enable access for this application\n\
             3. Restart the application if detection still reports missing permission"
        }
        Platform::Windows => {
            "No special permission is needed on Windows. If detection fails, make sure \
             the application is not blocked by security software."
        }
        Platform::Linux => {
            "No special permission is needed on Linux. Screen capture needs one of grim, \
             gnome-screenshot, scrot or ImageMagick's import, and a running display session."
        }
        Platform::Other => "Screen capture permission cannot be managed on this platform.",
    }
}

/// Platform primitives the gate is built on.
pub trait ConsentPlatform: Send + Sync {
    fn platform(&self) -> Platform;

    /// Whether screen capture is gated behind user consent at all.
    fn requires_consent(&self) -> bool;

    /// Current grant state.
    fn query_access(&self) -> Result<bool>;

    /// Attempt a throwaway capture into `output` to surface the OS consent prompt.
    fn probe_capture(&self, output: &Path) -> Result<()>;

    fn open_url(&self, url: &str) -> Result<()>;
}

/// Decides whether the process may read the screen and drives the consent flow.
pub struct PermissionGate {
    platform: Box<dyn ConsentPlatform>,
    probe_dir: PathBuf,
}

impl PermissionGate {
    pub fn new(platform: impl ConsentPlatform + 'static) -> Self {
        Self {
            platform: Box::new(platform),
            probe_dir: std::env::temp_dir(),
        }
    }

    /// Gate bound to the running operating system.
    pub fn system() -> Self {
        Self::new(SystemConsent)
    }

    /// Directory the consent probe writes its throwaway image to.
    pub fn with_probe_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.probe_dir = dir.into();
        self
    }

    /// `true` if capture is allowed right now. Query errors count as denied.
    pub fn has_capture_permission(&self) -> bool {
        if !self.platform.requires_consent() {
            return true;
        }
        match self.platform.query_access() {
            Ok(granted) => granted,
            Err(e) => {
                warn!("Screen capture permission query failed: {}", e);
                false
            }
        }
    }

    /// Surface the OS consent prompt if access is not granted yet.
    ///
    /// Does not wait for the user to answer: `false` means "ask again later".
    pub fn prompt_for_permission(&self) -> bool {
        if self.has_capture_permission() {
            return true;
        }
        self.probe_and_recheck()
    }

    /// Check, and prompt once if not granted.
    pub fn ensure_permission(&self) -> bool {
        self.prompt_for_permission()
    }

    fn probe_and_recheck(&self) -> bool {
        let probe = self
            .probe_dir
            .join(format!("consent-probe-{}.png", Uuid::new_v4()));
        info!("Screen capture not permitted; probing to trigger the consent prompt");

        if let Err(e) = self.platform.probe_capture(&probe) {
            debug!("Consent probe capture failed: {}", e);
        }
        let _ = fs::remove_file(&probe);

        self.has_capture_permission()
    }

    /// Best-effort jump into the privacy settings. Failures are only logged.
    pub fn open_system_settings(&self) {
        if self.platform.platform() != Platform::MacOs {
            debug!("No capture privacy settings on {:?}", self.platform.platform());
            return;
        }

        if let Err(e) = self.platform.open_url(SCREEN_RECORDING_SETTINGS_URL) {
            warn!("Failed to open Screen Recording settings: {}", e);
            if let Err(e) = self.platform.open_url(PRIVACY_SETTINGS_URL) {
                warn!("Failed to open Privacy settings: {}", e);
            }
        }
    }

    pub fn instructions(&self) -> &'static str {
        instructions_for(self.platform.platform())
    }
}

/// Consent primitives of the operating system this crate was built for.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConsent;

impl ConsentPlatform for SystemConsent {
    fn platform(&self) -> Platform {
        Platform::current()
    }

    fn requires_consent(&self) -> bool {
        cfg!(target_os = "macos")
    }

    #[cfg(target_os = "macos")]
    fn query_access(&self) -> Result<bool> {
        #[link(name = "CoreGraphics", kind = "framework")]
        extern "C" {
            fn CGPreflightScreenCaptureAccess() -> bool;
        }
        Ok(unsafe { CGPreflightScreenCaptureAccess() })
    }

    #[cfg(not(target_os = "macos"))]
    fn query_access(&self) -> Result<bool> {
        Ok(true)
    }

    #[cfg(target_os = "macos")]
    fn probe_capture(&self, output: &Path) -> Result<()> {
        let status = Command::new("screencapture")
            .arg("-x")
            .arg(output)
            .status()?;
        if !status.success() {
            return Err(crate::Error(format!("screencapture probe exited with {}", status)));
        }
        Ok(())
    }

    #[cfg(not(target_os = "macos"))]
    fn probe_capture(&self, _output: &Path) -> Result<()> {
        Ok(())
    }

    fn open_url(&self, url: &str) -> Result<()> {
        let opener = match Platform::current() {
            Platform::MacOs => "open",
            Platform::Windows => "explorer",
            Platform::Linux | Platform::Other => "xdg-open",
        };
        let status = Command::new(opener).arg(url).status()?;
        if !status.success() {
            return Err(crate::Error(format!("{} {} exited with {}", opener, url, status)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    #[derive(Default)]
    struct FakeState {
        granted: AtomicBool,
        grant_on_probe: AtomicBool,
        query_fails: AtomicBool,
        queries: AtomicUsize,
        probes: Mutex<Vec<PathBuf>>,
        opened: Mutex<Vec<String>>,
        reject_urls: Mutex<Vec<&'static str>>,
    }

    #[derive(Clone)]
    struct FakeConsent {
        platform: Platform,
        state: Arc<FakeState>,
    }

    impl FakeConsent {
        fn macos() -> Self {
            Self {
                platform: Platform::MacOs,
                state: Arc::new(FakeState::default()),
            }
        }
    }

    impl ConsentPlatform for FakeConsent {
        fn platform(&self) -> Platform {
            self.platform
        }

        fn requires_consent(&self) -> bool {
            self.platform == Platform::MacOs
        }

        fn query_access(&self) -> Result<bool> {
            self.state.queries.fetch_add(1, Ordering::SeqCst);
            if self.state.query_fails.load(Ordering::SeqCst) {
                return Err(crate::Error("tcc unavailable".into()));
            }
            Ok(self.state.granted.load(Ordering::SeqCst))
        }

        fn probe_capture(&self, output: &Path) -> Result<()> {
            fs::write(output, b"probe")?;
            self.state.probes.lock().unwrap().push(output.to_path_buf());
            if self.state.grant_on_probe.load(Ordering::SeqCst) {
                self.state.granted.store(true, Ordering::SeqCst);
            }
            Ok(())
        }

        fn open_url(&self, url: &str) -> Result<()> {
            self.state.opened.lock().unwrap().push(url.to_string());
            if self.state.reject_urls.lock().unwrap().iter().any(|u| *u == url) {
                return Err(crate::Error(format!("rejected {url}")));
            }
            Ok(())
        }
    }

    #[test]
    fn platforms_without_consent_are_always_granted() {
        let fake = FakeConsent {
            platform: Platform::Linux,
            state: Arc::new(FakeState::default()),
        };
        let gate = PermissionGate::new(fake.clone());

        assert!(gate.has_capture_permission());
        assert!(gate.prompt_for_permission());
        assert_eq!(fake.state.queries.load(Ordering::SeqCst), 0);
        assert!(fake.state.probes.lock().unwrap().is_empty());
    }

    #[test]
    fn query_failure_is_fail_closed() {
        let fake = FakeConsent::macos();
        fake.state.granted.store(true, Ordering::SeqCst);
        fake.state.query_fails.store(true, Ordering::SeqCst);
        let gate = PermissionGate::new(fake);

        assert!(!gate.has_capture_permission());
    }

    #[test]
    fn granted_prompt_returns_without_probing() {
        let fake = FakeConsent::macos();
        fake.state.granted.store(true, Ordering::SeqCst);
        let gate = PermissionGate::new(fake.clone());

        assert!(gate.prompt_for_permission());
        assert!(fake.state.probes.lock().unwrap().is_empty());
    }

    #[test]
    fn prompt_probes_once_deletes_file_and_rechecks() {
        let dir = tempdir().expect("tempdir");
        let fake = FakeConsent::macos();
        fake.state.grant_on_probe.store(true, Ordering::SeqCst);
        let gate = PermissionGate::new(fake.clone()).with_probe_dir(dir.path());

        assert!(gate.ensure_permission());

        let probes = fake.state.probes.lock().unwrap();
        assert_eq!(probes.len(), 1);
        assert!(!probes[0].exists(), "probe image must be removed");
        assert_eq!(fake.state.queries.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn prompt_reports_still_denied() {
        let dir = tempdir().expect("tempdir");
        let fake = FakeConsent::macos();
        let gate = PermissionGate::new(fake.clone()).with_probe_dir(dir.path());

        assert!(!gate.prompt_for_permission());
        assert_eq!(fake.state.probes.lock().unwrap().len(), 1);
    }

    #[test]
    fn settings_fall_back_to_privacy_pane() {
        let fake = FakeConsent::macos();
        fake.state
            .reject_urls
            .lock()
            .unwrap()
            .push(SCREEN_RECORDING_SETTINGS_URL);
        let gate = PermissionGate::new(fake.clone());

        gate.open_system_settings();

        let opened = fake.state.opened.lock().unwrap();
        assert_eq!(
            *opened,
            vec![SCREEN_RECORDING_SETTINGS_URL.to_string(), PRIVACY_SETTINGS_URL.to_string()]
        );
    }

    #[test]
    fn settings_failures_are_swallowed() {
        let fake = FakeConsent::macos();
        fake.state
            .reject_urls
            .lock()
            .unwrap()
            .extend([SCREEN_RECORDING_SETTINGS_URL, PRIVACY_SETTINGS_URL]);
        let gate = PermissionGate::new(fake.clone());

        gate.open_system_settings();
        assert_eq!(fake.state.opened.lock().unwrap().len(), 2);
    }

    #[test]
    fn instructions_depend_only_on_platform() {
        assert!(instructions_for(Platform::MacOs).contains("Screen Recording"));
        assert!(instructions_for(Platform::Linux).contains("No special permission"));
        assert_eq!(
            PermissionGate::new(FakeConsent::macos()).instructions(),
            instructions_for(Platform::MacOs)
        );
    }

    #[test]
    fn system_platform_matches_build_target() {
        let consent = SystemConsent;
        assert_eq!(consent.platform(), Platform::current());
        assert_eq!(consent.requires_consent(), cfg!(target_os = "macos"));
    }
}
