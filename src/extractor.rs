//! Text extractor: owns the OCR engine and serializes every use of it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

use log::{debug, info};

use crate::capture::Capture;
use crate::config::ContextConfig;
use crate::engine::{OcrEngine, TesseractEngine};
use crate::Result;

struct EngineSlot {
    engine: Box<dyn OcrEngine>,
    ready: bool,
}

impl EngineSlot {
    fn release(&mut self) {
        if !self.ready {
            return;
        }
        self.engine.terminate();
        self.ready = false;
        info!("OCR engine shut down");
    }
}

/// Long-lived OCR engine holder.
///
/// The engine is initialized on first use and stays loaded until
/// [`shutdown`](Self::shutdown). All calls go through one lock, so
/// initialization and recognition never run concurrently.
///
/// `shutdown` never waits for an in-flight recognition: if the engine is
/// busy, the request is recorded and applied by the caller holding it as soon
/// as it lets go.
pub struct TextExtractor {
    language: String,
    slot: Mutex<EngineSlot>,
    shutdown_pending: AtomicBool,
    session: AtomicU64,
}

impl TextExtractor {
    pub fn new(engine: impl OcrEngine + 'static, language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            slot: Mutex::new(EngineSlot {
                engine: Box::new(engine),
                ready: false,
            }),
            shutdown_pending: AtomicBool::new(false),
            session: AtomicU64::new(0),
        }
    }

    /// Extractor backed by tesseract, configured from `config`.
    pub fn tesseract(config: &ContextConfig) -> Self {
        Self::new(TesseractEngine::from_config(config), config.language.clone())
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Current engine session. Every [`shutdown`](Self::shutdown) starts a new one.
    pub fn session(&self) -> u64 {
        self.session.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, EngineSlot>> {
        self.slot
            .lock()
            .map_err(|e| crate::Error(format!("OCR engine lock failed: {}", e)))
    }

    /// Run `f` on the slot, then apply any shutdown requested meanwhile.
    fn with_slot<T>(&self, f: impl FnOnce(&mut EngineSlot) -> T) -> Result<T> {
        let outcome = {
            let mut slot = self.lock()?;
            f(&mut slot)
        };
        self.apply_pending_shutdown();
        Ok(outcome)
    }

    /// Initialize the engine and load its language model. No-op once ready.
    pub fn ensure_ready(&self) -> Result<()> {
        self.with_slot(|slot| Self::ready_slot(slot, &self.language))?
    }

    fn ready_slot(slot: &mut EngineSlot, language: &str) -> Result<()> {
        if slot.ready {
            return Ok(());
        }
        info!("Initializing OCR engine (language {})", language);
        slot.engine.initialize(language)?;
        slot.ready = true;
        Ok(())
    }

    /// Run recognition on `capture` and return the raw text.
    ///
    /// The engine must already be ready. Errors are returned to the caller
    /// untouched.
    pub fn extract(&self, capture: Capture) -> Result<String> {
        self.with_slot(|slot| {
            if !slot.ready {
                return Err(crate::Error("OCR engine not ready".into()));
            }
            Self::recognize(slot, &capture)
        })?
    }

    /// Ready the engine and recognize `capture` under one lock.
    ///
    /// Fails without touching the engine if a shutdown happened since
    /// `session` was read, so a run abandoned before a shutdown cannot bring
    /// the engine back.
    pub fn extract_in_session(&self, session: u64, capture: Capture) -> Result<String> {
        self.with_slot(|slot| {
            if self.session() != session {
                return Err(crate::Error(
                    "OCR engine was shut down during this run".into(),
                ));
            }
            Self::ready_slot(slot, &self.language)?;
            Self::recognize(slot, &capture)
        })?
    }

    fn recognize(slot: &mut EngineSlot, capture: &Capture) -> Result<String> {
        let recognition = slot.engine.recognize(capture.path())?;
        debug!(
            "Extracted {} characters from {}",
            recognition.text.chars().count(),
            capture.path().display()
        );
        Ok(recognition.text)
    }

    /// Release the engine. Safe to call when never initialized.
    ///
    /// Returns immediately. When the engine is busy the release happens as
    /// soon as the current call finishes.
    pub fn shutdown(&self) {
        self.session.fetch_add(1, Ordering::SeqCst);
        self.shutdown_pending.store(true, Ordering::SeqCst);
        if !self.apply_pending_shutdown() {
            debug!("OCR engine busy; shutdown deferred until the current call finishes");
        }
    }

    /// Apply a requested shutdown if the slot is free. Returns `false` when it
    /// is left to the current holder.
    fn apply_pending_shutdown(&self) -> bool {
        while self.shutdown_pending.load(Ordering::SeqCst) {
            let mut slot = match self.slot.try_lock() {
                Ok(slot) => slot,
                // Poisoning must not keep the engine loaded.
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return false,
            };
            self.shutdown_pending.store(false, Ordering::SeqCst);
            slot.release();
        }
        true
    }

    /// Whether the engine is loaded and no shutdown is waiting on it.
    pub fn is_ready(&self) -> bool {
        if self.shutdown_pending.load(Ordering::SeqCst) {
            return false;
        }
        self.with_slot(|slot| slot.ready && !self.shutdown_pending.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}
