//! Progress and cancellation channel between a tracking run and its caller.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Receives progress and errors from a run and tells it when to stop.
///
/// The pipeline polls [`should_stop`](Self::should_stop) once before every
/// frame; cancellation never interrupts a frame already being processed.
pub trait ProcessingController: Send + Sync {
    /// Percentage of the requested range processed so far, `0..=100`.
    fn report_progress(&self, percent: u32);

    /// A fatal error ended the run.
    fn report_error(&self, message: &str);

    fn should_stop(&self) -> bool;
}

/// Thread-safe controller for running a pipeline on a background thread.
///
/// Share it as `Arc<SharedController>`: the worker reports into it while the
/// caller reads progress and requests a stop.
#[derive(Debug, Default)]
pub struct SharedController {
    stop: AtomicBool,
    progress: AtomicU32,
    error: Mutex<Option<String>>,
}

impl SharedController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the running pipeline to stop before its next frame.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn progress(&self) -> u32 {
        self.progress.load(Ordering::SeqCst)
    }

    /// Last error reported by the run, if any.
    pub fn error(&self) -> Option<String> {
        self.error.lock().ok().and_then(|e| e.clone())
    }

    pub fn has_error(&self) -> bool {
        self.error().is_some()
    }
}

impl ProcessingController for SharedController {
    fn report_progress(&self, percent: u32) {
        self.progress.store(percent.min(100), Ordering::SeqCst);
    }

    fn report_error(&self, message: &str) {
        if let Ok(mut error) = self.error.lock() {
            *error = Some(message.to_string());
        }
    }

    fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}
