//! Upload progress: turns raw byte-transfer samples into a 0–100 percentage.
//!
//! One tracker exists per upload (JD and CVs each get their own); trackers
//! never share state.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::transport::ByteProgress;

/// `round(loaded * 100 / total)` clamped to 100, or `None` when the total is
/// unknown, so the caller can fall back to an indeterminate indicator.
pub fn upload_percent(loaded: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let percent = (loaded as f64 * 100.0 / total as f64).round();
    Some(percent.clamp(0.0, 100.0) as u8)
}

pub struct UploadProgressTracker {
    label: &'static str,
    finished: AtomicBool,
    report: Box<dyn Fn(u8) + Send + Sync>,
}

impl UploadProgressTracker {
    pub fn new(label: &'static str, report: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self {
            label,
            finished: AtomicBool::new(false),
            report: Box::new(report),
        }
    }

    /// Reports the percentage for one sample. Samples arriving after
    /// [`finish`](Self::finish) are ignored.
    pub fn observe(&self, loaded: u64, total: u64) -> Option<u8> {
        if self.finished.load(Ordering::SeqCst) {
            return None;
        }
        let percent = upload_percent(loaded, total)?;
        (self.report)(percent);
        Some(percent)
    }

    /// Reports exactly 100 once the upload has completed, correcting for any
    /// rounding in the last sample.
    pub fn finish(&self) -> u8 {
        if !self.finished.swap(true, Ordering::SeqCst) {
            debug!(upload = self.label, "Upload complete");
            (self.report)(100);
        }
        100
    }
}

impl ByteProgress for UploadProgressTracker {
    fn on_bytes(&self, loaded: u64, total: u64) {
        let _ = self.observe(loaded, total);
    }
}
