//! Progress-callback trait for per-file batch events.
//!
//! Inject an `Arc<dyn BatchProgressCallback>` via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the batch processes each file.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a terminal progress bar, a CI annotation, or a
//! database record without the library knowing anything about how the host
//! application communicates. The batch itself is strictly sequential, but
//! the trait is `Send + Sync` so one callback instance can be shared with
//! whatever the host runs alongside the batch.

/// Called by the batch as it processes each file.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after dedup, before any file is converted.
    ///
    /// `total_files` is the number of chosen files across both lanes.
    fn on_run_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called before a file's conversion begins.
    fn on_file_start(&self, index: usize, total: usize, relative_path: &str) {
        let _ = (index, total, relative_path);
    }

    /// Called when a file converts (or skips) successfully.
    fn on_file_complete(&self, index: usize, total: usize, relative_path: &str, method: &str) {
        let _ = (index, total, relative_path, method);
    }

    /// Called when a file ultimately fails.
    fn on_file_error(&self, index: usize, total: usize, relative_path: &str, error: &str) {
        let _ = (index, total, relative_path, error);
    }

    /// Called once after the rebuild pass, with final counts.
    fn on_run_complete(&self, ok: usize, failed: usize) {
        let _ = (ok, failed);
    }
}
