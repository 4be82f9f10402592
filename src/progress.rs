//! Progress-callback trait for per-file ingestion events.
//!
//! Attach an [`Arc<dyn IngestProgressCallback>`] with
//! [`crate::pipeline::ingest::Ingestor::with_progress`] to receive events as
//! each input file is loaded. The CLI uses this to drive its progress bar;
//! a GUI front-end would use it to refresh the loaded-files list.
//!
//! # Example
//!
//! ```rust
//! use note_organizer::IngestProgressCallback;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct FailureCounter(AtomicUsize);
//!
//! impl IngestProgressCallback for FailureCounter {
//!     fn on_file_error(&self, _index: usize, _total: usize, name: &str, error: &str) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{name}: {error}");
//!     }
//! }
//! ```

use std::sync::Arc;

/// Called by the ingestor as it works through a batch of files.
///
/// Files are processed sequentially, so events for one batch arrive in input
/// order. All methods have default no-op implementations.
pub trait IngestProgressCallback: Send + Sync {
    /// Called once before the first file of a batch.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called before a file is read.
    ///
    /// # Arguments
    /// * `index`: 1-indexed position in the batch
    /// * `total`: files in the batch
    /// * `name`: file name as it will appear in the manifest
    fn on_file_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when a file was loaded (or skipped as unsupported).
    fn on_file_loaded(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when a file failed and was recorded as an error entry.
    fn on_file_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let _ = (index, total, name, error);
    }

    /// Called once after every file in the batch has been attempted, before
    /// the size budget is checked.
    fn on_batch_complete(&self, total_files: usize, loaded: usize) {
        let _ = (total_files, loaded);
    }
}

/// A no-op implementation; the default when no callback is attached.
pub struct NoopProgressCallback;

impl IngestProgressCallback for NoopProgressCallback {}

/// Convenience alias for the shared callback type.
pub type ProgressCallback = Arc<dyn IngestProgressCallback>;
