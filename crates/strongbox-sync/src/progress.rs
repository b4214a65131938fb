//! Step-wise sync progress
//!
//! The reporter keeps two counters. `total` is an estimate that only ever
//! grows as work is discovered; `progress` goes up by at least one on every
//! event. Intermediate events always leave `progress < total`, so a
//! progress bar reaches the end exactly once: on the final event of a
//! successful sync.

use std::sync::Arc;

use strongbox_core::domain::{FileId, SyncProgress};

/// Receives a [`SyncProgress`] after every file-level step
pub type ProgressCallback = Arc<dyn Fn(SyncProgress) + Send + Sync>;

pub(crate) struct ProgressReporter {
    callback: Option<ProgressCallback>,
    total: usize,
    progress: usize,
}

impl ProgressReporter {
    pub(crate) fn new(callback: Option<ProgressCallback>) -> Self {
        // room for the closing event
        Self {
            callback,
            total: 1,
            progress: 0,
        }
    }

    /// Adds `steps` to the expected amount of work
    pub(crate) fn grow(&mut self, steps: usize) {
        self.total += steps;
    }

    pub(crate) fn step(&mut self, file: Option<FileId>, msg: impl Into<String>) {
        self.progress += 1;
        if self.total <= self.progress {
            self.total = self.progress + 1;
        }
        self.emit(file, msg.into());
    }

    /// Emits the closing event, with `progress == total`
    pub(crate) fn finish(&mut self, msg: impl Into<String>) {
        self.progress = self.total.max(self.progress + 1);
        self.total = self.progress;
        self.emit(None, msg.into());
    }

    fn emit(&self, file: Option<FileId>, msg: String) {
        if let Some(callback) = &self.callback {
            callback(SyncProgress {
                total: self.total,
                progress: self.progress,
                file_being_processed: file,
                msg,
            });
        }
    }
}
