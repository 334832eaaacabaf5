//! Append-only trace of every request line the daemon accepts.
//!
//! The trace exists for offline replay and debugging, so write failures are
//! logged and swallowed rather than allowed to disturb request handling.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use tracing::warn;

use super::DISPATCH_TARGET;

/// Indexed request log appended to on every received command line.
pub(crate) struct RequestLog {
    inner: Mutex<RequestLogState>,
}

struct RequestLogState {
    file: File,
    index: u64,
}

impl RequestLog {
    /// Opens the log for appending, creating parent directories as needed.
    pub(crate) fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            inner: Mutex::new(RequestLogState { file, index: 0 }),
        })
    }

    /// Records a received request line, returning its index.
    pub(crate) fn record(&self, line: &str) -> u64 {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.index += 1;
        let index = state.index;
        if let Err(error) = writeln!(state.file, "{index}: {line}") {
            warn!(target: DISPATCH_TARGET, error = %error, "request trace write failed");
        }
        index
    }

    /// Marks a previously recorded request as failed.
    pub(crate) fn record_failure(&self, index: u64) {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(error) = writeln!(state.file, "{index}: error") {
            warn!(target: DISPATCH_TARGET, error = %error, "request trace write failed");
        }
    }
}
