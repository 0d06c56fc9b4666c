//! Error types for the Atomic Replacer
//!
//! Recoverable failures (discovery mismatch, verification failure, safety
//! rejection, exhausted retries) are reported in [`crate::ReplaceOutcome`]
//! and the campaign continues. The only error type here is the fatal one:
//! a rollback that could not be completed.

use std::path::PathBuf;

/// Fatal protocol failure: a rollback could not restore the original files
///
/// Raised when a backup is missing, empty, or corrupted at restore time.
/// Must stop the enclosing batch and campaign phase; the carried file list
/// names every file that may be inconsistent on disk.
#[derive(Debug, thiserror::Error)]
#[error("safety protocol violation: rollback failed, files possibly inconsistent: {files:?} ({reason})")]
pub struct SafetyProtocolError {
    /// Files whose on-disk state can no longer be guaranteed
    pub files: Vec<PathBuf>,
    /// Underlying restore failure
    pub reason: String,
}

impl SafetyProtocolError {
    /// Create from affected files and the restore failure
    #[inline]
    #[must_use]
    pub fn new(files: Vec<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            files,
            reason: reason.into(),
        }
    }
}
