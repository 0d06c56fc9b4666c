//! Error types for the Checkpoint Store
//!
//! Covers snapshot creation, restore, integrity verification, and
//! backup-directory housekeeping failures.

use std::path::PathBuf;

/// Checkpoint Store errors
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Snapshot could not be taken; the caller must not proceed to edit
    #[error("snapshot failed for {path}: {source}")]
    SnapshotFailed {
        /// File that could not be backed up
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Backup file is missing or unreadable at restore time
    #[error("backup missing for {path}")]
    BackupMissing {
        /// Original file the backup was taken for
        path: PathBuf,
    },

    /// Backup exists but is empty or its hash no longer matches
    #[error("backup integrity check failed for {path}")]
    IntegrityCheckFailed {
        /// Original file the backup was taken for
        path: PathBuf,
    },

    /// Restore write failed
    #[error("restore failed for {path}: {source}")]
    RestoreFailed {
        /// File that could not be rewritten
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Token is not registered with this store
    #[error("unknown checkpoint token: {0}")]
    UnknownToken(String),

    /// Backup directory could not be created or accessed
    #[error("backup directory error: {0}")]
    BackupDir(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CheckpointError::BackupMissing {
            path: PathBuf::from("src/a.ts"),
        };
        assert!(err.to_string().contains("backup missing"));
    }
}
