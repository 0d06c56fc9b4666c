//! Checkpoint Store - pre-edit file snapshots
//!
//! The only component that writes to the backup directory:
//! - Snapshot one or more files before an edit (ingress)
//! - Restore any subset from verified backups (rollback)
//! - Discard backups once the edit is committed (egress)
//!
//! # Safety
//! A snapshot that cannot be taken is an error, never a partial backup:
//! callers fail closed and do not edit. Cleanup never removes a backup
//! that is still referenced by a live token.

use crate::error::CheckpointError;
use crate::hash::ContentHash;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use ulid::Ulid;

/// Unique checkpoint identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CheckpointId(pub Ulid);

impl CheckpointId {
    /// Generate new checkpoint ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for CheckpointId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One backed-up file within a checkpoint
#[derive(Debug, Clone)]
struct SnapshotEntry {
    /// Original file path
    original: PathBuf,
    /// Backup file path inside the backup directory
    backup: PathBuf,
    /// Hash of the backed-up bytes, checked before any restore
    hash: ContentHash,
}

/// Opaque handle to a set of file backups
///
/// Owned exclusively by the [`CheckpointStore`] that issued it. Lifetime
/// is bounded by the enclosing atomic or batch operation; discard on
/// success to bound backup storage.
#[derive(Debug, Clone)]
pub struct CheckpointToken {
    id: CheckpointId,
    entries: Vec<SnapshotEntry>,
    created_at: DateTime<Utc>,
}

impl CheckpointToken {
    /// Checkpoint ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> CheckpointId {
        self.id
    }

    /// Original files covered by this checkpoint
    #[must_use]
    pub fn files(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|e| e.original.clone()).collect()
    }

    /// Creation time
    #[inline]
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Checkpoint Store configuration
#[derive(Debug, Clone)]
pub struct CheckpointConfig {
    /// Directory holding backup files
    pub backup_dir: PathBuf,
    /// Age past which unreferenced backups may be removed
    pub retention: Duration,
}

impl CheckpointConfig {
    /// Create config with a backup directory
    #[inline]
    #[must_use]
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            retention: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// With retention window
    #[inline]
    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }
}

/// Checkpoint Store
///
/// Snapshots file contents into a dedicated backup directory keyed by
/// timestamped, collision-resistant names, and restores them byte-exact
/// on rollback.
#[derive(Debug)]
pub struct CheckpointStore {
    config: CheckpointConfig,
    /// Backups referenced by live tokens, keyed by checkpoint ID
    live: DashMap<CheckpointId, Vec<PathBuf>>,
    /// Per-process sequence for collision-resistant backup names
    seq: AtomicU64,
}

impl CheckpointStore {
    /// Create store, ensuring the backup directory exists
    ///
    /// # Errors
    /// Returns error if the backup directory cannot be created
    pub async fn new(config: CheckpointConfig) -> Result<Self, CheckpointError> {
        tokio::fs::create_dir_all(&config.backup_dir).await?;
        Ok(Self {
            config,
            live: DashMap::new(),
            seq: AtomicU64::new(0),
        })
    }

    /// Snapshot the current contents of `paths`
    ///
    /// All-or-nothing: if any file cannot be backed up, partial backups
    /// are removed and an error is returned. The caller must treat the
    /// subsequent edit as forbidden.
    ///
    /// # Errors
    /// - `CheckpointError::SnapshotFailed` if any read or write fails
    pub async fn snapshot(&self, paths: &[PathBuf]) -> Result<CheckpointToken, CheckpointError> {
        let mut entries = Vec::with_capacity(paths.len());

        for path in paths {
            match self.backup_one(path).await {
                Ok(entry) => entries.push(entry),
                Err(source) => {
                    // Remove whatever was already copied
                    for entry in &entries {
                        let _ = tokio::fs::remove_file(&entry.backup).await;
                    }
                    return Err(CheckpointError::SnapshotFailed {
                        path: path.clone(),
                        source,
                    });
                }
            }
        }

        let token = CheckpointToken {
            id: CheckpointId::new(),
            entries,
            created_at: Utc::now(),
        };

        self.live.insert(
            token.id,
            token.entries.iter().map(|e| e.backup.clone()).collect(),
        );

        tracing::debug!(
            checkpoint = %token.id,
            files = token.entries.len(),
            "snapshot created"
        );
        Ok(token)
    }

    /// Verify that every backup behind `token` can be trusted for restore
    ///
    /// A backup is trusted iff it exists, is non-empty, and its bytes
    /// still hash to the value recorded at snapshot time.
    #[must_use]
    pub async fn verify_integrity(&self, token: &CheckpointToken) -> bool {
        for entry in &token.entries {
            match tokio::fs::read(&entry.backup).await {
                // An empty backup of a non-empty file fails the hash check
                Ok(bytes) => {
                    if ContentHash::compute(&bytes) != entry.hash {
                        return false;
                    }
                }
                Err(_) => return false,
            }
        }
        true
    }

    /// Restore all files covered by `token` from their backups
    ///
    /// Idempotent: restoring twice yields the same file contents as
    /// restoring once. Each backup's integrity is checked before it is
    /// written over the original.
    ///
    /// # Errors
    /// - `CheckpointError::BackupMissing` if a backup cannot be read
    /// - `CheckpointError::IntegrityCheckFailed` if a backup hash mismatches
    /// - `CheckpointError::RestoreFailed` if the original cannot be rewritten
    pub async fn restore(&self, token: &CheckpointToken) -> Result<(), CheckpointError> {
        for entry in &token.entries {
            let bytes = tokio::fs::read(&entry.backup).await.map_err(|_| {
                CheckpointError::BackupMissing {
                    path: entry.original.clone(),
                }
            })?;

            if ContentHash::compute(&bytes) != entry.hash {
                return Err(CheckpointError::IntegrityCheckFailed {
                    path: entry.original.clone(),
                });
            }

            tokio::fs::write(&entry.original, &bytes).await.map_err(|source| {
                CheckpointError::RestoreFailed {
                    path: entry.original.clone(),
                    source,
                }
            })?;

            tracing::debug!(file = %entry.original.display(), "restored from backup");
        }
        Ok(())
    }

    /// Discard `token`, removing its backups
    ///
    /// Must be called on success paths; abandoned tokens are only
    /// reclaimed by retention cleanup.
    pub async fn discard(&self, token: CheckpointToken) {
        self.live.remove(&token.id);
        for entry in &token.entries {
            if let Err(e) = tokio::fs::remove_file(&entry.backup).await {
                tracing::warn!(
                    backup = %entry.backup.display(),
                    error = %e,
                    "failed to remove discarded backup"
                );
            }
        }
    }

    /// Forget `token` without removing its backups
    ///
    /// Used after a failed verification so the backup stays available
    /// for diagnostics while no longer counting as in-flight.
    pub fn retain_for_diagnostics(&self, token: &CheckpointToken) {
        self.live.remove(&token.id);
        tracing::debug!(checkpoint = %token.id, "backup retained for diagnostics");
    }

    /// Remove unreferenced backups older than the retention window
    ///
    /// Best-effort: individual removal failures are logged, never
    /// propagated. Backups referenced by a live token are skipped
    /// regardless of age.
    pub async fn cleanup_expired(&self) -> usize {
        let referenced: std::collections::HashSet<PathBuf> = self
            .live
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect();

        let mut removed = 0;
        let mut dir = match tokio::fs::read_dir(&self.config.backup_dir).await {
            Ok(dir) => dir,
            Err(e) => {
                tracing::warn!(error = %e, "cannot read backup directory for cleanup");
                return 0;
            }
        };

        while let Ok(Some(entry)) = dir.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("bak") {
                continue;
            }
            if referenced.contains(&path) {
                continue;
            }
            let expired = entry
                .metadata()
                .await
                .ok()
                .and_then(|m| m.modified().ok())
                .and_then(|modified| SystemTime::now().duration_since(modified).ok())
                .is_some_and(|age| age >= self.config.retention);

            if expired {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        tracing::warn!(backup = %path.display(), error = %e, "cleanup failed");
                    }
                }
            }
        }

        if removed > 0 {
            tracing::info!(removed, "expired backups removed");
        }
        removed
    }

    /// Number of live (in-flight) checkpoints
    #[inline]
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Backup directory
    #[inline]
    #[must_use]
    pub fn backup_dir(&self) -> &Path {
        &self.config.backup_dir
    }

    /// Copy one file into the backup directory under a unique name
    async fn backup_one(&self, path: &Path) -> Result<SnapshotEntry, std::io::Error> {
        let bytes = tokio::fs::read(path).await?;
        let hash = ContentHash::compute(&bytes);

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed");
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let backup = self.config.backup_dir.join(format!(
            "{}.{}.{}.bak",
            name,
            Utc::now().timestamp_millis(),
            seq
        ));

        tokio::fs::write(&backup, &bytes).await?;

        Ok(SnapshotEntry {
            original: path.to_path_buf(),
            backup,
            hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_in(dir: &Path) -> CheckpointStore {
        CheckpointStore::new(CheckpointConfig::new(dir.join("backups")))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn snapshot_and_restore_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.ts");
        tokio::fs::write(&file, "let x: any = 1;").await.unwrap();

        let store = store_in(dir.path()).await;
        let token = store.snapshot(&[file.clone()]).await.unwrap();

        tokio::fs::write(&file, "let x: number = 1;").await.unwrap();
        store.restore(&token).await.unwrap();

        let content = tokio::fs::read_to_string(&file).await.unwrap();
        assert_eq!(content, "let x: any = 1;");
    }

    #[tokio::test]
    async fn restore_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.ts");
        tokio::fs::write(&file, "original").await.unwrap();

        let store = store_in(dir.path()).await;
        let token = store.snapshot(&[file.clone()]).await.unwrap();

        tokio::fs::write(&file, "mutated").await.unwrap();
        store.restore(&token).await.unwrap();
        store.restore(&token).await.unwrap();

        let content = tokio::fs::read_to_string(&file).await.unwrap();
        assert_eq!(content, "original");
    }

    #[tokio::test]
    async fn snapshot_missing_file_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.ts");
        let absent = dir.path().join("missing.ts");
        tokio::fs::write(&present, "content").await.unwrap();

        let store = store_in(dir.path()).await;
        let result = store.snapshot(&[present, absent]).await;
        assert!(matches!(result, Err(CheckpointError::SnapshotFailed { .. })));

        // No partial backups remain
        let mut entries = tokio::fs::read_dir(store.backup_dir()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn integrity_check_detects_tampered_backup() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.ts");
        tokio::fs::write(&file, "content").await.unwrap();

        let store = store_in(dir.path()).await;
        let token = store.snapshot(&[file]).await.unwrap();
        assert!(store.verify_integrity(&token).await);

        // Corrupt the backup behind the store's back
        let backup = &token.entries[0].backup;
        tokio::fs::write(backup, "tampered").await.unwrap();
        assert!(!store.verify_integrity(&token).await);

        let result = store.restore(&token).await;
        assert!(matches!(
            result,
            Err(CheckpointError::IntegrityCheckFailed { .. })
        ));
    }

    #[tokio::test]
    async fn discard_removes_backups() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.ts");
        tokio::fs::write(&file, "content").await.unwrap();

        let store = store_in(dir.path()).await;
        let token = store.snapshot(&[file]).await.unwrap();
        let backup = token.entries[0].backup.clone();
        assert_eq!(store.live_count(), 1);

        store.discard(token).await;
        assert_eq!(store.live_count(), 0);
        assert!(!backup.exists());
    }

    #[tokio::test]
    async fn cleanup_skips_live_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.ts");
        tokio::fs::write(&file, "content").await.unwrap();

        let config = CheckpointConfig::new(dir.path().join("backups"))
            .with_retention(Duration::from_secs(0));
        let store = CheckpointStore::new(config).await.unwrap();
        let token = store.snapshot(&[file]).await.unwrap();

        // Retention is zero, but the token is live: nothing removed
        let removed = store.cleanup_expired().await;
        assert_eq!(removed, 0);
        assert!(store.verify_integrity(&token).await);
    }

    #[tokio::test]
    async fn cleanup_removes_expired_unreferenced() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.ts");
        tokio::fs::write(&file, "content").await.unwrap();

        let config = CheckpointConfig::new(dir.path().join("backups"))
            .with_retention(Duration::from_secs(0));
        let store = CheckpointStore::new(config).await.unwrap();
        let token = store.snapshot(&[file]).await.unwrap();
        store.retain_for_diagnostics(&token);

        let removed = store.cleanup_expired().await;
        assert_eq!(removed, 1);
    }
}
