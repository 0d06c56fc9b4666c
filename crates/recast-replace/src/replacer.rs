//! Atomic Replacer
//!
//! Applies one or more edits to a single file as one unit:
//! `Pending → Snapshotted → Applied → Verifying → {Committed | RolledBack}`.
//! A file is never left half-edited: all splices happen in memory and hit
//! disk in a single write, and any post-write failure restores the
//! checkpointed bytes.

use crate::error::SafetyProtocolError;
use dashmap::DashMap;
use recast_analyze::Edit;
use recast_checkpoint::{CheckpointStore, CheckpointToken};
use recast_verify::{Verification, VerifierGateway, VerifyScope};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Replacement state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditPhase {
    /// Not yet started
    Pending,
    /// Backup taken, nothing written
    Snapshotted,
    /// New content written to disk
    Applied,
    /// Oracle running over the affected file
    Verifying,
    /// Verified and backup discarded
    Committed,
    /// Original content restored (or apply aborted)
    RolledBack,
}

/// Outcome of one atomic replacement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceOutcome {
    /// Whether the edits were applied and verified
    pub success: bool,
    /// Whether a restore from backup was performed
    pub rollback_performed: bool,
    /// Edits applied (0 unless success)
    pub edits_applied: usize,
    /// Terminal phase reached
    pub phase: EditPhase,
    /// Failure reason when not successful
    pub error: Option<String>,
    /// Verification result, when one was obtained
    pub verification: Option<Verification>,
}

impl ReplaceOutcome {
    fn committed(edits_applied: usize, verification: Verification) -> Self {
        Self {
            success: true,
            rollback_performed: false,
            edits_applied,
            phase: EditPhase::Committed,
            error: None,
            verification: Some(verification),
        }
    }

    fn aborted(phase: EditPhase, error: impl Into<String>) -> Self {
        Self {
            success: false,
            rollback_performed: false,
            edits_applied: 0,
            phase,
            error: Some(error.into()),
            verification: None,
        }
    }

    fn rolled_back(error: impl Into<String>, verification: Option<Verification>) -> Self {
        Self {
            success: false,
            rollback_performed: true,
            edits_applied: 0,
            phase: EditPhase::RolledBack,
            error: Some(error.into()),
            verification,
        }
    }
}

/// Atomic Replacer configuration
#[derive(Debug, Clone)]
pub struct ReplacerConfig {
    /// Retry bound for transient failures
    pub max_retries: u32,
    /// Backoff between retries
    pub retry_backoff: Duration,
    /// Timeout for the per-file verification
    pub verify_timeout: Duration,
}

impl Default for ReplacerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff: Duration::from_millis(50),
            verify_timeout: Duration::from_secs(120),
        }
    }
}

impl ReplacerConfig {
    /// With retry bound
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// With verification timeout
    #[inline]
    #[must_use]
    pub fn with_verify_timeout(mut self, timeout: Duration) -> Self {
        self.verify_timeout = timeout;
        self
    }
}

/// One attempt's result, before retry handling
enum Attempt {
    Done(ReplaceOutcome),
    Transient(String),
}

/// Atomic Replacer
///
/// Owns no files; coordinates the Checkpoint Store and Verifier Gateway
/// so that every edit either commits verified or rolls back byte-exact.
pub struct AtomicReplacer {
    config: ReplacerConfig,
    checkpoints: Arc<CheckpointStore>,
    verifier: Arc<dyn VerifierGateway>,
    /// Files with a replacement currently in flight
    in_flight: DashMap<PathBuf, ()>,
}

impl AtomicReplacer {
    /// Create replacer
    #[inline]
    #[must_use]
    pub fn new(
        config: ReplacerConfig,
        checkpoints: Arc<CheckpointStore>,
        verifier: Arc<dyn VerifierGateway>,
    ) -> Self {
        Self {
            config,
            checkpoints,
            verifier,
            in_flight: DashMap::new(),
        }
    }

    /// Apply all `edits` (which must target one file) as a single unit
    ///
    /// Edits are applied in reverse position order so earlier offsets are
    /// unaffected by later splices. Transient failures retry up to the
    /// configured bound; content mismatches and verification failures do
    /// not retry.
    ///
    /// # Errors
    /// Only [`SafetyProtocolError`]: a rollback could not restore the
    /// original content. Every other failure is a `ReplaceOutcome`.
    pub async fn apply_to_file(
        &self,
        edits: &[Edit],
    ) -> Result<ReplaceOutcome, SafetyProtocolError> {
        let Some(first) = edits.first() else {
            return Ok(ReplaceOutcome::aborted(EditPhase::Pending, "no edits given"));
        };
        let file = first.file_path.clone();

        if edits.iter().any(|e| e.file_path != file) {
            return Ok(ReplaceOutcome::aborted(
                EditPhase::Pending,
                "edits span multiple files",
            ));
        }

        // At most one replacement in flight per file
        if self.in_flight.insert(file.clone(), ()).is_some() {
            return Ok(ReplaceOutcome::aborted(
                EditPhase::Pending,
                format!("replacement already in flight for {}", file.display()),
            ));
        }

        let result = self.apply_with_retries(&file, edits).await;
        self.in_flight.remove(&file);
        result
    }

    async fn apply_with_retries(
        &self,
        file: &Path,
        edits: &[Edit],
    ) -> Result<ReplaceOutcome, SafetyProtocolError> {
        let mut last_transient = String::new();

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::debug!(file = %file.display(), attempt, "retrying replacement");
                tokio::time::sleep(self.config.retry_backoff).await;
            }

            match self.attempt(file, edits).await? {
                Attempt::Done(outcome) => return Ok(outcome),
                Attempt::Transient(reason) => last_transient = reason,
            }
        }

        tracing::warn!(file = %file.display(), "maximum retries exceeded");
        Ok(ReplaceOutcome::rolled_back(
            format!("maximum retries exceeded: {last_transient}"),
            None,
        ))
    }

    /// One full pass of the state machine
    async fn attempt(
        &self,
        file: &Path,
        edits: &[Edit],
    ) -> Result<Attempt, SafetyProtocolError> {
        // Pending → Snapshotted. Fail closed: no backup, no edit.
        let token = match self.checkpoints.snapshot(&[file.to_path_buf()]).await {
            Ok(token) => token,
            Err(e) => {
                return Ok(Attempt::Done(ReplaceOutcome::aborted(
                    EditPhase::Pending,
                    format!("snapshot failed: {e}"),
                )));
            }
        };

        // Snapshotted → Applied. All splices in memory, one write.
        let content = match tokio::fs::read_to_string(file).await {
            Ok(content) => content,
            Err(e) => {
                self.checkpoints.discard(token).await;
                return Ok(Attempt::Transient(format!("read failed: {e}")));
            }
        };

        let mutated = match splice_edits(&content, edits) {
            Ok(mutated) => mutated,
            Err(mismatch) => {
                // Stale candidate: nothing was written, the file is untouched
                self.checkpoints.discard(token).await;
                return Ok(Attempt::Done(ReplaceOutcome::aborted(
                    EditPhase::Snapshotted,
                    mismatch,
                )));
            }
        };

        if let Err(e) = tokio::fs::write(file, &mutated).await {
            self.rollback(&token, &format!("write failed: {e}")).await?;
            self.checkpoints.discard(token).await;
            return Ok(Attempt::Transient(format!("write failed: {e}")));
        }

        tracing::debug!(file = %file.display(), edits = edits.len(), "edits applied");

        // Applied → Verifying
        let scope = VerifyScope::file(file);
        match self.verifier.verify(scope, self.config.verify_timeout).await {
            Ok(verification) if verification.success => {
                // Verifying → Committed
                self.checkpoints.discard(token).await;
                tracing::info!(file = %file.display(), edits = edits.len(), "replacement committed");
                Ok(Attempt::Done(ReplaceOutcome::committed(
                    edits.len(),
                    verification,
                )))
            }
            Ok(verification) => {
                // Verifying → RolledBack; backup retained for diagnostics
                self.rollback(&token, "verification failed").await?;
                self.checkpoints.retain_for_diagnostics(&token);
                tracing::warn!(
                    file = %file.display(),
                    errors = verification.error_count,
                    "verification failed, rolled back"
                );
                Ok(Attempt::Done(ReplaceOutcome::rolled_back(
                    format!("verification failed with {} errors", verification.error_count),
                    Some(verification),
                )))
            }
            Err(e) => {
                // Transport failure: restore, then let the retry loop decide
                self.rollback(&token, &format!("verifier error: {e}")).await?;
                self.checkpoints.discard(token).await;
                Ok(Attempt::Transient(format!("verifier error: {e}")))
            }
        }
    }

    /// Restore from checkpoint, escalating restore failure to fatal
    async fn rollback(
        &self,
        token: &CheckpointToken,
        context: &str,
    ) -> Result<(), SafetyProtocolError> {
        self.checkpoints.restore(token).await.map_err(|e| {
            tracing::error!(error = %e, context, "rollback failed");
            SafetyProtocolError::new(token.files(), format!("{context}; restore failed: {e}"))
        })
    }
}

/// Apply edits to `content` in reverse position order
///
/// Returns the mutated text, or a mismatch description if any edit's
/// expected original text is not at its recorded location.
fn splice_edits(content: &str, edits: &[Edit]) -> Result<String, String> {
    let mut ordered: Vec<&Edit> = edits.iter().collect();
    ordered.sort_by_key(|e| std::cmp::Reverse(e.location));

    let mut mutated = content.to_string();
    for edit in ordered {
        let offset = match byte_offset(&mutated, edit.location.line, edit.location.column) {
            Some(offset) => offset,
            None => {
                return Err(format!(
                    "no such location {} in {}",
                    edit.location,
                    edit.file_path.display()
                ));
            }
        };

        if !mutated[offset..].starts_with(&edit.original_text) {
            return Err(format!(
                "expected `{}` at {} in {}, file has changed since discovery",
                edit.original_text,
                edit.location,
                edit.file_path.display()
            ));
        }

        mutated.replace_range(offset..offset + edit.original_text.len(), &edit.replacement_text);
    }
    Ok(mutated)
}

/// Byte offset of a 1-based (line, column) position
fn byte_offset(content: &str, line: u32, column: u32) -> Option<usize> {
    let mut offset = 0usize;
    for (idx, text) in content.split('\n').enumerate() {
        if idx + 1 == line as usize {
            let col = (column as usize).checked_sub(1)?;
            if col > text.len() {
                return None;
            }
            return Some(offset + col);
        }
        offset += text.len() + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use recast_analyze::SourceLocation;
    use recast_checkpoint::CheckpointConfig;
    use recast_test_utils::ScriptedVerifier;

    async fn setup(
        dir: &Path,
        verifier: ScriptedVerifier,
    ) -> (AtomicReplacer, Arc<CheckpointStore>) {
        let store = Arc::new(
            CheckpointStore::new(CheckpointConfig::new(dir.join("backups")))
                .await
                .unwrap(),
        );
        let replacer = AtomicReplacer::new(
            ReplacerConfig::default().with_max_retries(2),
            Arc::clone(&store),
            Arc::new(verifier),
        );
        (replacer, store)
    }

    fn edit(file: &Path, line: u32, column: u32, from: &str, to: &str) -> Edit {
        Edit::new(file, SourceLocation::new(line, column), from, to).with_confidence(0.9)
    }

    #[tokio::test]
    async fn successful_edit_commits() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.ts");
        tokio::fs::write(&file, "const a: any = 1;\n").await.unwrap();

        let (replacer, store) = setup(dir.path(), ScriptedVerifier::always_passing()).await;
        let outcome = replacer
            .apply_to_file(&[edit(&file, 1, 8, ": any", ": number")])
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.phase, EditPhase::Committed);
        assert_eq!(outcome.edits_applied, 1);
        assert_eq!(store.live_count(), 0);

        let content = tokio::fs::read_to_string(&file).await.unwrap();
        assert_eq!(content, "const a: number = 1;\n");
    }

    #[tokio::test]
    async fn mismatch_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.ts");
        tokio::fs::write(&file, "const a: string = 'x';\n").await.unwrap();

        let (replacer, _) = setup(dir.path(), ScriptedVerifier::always_passing()).await;
        let outcome = replacer
            .apply_to_file(&[edit(&file, 1, 8, ": any", ": number")])
            .await
            .unwrap();

        assert!(!outcome.success);
        assert!(!outcome.rollback_performed);
        assert!(outcome.error.unwrap().contains("changed since discovery"));

        let content = tokio::fs::read_to_string(&file).await.unwrap();
        assert_eq!(content, "const a: string = 'x';\n");
    }

    #[tokio::test]
    async fn verification_failure_restores_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.ts");
        let original = "const a: any = 1;\nconst b = 2;\n";
        tokio::fs::write(&file, original).await.unwrap();

        let (replacer, _) = setup(dir.path(), ScriptedVerifier::always_failing()).await;
        let outcome = replacer
            .apply_to_file(&[edit(&file, 1, 8, ": any", ": number")])
            .await
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.rollback_performed);
        assert_eq!(outcome.phase, EditPhase::RolledBack);

        let content = tokio::fs::read_to_string(&file).await.unwrap();
        assert_eq!(content, original);
    }

    #[tokio::test]
    async fn reverse_order_keeps_offsets_valid() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.ts");
        tokio::fs::write(&file, "function f(a: any, b: any) {}\n")
            .await
            .unwrap();

        let (replacer, _) = setup(dir.path(), ScriptedVerifier::always_passing()).await;
        let outcome = replacer
            .apply_to_file(&[
                edit(&file, 1, 13, ": any", ": number"),
                edit(&file, 1, 21, ": any", ": string"),
            ])
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.edits_applied, 2);
        let content = tokio::fs::read_to_string(&file).await.unwrap();
        assert_eq!(content, "function f(a: number, b: string) {}\n");
    }

    #[tokio::test]
    async fn transient_verifier_error_retries_then_commits() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.ts");
        tokio::fs::write(&file, "const a: any = 1;\n").await.unwrap();

        let verifier = ScriptedVerifier::from_script(vec![
            ScriptedVerifier::transport_error("socket closed"),
            ScriptedVerifier::pass(),
        ]);
        let (replacer, _) = setup(dir.path(), verifier).await;

        let outcome = replacer
            .apply_to_file(&[edit(&file, 1, 8, ": any", ": number")])
            .await
            .unwrap();
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn exhausted_retries_roll_back() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.ts");
        let original = "const a: any = 1;\n";
        tokio::fs::write(&file, original).await.unwrap();

        let verifier = ScriptedVerifier::from_script(vec![
            ScriptedVerifier::transport_error("down"),
            ScriptedVerifier::transport_error("down"),
            ScriptedVerifier::transport_error("down"),
        ]);
        let (replacer, _) = setup(dir.path(), verifier).await;

        let outcome = replacer
            .apply_to_file(&[edit(&file, 1, 8, ": any", ": number")])
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.phase, EditPhase::RolledBack);
        assert!(outcome.error.unwrap().contains("maximum retries exceeded"));

        let content = tokio::fs::read_to_string(&file).await.unwrap();
        assert_eq!(content, original);
    }

    #[tokio::test]
    async fn second_operation_on_same_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.ts");
        tokio::fs::write(&file, "const a: any = 1;\n").await.unwrap();

        let (replacer, _) = setup(dir.path(), ScriptedVerifier::always_passing()).await;

        // Simulate an operation already in flight for this file
        replacer.in_flight.insert(file.clone(), ());
        let outcome = replacer
            .apply_to_file(&[edit(&file, 1, 8, ": any", ": number")])
            .await
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("already in flight"));
        assert_eq!(
            tokio::fs::read_to_string(&file).await.unwrap(),
            "const a: any = 1;\n"
        );
    }

    #[tokio::test]
    async fn unreadable_backup_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.ts");
        tokio::fs::write(&file, "const a: any = 1;\n").await.unwrap();

        let store = Arc::new(
            CheckpointStore::new(CheckpointConfig::new(dir.path().join("backups")))
                .await
                .unwrap(),
        );
        let verifier = SabotagingVerifier {
            backup_dir: store.backup_dir().to_path_buf(),
        };
        let replacer = AtomicReplacer::new(
            ReplacerConfig::default(),
            Arc::clone(&store),
            Arc::new(verifier),
        );

        let result = replacer
            .apply_to_file(&[edit(&file, 1, 8, ": any", ": number")])
            .await;
        let err = result.unwrap_err();
        assert_eq!(err.files, vec![file]);
    }

    /// Deletes all backups during verification, then fails it
    struct SabotagingVerifier {
        backup_dir: PathBuf,
    }

    #[async_trait::async_trait]
    impl VerifierGateway for SabotagingVerifier {
        async fn verify(
            &self,
            _scope: VerifyScope,
            _timeout: Duration,
        ) -> Result<Verification, recast_verify::VerifyError> {
            let mut entries = tokio::fs::read_dir(&self.backup_dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                tokio::fs::remove_file(entry.path()).await?;
            }
            Ok(Verification::failed(1, vec!["error: induced".to_string()], Duration::ZERO))
        }
    }

    #[test]
    fn byte_offset_positions() {
        let content = "ab\ncdef\n";
        assert_eq!(byte_offset(content, 1, 1), Some(0));
        assert_eq!(byte_offset(content, 2, 1), Some(3));
        assert_eq!(byte_offset(content, 2, 3), Some(5));
        assert_eq!(byte_offset(content, 9, 1), None);
    }
}
