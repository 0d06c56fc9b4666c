//! Batch coordination
//!
//! Groups edits by file, applies them through the Atomic Replacer, and
//! verifies build stability over the whole batch. The batch is one
//! rollback unit: if batch verification fails, every file is restored
//! from the batch checkpoint and the batch reports zero succeeded edits.

use crate::config::EngineConfig;
use crate::error::EngineError;
use recast_analyze::Edit;
use recast_checkpoint::CheckpointStore;
use recast_replace::{AtomicReplacer, ReplacerConfig};
use recast_verify::{VerifierGateway, VerifyScope};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// An edit admitted past classification and safety gating
#[derive(Debug, Clone)]
pub struct ScoredEdit {
    /// The edit itself
    pub edit: Edit,
    /// Safety score it was admitted with
    pub safety_score: f64,
}

impl ScoredEdit {
    /// Create scored edit
    #[inline]
    #[must_use]
    pub fn new(edit: Edit, safety_score: f64) -> Self {
        Self {
            edit,
            safety_score: safety_score.clamp(0.0, 1.0),
        }
    }
}

/// Outcome of one executed batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    /// 1-based batch sequence number within the campaign
    pub batch_number: u64,
    /// Distinct files the batch touched
    pub files_processed: usize,
    /// Edits sent to the replacer
    pub edits_attempted: usize,
    /// Edits applied and still standing after batch verification
    pub edits_succeeded: usize,
    /// Verification failures (per-file and batch-level)
    pub verification_failures: usize,
    /// Rollbacks performed (per-file and batch-level)
    pub rollbacks_performed: usize,
    /// Mean safety score of the admitted edits
    pub safety_score: f64,
    /// Wall-clock duration of the batch
    pub duration: Duration,
}

/// Append-only record of executed batches
///
/// Length only grows; results are never altered after append. The
/// adaptive strategy reads this and nothing else.
#[derive(Debug, Default)]
pub struct BatchHistory {
    results: Vec<BatchResult>,
}

impl BatchHistory {
    /// Create empty history
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result
    #[inline]
    pub fn push(&mut self, result: BatchResult) {
        self.results.push(result);
    }

    /// Number of recorded batches
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether no batch has run yet
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// The most recent `n` results, oldest first
    #[must_use]
    pub fn recent(&self, n: usize) -> &[BatchResult] {
        let start = self.results.len().saturating_sub(n);
        &self.results[start..]
    }

    /// All results, oldest first
    #[inline]
    #[must_use]
    pub fn all(&self) -> &[BatchResult] {
        &self.results
    }
}

/// Batch Coordinator
///
/// Serializes all file mutation: edits within a file go through the
/// replacer as one unit, files are processed one at a time, and batch
/// verification never runs concurrently with an uncommitted edit.
pub struct BatchCoordinator {
    config: EngineConfig,
    checkpoints: Arc<CheckpointStore>,
    verifier: Arc<dyn VerifierGateway>,
    replacer: AtomicReplacer,
    history: BatchHistory,
    batch_counter: u64,
}

impl BatchCoordinator {
    /// Create coordinator
    #[must_use]
    pub fn new(
        config: EngineConfig,
        replacer_config: ReplacerConfig,
        checkpoints: Arc<CheckpointStore>,
        verifier: Arc<dyn VerifierGateway>,
    ) -> Self {
        let replacer = AtomicReplacer::new(
            replacer_config,
            Arc::clone(&checkpoints),
            Arc::clone(&verifier),
        );
        Self {
            config,
            checkpoints,
            verifier,
            replacer,
            history: BatchHistory::new(),
            batch_counter: 0,
        }
    }

    /// Batch history so far
    #[inline]
    #[must_use]
    pub fn history(&self) -> &BatchHistory {
        &self.history
    }

    /// Execute one batch of edits as a single rollback unit
    ///
    /// Edits are grouped by file (path order, deterministic for a given
    /// input); within a file the replacer applies them in reverse
    /// position order. After all files, one verification covers every
    /// modified file, plus the extended check when configured.
    ///
    /// # Errors
    /// - `EngineError::Checkpoint` if the batch snapshot cannot be taken
    ///   (fail closed: no edit is attempted)
    /// - `EngineError::SafetyProtocol` if any rollback fails (fatal)
    pub async fn execute_batch(
        &mut self,
        edits: Vec<ScoredEdit>,
    ) -> Result<BatchResult, EngineError> {
        let start = Instant::now();
        self.batch_counter += 1;
        let batch_number = self.batch_counter;

        let edits_attempted = edits.len();
        let safety_score = if edits.is_empty() {
            0.0
        } else {
            edits.iter().map(|e| e.safety_score).sum::<f64>() / edits.len() as f64
        };

        let mut by_file: BTreeMap<PathBuf, Vec<Edit>> = BTreeMap::new();
        for scored in edits {
            by_file
                .entry(scored.edit.file_path.clone())
                .or_default()
                .push(scored.edit);
        }
        let files: Vec<PathBuf> = by_file.keys().cloned().collect();

        tracing::info!(
            batch = batch_number,
            files = files.len(),
            edits = edits_attempted,
            "executing batch"
        );

        // One checkpoint covers the whole rollback unit. Fail closed.
        let batch_token = self.checkpoints.snapshot(&files).await?;

        let mut edits_succeeded = 0usize;
        let mut verification_failures = 0usize;
        let mut rollbacks_performed = 0usize;
        let mut modified: Vec<PathBuf> = Vec::new();

        for (file, file_edits) in &by_file {
            let outcome = match self.replacer.apply_to_file(file_edits).await {
                Ok(outcome) => outcome,
                Err(fatal) => {
                    // Cannot trust on-disk state; stop the batch here
                    self.checkpoints.retain_for_diagnostics(&batch_token);
                    return Err(EngineError::SafetyProtocol(fatal));
                }
            };

            if outcome.success {
                edits_succeeded += outcome.edits_applied;
                modified.push(file.clone());
            } else {
                if outcome.verification.is_some() {
                    verification_failures += 1;
                }
                if outcome.rollback_performed {
                    rollbacks_performed += 1;
                }
                tracing::debug!(
                    file = %file.display(),
                    error = outcome.error.as_deref().unwrap_or("unknown"),
                    "file skipped within batch"
                );
            }
        }

        // Whole-batch verification over everything that changed
        if !modified.is_empty() {
            let scope = if self.config.extended_batch_check {
                VerifyScope::ProjectWithTests
            } else {
                VerifyScope::Files(modified.clone())
            };
            let verification = self
                .verifier
                .verify(scope, self.config.verify_timeout)
                .await?;

            if !verification.success {
                tracing::warn!(
                    batch = batch_number,
                    errors = verification.error_count,
                    "batch verification failed, restoring all files"
                );
                verification_failures += 1;
                rollbacks_performed += 1;
                edits_succeeded = 0;

                if let Err(e) = self.checkpoints.restore(&batch_token).await {
                    self.checkpoints.retain_for_diagnostics(&batch_token);
                    return Err(EngineError::SafetyProtocol(
                        recast_replace::SafetyProtocolError::new(
                            batch_token.files(),
                            format!("batch rollback failed: {e}"),
                        ),
                    ));
                }
                self.checkpoints.retain_for_diagnostics(&batch_token);
            } else {
                self.checkpoints.discard(batch_token).await;
            }
        } else {
            self.checkpoints.discard(batch_token).await;
        }

        let result = BatchResult {
            batch_number,
            files_processed: files.len(),
            edits_attempted,
            edits_succeeded,
            verification_failures,
            rollbacks_performed,
            safety_score,
            duration: start.elapsed(),
        };

        tracing::info!(
            batch = batch_number,
            succeeded = result.edits_succeeded,
            rollbacks = result.rollbacks_performed,
            "batch finished"
        );

        self.history.push(result.clone());
        Ok(result)
    }
}
