//! Campaign Executor
//!
//! Runs the fixed ordered phase sequence, each phase gated on a stable
//! build at entry and required to end stable or be rolled back:
//! 1. baseline analysis (measures, applies nothing)
//! 2. high-confidence pass
//! 3. medium-risk pass (tightened safety policy)
//! 4. domain-specific pass (per-domain batches, isolated failures)
//! 5. documentation pass (pure annotation)
//! 6. final validation and reporting
//!
//! A campaign always ends in a state at least as good as its start
//! unless a [`SafetyProtocolError`] is raised, in which case the error
//! names the files that may be inconsistent and no success is claimed.

use crate::adaptive::{adapt_strategy, monitor_progress, set_realistic_targets, TargetPlan};
use crate::batch::{BatchCoordinator, ScoredEdit};
use crate::config::{AdaptiveConfig, CampaignConfig, EngineConfig};
use crate::error::EngineError;
use crate::report::{CampaignPhaseResult, FinalReport};
use chrono::Utc;
use recast_analyze::{
    AnalysisContext, CandidateProducer, Classification, Classifier, ClassifierConfig,
    DomainAnalyzer, Edit, EditContext, MutationCandidate, SafetyPolicy, SafetyScorer,
    SourceLocation,
};
use recast_checkpoint::CheckpointStore;
use recast_replace::{ReplacerConfig, SafetyProtocolError};
use recast_verify::{Verification, VerifierGateway, VerifyScope};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use ulid::Ulid;

const PHASE_BASELINE: &str = "baseline-analysis";
const PHASE_HIGH_CONFIDENCE: &str = "high-confidence-pass";
const PHASE_MEDIUM_RISK: &str = "medium-risk-pass";
const PHASE_DOMAIN: &str = "domain-specific-pass";
const PHASE_DOCUMENTATION: &str = "documentation-pass";
const PHASE_FINAL: &str = "final-validation";

/// Campaign Executor
///
/// Owns the classifier, scorer, and batch coordinator; drives all file
/// mutation from a single logical thread of control.
pub struct CampaignExecutor {
    config: CampaignConfig,
    engine_config: EngineConfig,
    producer: Arc<dyn CandidateProducer>,
    analyzer: Arc<dyn DomainAnalyzer>,
    classifier: Classifier,
    scorer: SafetyScorer,
    coordinator: BatchCoordinator,
    checkpoints: Arc<CheckpointStore>,
    verifier: Arc<dyn VerifierGateway>,
    adaptive: AdaptiveConfig,
}

impl CampaignExecutor {
    /// Create executor
    #[must_use]
    pub fn new(
        config: CampaignConfig,
        engine_config: EngineConfig,
        producer: Arc<dyn CandidateProducer>,
        analyzer: Arc<dyn DomainAnalyzer>,
        checkpoints: Arc<CheckpointStore>,
        verifier: Arc<dyn VerifierGateway>,
    ) -> Self {
        let classifier =
            Classifier::with_analyzer(ClassifierConfig::default(), Arc::clone(&analyzer));
        let coordinator = BatchCoordinator::new(
            engine_config.clone(),
            ReplacerConfig::default(),
            Arc::clone(&checkpoints),
            Arc::clone(&verifier),
        );
        Self {
            config,
            engine_config,
            producer,
            analyzer,
            classifier,
            scorer: SafetyScorer::default(),
            coordinator,
            checkpoints,
            verifier,
            adaptive: AdaptiveConfig::default(),
        }
    }

    /// With a safety policy
    #[inline]
    #[must_use]
    pub fn with_safety_policy(mut self, policy: SafetyPolicy) -> Self {
        self.scorer = SafetyScorer::new(policy);
        self
    }

    /// Batch coordinator (history inspection)
    #[inline]
    #[must_use]
    pub fn coordinator(&self) -> &BatchCoordinator {
        &self.coordinator
    }

    /// Run the full campaign over `files`
    ///
    /// # Errors
    /// - `EngineError::UnstableBuild` if the baseline build is failing
    /// - `EngineError::SafetyProtocol` (fatal) if any rollback fails;
    ///   the error carries the possibly-inconsistent files
    /// - transport-level `EngineError` variants for infrastructure loss
    pub async fn run(&mut self, files: &[PathBuf]) -> Result<FinalReport, EngineError> {
        let campaign_id = Ulid::new();
        let started_at = Utc::now();
        // Strategy resets at campaign start
        self.adaptive = AdaptiveConfig::default();

        tracing::info!(%campaign_id, files = files.len(), "campaign starting");

        // Phase 1: baseline measurement, no edits
        let baseline = self.discover(files).await;
        let baseline_count = baseline.len();
        let target = set_realistic_targets(&baseline, self.config.target_reduction_pct);

        let entry = self.verify_project().await?;
        if !entry.success {
            return Err(EngineError::UnstableBuild(format!(
                "baseline build failing with {} errors; campaign aborted",
                entry.error_count
            )));
        }

        let mut phases = vec![CampaignPhaseResult::new(PHASE_BASELINE, true, 0)
            .with_details(vec![
                format!("{baseline_count} candidate sites discovered"),
                format!(
                    "recommended target {:.1}% ({})",
                    target.recommended_target, target.reasoning
                ),
            ])];

        // Phases 2-5, each gated; a failed phase rolls back and the next
        // phase runs against the prior stable state
        phases.push(self.phase_high_confidence(files).await?);
        phases.push(self.phase_medium_risk(files).await?);
        phases.push(self.phase_domain_specific(files).await?);
        phases.push(self.phase_documentation(files).await?);

        // Phase 6: final validation and report assembly
        let remaining = self.discover(files).await.len();
        let achieved_reduction_pct = if baseline_count == 0 {
            0.0
        } else {
            (baseline_count.saturating_sub(remaining)) as f64 / baseline_count as f64 * 100.0
        };

        let final_scope = if self.engine_config.extended_batch_check {
            VerifyScope::ProjectWithTests
        } else {
            VerifyScope::Project
        };
        let final_verification = self
            .verifier
            .verify(final_scope, self.engine_config.verify_timeout)
            .await?;
        let build_stable = final_verification.success;

        phases.push(
            CampaignPhaseResult::new(PHASE_FINAL, build_stable, 0).with_details(vec![
                format!("{remaining} candidate sites remaining"),
                format!("achieved reduction {achieved_reduction_pct:.1}%"),
            ]),
        );

        let report = self.assemble_report(
            campaign_id,
            started_at,
            phases,
            baseline_count,
            remaining,
            achieved_reduction_pct,
            target,
            build_stable,
        );

        tracing::info!(
            %campaign_id,
            success = report.success,
            reduction = report.achieved_reduction_pct,
            "campaign finished"
        );
        Ok(report)
    }

    /// Phase 2: structurally simple, high-confidence replacements only
    async fn phase_high_confidence(
        &mut self,
        files: &[PathBuf],
    ) -> Result<CampaignPhaseResult, EngineError> {
        let candidates = self.discover(files).await;
        let mut edits = Vec::new();
        let mut details = Vec::new();

        for candidate in &candidates {
            let classification = self.classifier.classify(candidate);
            if classification.is_intentional
                || !classification.category.is_structurally_simple()
                || classification.confidence < self.config.high_confidence_floor
            {
                continue;
            }
            let Some(replacement) = classification.suggested_replacement.clone() else {
                continue;
            };
            match self.admit(candidate, &classification, replacement, &self.scorer) {
                Ok(scored) => edits.push(scored),
                Err(reason) => details.push(reason),
            }
        }

        self.execute_phase(
            PHASE_HIGH_CONFIDENCE,
            vec![("high-confidence".to_string(), edits)],
            details,
        )
        .await
    }

    /// Phase 3: broader categories under a tightened safety policy
    async fn phase_medium_risk(
        &mut self,
        files: &[PathBuf],
    ) -> Result<CampaignPhaseResult, EngineError> {
        let tightened = SafetyScorer::new(
            self.scorer
                .policy()
                .tightened(self.config.medium_risk_tightening),
        );
        let candidates = self.discover(files).await;
        let mut edits = Vec::new();
        let mut details = Vec::new();

        for candidate in &candidates {
            let classification = self.classifier.classify(candidate);
            if classification.is_intentional
                || classification.confidence < self.adaptive.confidence_threshold
            {
                continue;
            }
            let Some(replacement) = classification.suggested_replacement.clone() else {
                continue;
            };
            match self.admit(candidate, &classification, replacement, &tightened) {
                Ok(scored) => edits.push(scored),
                Err(reason) => details.push(reason),
            }
        }

        self.execute_phase(
            PHASE_MEDIUM_RISK,
            vec![("medium-risk".to_string(), edits)],
            details,
        )
        .await
    }

    /// Phase 4: per-domain batches, each rolled back independently
    async fn phase_domain_specific(
        &mut self,
        files: &[PathBuf],
    ) -> Result<CampaignPhaseResult, EngineError> {
        let candidates = self.discover(files).await;
        let mut by_domain: BTreeMap<String, Vec<ScoredEdit>> = BTreeMap::new();
        let mut details = Vec::new();

        for candidate in &candidates {
            let classification = self.classifier.classify(candidate);
            if classification.is_intentional {
                continue;
            }
            let Some(replacement) = classification.suggested_replacement.clone() else {
                continue;
            };
            let report = self.analyzer.analyze(&AnalysisContext {
                file_path: &candidate.file_path,
                snippet: &candidate.snippet,
                surrounding: &candidate.surrounding_context,
                hints: &candidate.domain_hints,
            });
            let domain = report.domain.unwrap_or_else(|| "general".to_string());

            match self.admit(candidate, &classification, replacement, &self.scorer) {
                Ok(scored) => by_domain.entry(domain).or_default().push(scored),
                Err(reason) => details.push(reason),
            }
        }

        let groups: Vec<(String, Vec<ScoredEdit>)> = by_domain.into_iter().collect();
        self.execute_phase(PHASE_DOMAIN, groups, details).await
    }

    /// Phase 5: attach rationale annotations to preserved sites
    ///
    /// Pure insertion, no source-semantic edits.
    async fn phase_documentation(
        &mut self,
        files: &[PathBuf],
    ) -> Result<CampaignPhaseResult, EngineError> {
        let candidates = self.discover(files).await;
        let mut edits = Vec::new();
        let mut annotated_lines: HashSet<(PathBuf, u32)> = HashSet::new();
        let details = Vec::new();

        for candidate in &candidates {
            let classification = self.classifier.classify(candidate);
            if !classification.is_intentional || !classification.requires_documentation {
                continue;
            }
            // Already annotated (this run or a previous one)
            if candidate
                .surrounding_context
                .contains(&self.config.annotation_prefix)
            {
                continue;
            }
            if !annotated_lines.insert((candidate.file_path.clone(), candidate.location.line)) {
                continue;
            }

            let annotation = format!(
                "{} {}\n",
                self.config.annotation_prefix, classification.reasoning
            );
            let edit = Edit::new(
                &candidate.file_path,
                SourceLocation::new(candidate.location.line, 1),
                "",
                annotation,
            )
            .with_confidence(classification.confidence);
            edits.push(ScoredEdit::new(edit, 1.0));
        }

        self.execute_phase(
            PHASE_DOCUMENTATION,
            vec![("documentation".to_string(), edits)],
            details,
        )
        .await
    }

    /// Gate, checkpoint, and execute one phase's edit groups
    ///
    /// Groups execute in order; a non-fatal group failure skips that
    /// group only. The phase commits only if it ends with a stable
    /// build, otherwise every file is restored from the phase
    /// checkpoint and the phase reports failure.
    async fn execute_phase(
        &mut self,
        name: &str,
        groups: Vec<(String, Vec<ScoredEdit>)>,
        mut details: Vec<String>,
    ) -> Result<CampaignPhaseResult, EngineError> {
        let entry = self.verify_project().await?;
        if !entry.success {
            tracing::warn!(phase = name, "build unstable entering phase, skipping");
            return Ok(CampaignPhaseResult::new(name, false, 0).with_details(vec![
                "build unstable entering phase; no edits attempted".to_string(),
            ]));
        }

        if groups.iter().all(|(_, edits)| edits.is_empty()) {
            details.push("no eligible edits".to_string());
            return Ok(CampaignPhaseResult::new(name, true, 0).with_details(details));
        }

        tracing::info!(phase = name, groups = groups.len(), "phase starting");

        // The phase is its own rollback unit over every file it touches
        let phase_files: Vec<PathBuf> = {
            let mut set: std::collections::BTreeSet<PathBuf> = std::collections::BTreeSet::new();
            for (_, edits) in &groups {
                for scored in edits {
                    set.insert(scored.edit.file_path.clone());
                }
            }
            set.into_iter().collect()
        };
        let token = self.checkpoints.snapshot(&phase_files).await?;
        let mut edits_applied = 0usize;
        let mut fatal: Option<EngineError> = None;

        'groups: for (label, edits) in groups {
            if edits.is_empty() {
                continue;
            }
            let mut by_file = group_by_file(edits);

            while !by_file.is_empty() {
                let take = self.adaptive.max_files_per_batch.max(1).min(by_file.len());
                let chunk: Vec<ScoredEdit> = by_file
                    .drain(..take)
                    .flat_map(|(_, group)| group)
                    .collect();

                match self.coordinator.execute_batch(chunk).await {
                    Ok(result) => {
                        edits_applied += result.edits_succeeded;
                        if result.rollbacks_performed > 0 {
                            details.push(format!(
                                "{label}: batch {} rolled back",
                                result.batch_number
                            ));
                        }
                        self.adaptive = adapt_strategy(
                            self.coordinator.history(),
                            &self.engine_config.adaptive_bounds,
                        );
                    }
                    Err(e) if e.is_fatal() => {
                        fatal = Some(e);
                        break 'groups;
                    }
                    Err(e) => {
                        // Isolated group failure; other groups proceed
                        details.push(format!("{label}: batch aborted: {e}"));
                        continue 'groups;
                    }
                }
            }
        }

        if let Some(fatal) = fatal {
            self.checkpoints.retain_for_diagnostics(&token);
            return Err(fatal);
        }

        let exit = self.verify_project().await?;
        if exit.success {
            self.checkpoints.discard(token).await;
            tracing::info!(phase = name, edits_applied, "phase committed");
            return Ok(CampaignPhaseResult::new(name, true, edits_applied).with_details(details));
        }

        // Phase must end stable; restore everything it touched
        if let Err(e) = self.checkpoints.restore(&token).await {
            self.checkpoints.retain_for_diagnostics(&token);
            return Err(EngineError::SafetyProtocol(SafetyProtocolError::new(
                token.files(),
                format!("phase rollback failed: {e}"),
            )));
        }
        self.checkpoints.retain_for_diagnostics(&token);
        details.push(format!(
            "phase verification failed with {} errors; all edits rolled back",
            exit.error_count
        ));
        tracing::warn!(phase = name, "phase rolled back");
        Ok(CampaignPhaseResult::new(name, false, 0).with_details(details))
    }

    /// Discover candidates across the target files
    async fn discover(&self, files: &[PathBuf]) -> Vec<MutationCandidate> {
        let mut all = Vec::new();
        for file in files {
            match tokio::fs::read_to_string(file).await {
                Ok(content) => all.extend(self.producer.find(file, &content)),
                Err(e) => {
                    tracing::warn!(file = %file.display(), error = %e, "skipping unreadable file");
                }
            }
        }
        all
    }

    /// Build and safety-gate one edit; rejections become detail lines
    fn admit(
        &self,
        candidate: &MutationCandidate,
        classification: &Classification,
        replacement: String,
        scorer: &SafetyScorer,
    ) -> Result<ScoredEdit, String> {
        let edit = Edit::new(
            &candidate.file_path,
            candidate.location,
            &candidate.snippet,
            replacement,
        )
        .with_confidence(classification.confidence);
        let context = EditContext::from_candidate(candidate, classification);
        let assessment = scorer.score(&edit, &context);

        if assessment.is_valid {
            Ok(ScoredEdit::new(edit, assessment.score))
        } else {
            Err(format!(
                "rejected {}:{}: {}",
                candidate.file_path.display(),
                candidate.location,
                assessment.validation_errors.join("; ")
            ))
        }
    }

    async fn verify_project(&self) -> Result<Verification, EngineError> {
        Ok(self
            .verifier
            .verify(VerifyScope::Project, self.engine_config.verify_timeout)
            .await?)
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble_report(
        &self,
        campaign_id: Ulid,
        started_at: chrono::DateTime<Utc>,
        phases: Vec<CampaignPhaseResult>,
        baseline_candidates: usize,
        remaining_candidates: usize,
        achieved_reduction_pct: f64,
        target: TargetPlan,
        build_stable: bool,
    ) -> FinalReport {
        let signal = monitor_progress(
            self.coordinator.history(),
            self.config.stagnation_window,
            self.config.stagnation_rate,
        );

        let mut recommendations = Vec::new();
        if signal.needs_manual_intervention {
            recommendations.push(format!(
                "edit success rate {:.0}% over the last {} batches; manual review recommended",
                signal.recent_success_rate * 100.0,
                signal.batches_observed
            ));
        }

        let mut next_steps = Vec::new();
        for phase in phases.iter().filter(|p| !p.success) {
            next_steps.push(format!("investigate and re-run {}", phase.name));
        }
        if remaining_candidates > 0 {
            next_steps.push(format!(
                "{remaining_candidates} candidate sites remain; consider a follow-up campaign"
            ));
        }

        let target_achieved = achieved_reduction_pct >= target.recommended_target;

        FinalReport {
            campaign_id,
            started_at,
            completed_at: Utc::now(),
            phases,
            baseline_candidates,
            remaining_candidates,
            achieved_reduction_pct,
            target,
            target_achieved,
            build_stable,
            success: build_stable,
            recommendations,
            next_steps,
        }
    }
}

/// Group edits by file, path-ordered (deterministic for a given input)
fn group_by_file(edits: Vec<ScoredEdit>) -> Vec<(PathBuf, Vec<ScoredEdit>)> {
    let mut by_file: BTreeMap<PathBuf, Vec<ScoredEdit>> = BTreeMap::new();
    for scored in edits {
        by_file
            .entry(scored.edit.file_path.clone())
            .or_default()
            .push(scored);
    }
    by_file.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use recast_analyze::CandidateCategory;

    #[test]
    fn group_by_file_is_path_ordered() {
        let edits = vec![
            ScoredEdit::new(
                Edit::new("src/z.ts", SourceLocation::new(1, 1), "any", "unknown"),
                0.8,
            ),
            ScoredEdit::new(
                Edit::new("src/a.ts", SourceLocation::new(1, 1), "any", "unknown"),
                0.8,
            ),
            ScoredEdit::new(
                Edit::new("src/z.ts", SourceLocation::new(2, 1), "any", "unknown"),
                0.8,
            ),
        ];

        let grouped = group_by_file(edits);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].0, PathBuf::from("src/a.ts"));
        assert_eq!(grouped[0].1.len(), 1);
        assert_eq!(grouped[1].1.len(), 2);
    }

    #[test]
    fn phase_names_are_distinct() {
        let names = [
            PHASE_BASELINE,
            PHASE_HIGH_CONFIDENCE,
            PHASE_MEDIUM_RISK,
            PHASE_DOMAIN,
            PHASE_DOCUMENTATION,
            PHASE_FINAL,
        ];
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn tightened_scorer_raises_bar() {
        let base = SafetyScorer::new(SafetyPolicy::default());
        let tightened = SafetyScorer::new(base.policy().tightened(0.2));

        let edit = Edit::new("src/a.ts", SourceLocation::new(1, 1), ": any", ": unknown")
            .with_confidence(0.6);
        let context = EditContext {
            file_role: recast_analyze::FileRole::Source,
            category: CandidateCategory::TypeAnnotation,
            in_error_handling: false,
            surrounding_text: String::new(),
        };

        assert!(base.score(&edit, &context).is_valid);
        assert!(!tightened.score(&edit, &context).is_valid);
    }
}
