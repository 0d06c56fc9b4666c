//! Adaptive strategy
//!
//! Pure functions from batch history (plus fixed bounds) to strategy:
//! no in-flight state is ever consulted, so the same history always
//! yields the same decisions.

use crate::batch::BatchHistory;
use crate::config::{AdaptiveBounds, AdaptiveConfig, SafetyLevel};
use recast_analyze::MutationCandidate;
use serde::{Deserialize, Serialize};

/// Recommended reduction target with milestones
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetPlan {
    /// Achievable reduction, percent of discovered sites
    pub recommended_target: f64,
    /// Strictly increasing milestone percentages ending at the target
    pub milestones: Vec<f64>,
    /// How the recommendation was derived
    pub reasoning: String,
}

/// Stagnation signal derived from recent batches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSignal {
    /// True when recent batches show near-zero successful edits
    pub needs_manual_intervention: bool,
    /// Successful-edit rate over the observed window
    pub recent_success_rate: f64,
    /// Batches the signal was computed from
    pub batches_observed: usize,
}

/// Recompute strategy from the last `bounds.window` batch results
///
/// Low recent safety shrinks batches and raises the confidence bar;
/// high safety with zero rollbacks grows batches up to the hard cap.
/// The result always satisfies
/// `min_files_per_batch <= max_files_per_batch <= hard_cap`.
#[must_use]
pub fn adapt_strategy(history: &BatchHistory, bounds: &AdaptiveBounds) -> AdaptiveConfig {
    let mut config = AdaptiveConfig::default();
    let recent = history.recent(bounds.window);
    if recent.is_empty() {
        return config;
    }

    let avg_safety =
        recent.iter().map(|r| r.safety_score).sum::<f64>() / recent.len() as f64;
    let rollbacks: usize = recent.iter().map(|r| r.rollbacks_performed).sum();

    if avg_safety < bounds.low_watermark {
        config.max_files_per_batch =
            (config.max_files_per_batch / 2).max(bounds.min_files_per_batch);
        config.confidence_threshold = (config.confidence_threshold + bounds.threshold_step)
            .min(bounds.max_confidence_threshold);
        config.safety_level = SafetyLevel::Strict;
        tracing::info!(
            avg_safety,
            max_files = config.max_files_per_batch,
            threshold = config.confidence_threshold,
            "recent safety below low-watermark, tightening strategy"
        );
    } else if avg_safety >= bounds.high_watermark && rollbacks == 0 {
        config.max_files_per_batch = (config.max_files_per_batch * 2).min(bounds.hard_cap);
        config.safety_level = SafetyLevel::Relaxed;
        tracing::info!(
            avg_safety,
            max_files = config.max_files_per_batch,
            "healthy history, growing batches"
        );
    }

    config.max_files_per_batch = config
        .max_files_per_batch
        .clamp(bounds.min_files_per_batch, bounds.hard_cap);
    config
}

/// Derive an achievable target from a fresh sample of candidate sites
///
/// Targets shrink when most discovered sites live in test files, where
/// a rewrite buys little. Zero candidates still produce a positive
/// default so the campaign can report meaningfully.
#[must_use]
pub fn set_realistic_targets(sample: &[MutationCandidate], default_target: f64) -> TargetPlan {
    let default_target = default_target.max(1.0);

    if sample.is_empty() {
        return TargetPlan {
            recommended_target: default_target,
            milestones: milestones_to(default_target),
            reasoning: "no candidates discovered across 0 files; keeping default target"
                .to_string(),
        };
    }

    let files: std::collections::HashSet<_> = sample.iter().map(|c| &c.file_path).collect();
    let in_tests = sample.iter().filter(|c| c.file_role().is_test()).count();
    let test_fraction = in_tests as f64 / sample.len() as f64;

    let recommended = if test_fraction > 0.5 {
        (default_target * 0.6).max(1.0)
    } else {
        default_target
    };

    TargetPlan {
        recommended_target: recommended,
        milestones: milestones_to(recommended),
        reasoning: format!(
            "{} candidates across {} files, {:.0}% in test files",
            sample.len(),
            files.len(),
            test_fraction * 100.0
        ),
    }
}

/// Flag stagnation over the most recent `window` batches
///
/// A signal for the operator, not an automatic abort.
#[must_use]
pub fn monitor_progress(
    history: &BatchHistory,
    window: usize,
    stagnation_rate: f64,
) -> ProgressSignal {
    let recent = history.recent(window);
    let attempted: usize = recent.iter().map(|r| r.edits_attempted).sum();
    let succeeded: usize = recent.iter().map(|r| r.edits_succeeded).sum();
    let rate = if attempted == 0 {
        0.0
    } else {
        succeeded as f64 / attempted as f64
    };

    let needs_manual_intervention = recent.len() >= window && rate <= stagnation_rate;
    if needs_manual_intervention {
        tracing::warn!(
            rate,
            batches = recent.len(),
            "sustained near-zero edit success, flagging for manual intervention"
        );
    }

    ProgressSignal {
        needs_manual_intervention,
        recent_success_rate: rate,
        batches_observed: recent.len(),
    }
}

/// Quarter-point milestones up to `target`, strictly increasing
fn milestones_to(target: f64) -> Vec<f64> {
    [0.25, 0.5, 0.75, 1.0]
        .iter()
        .map(|f| target * f)
        .collect()
}
