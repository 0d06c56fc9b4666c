//! Campaign reporting types
//!
//! Plain data consumed by an external reporting/CLI layer; the engine
//! never formats human-readable output itself.

use crate::adaptive::TargetPlan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Result of one campaign phase, immutable after the phase completes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignPhaseResult {
    /// Phase name
    pub name: String,
    /// Whether the phase ended with a stable build
    pub success: bool,
    /// Edits applied and still standing when the phase ended
    pub edits_applied: usize,
    /// Per-phase observations (rejections, skips, measurements)
    pub details: Vec<String>,
}

impl CampaignPhaseResult {
    /// Create phase result
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, success: bool, edits_applied: usize) -> Self {
        Self {
            name: name.into(),
            success,
            edits_applied,
            details: Vec::new(),
        }
    }

    /// With details
    #[inline]
    #[must_use]
    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }
}

/// Final campaign report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalReport {
    /// Campaign identity
    pub campaign_id: Ulid,
    /// When the campaign started
    pub started_at: DateTime<Utc>,
    /// When the campaign finished
    pub completed_at: DateTime<Utc>,
    /// Phase results in execution order
    pub phases: Vec<CampaignPhaseResult>,
    /// Candidate sites measured before any edit
    pub baseline_candidates: usize,
    /// Candidate sites remaining at the end
    pub remaining_candidates: usize,
    /// Achieved reduction in percent
    pub achieved_reduction_pct: f64,
    /// The plan the campaign pursued
    pub target: TargetPlan,
    /// Whether the achieved reduction met the recommended target
    pub target_achieved: bool,
    /// Whether the final build is stable
    pub build_stable: bool,
    /// Campaign success: every phase ran without a fatal error and the
    /// final build is stable (target achievement does not gate this)
    pub success: bool,
    /// Operator recommendations
    pub recommendations: Vec<String>,
    /// Suggested next steps
    pub next_steps: Vec<String>,
}

impl FinalReport {
    /// Total edits applied across all phases
    #[inline]
    #[must_use]
    pub fn total_edits_applied(&self) -> usize {
        self.phases.iter().map(|p| p.edits_applied).sum()
    }

    /// Phase result by name
    #[must_use]
    pub fn phase(&self, name: &str) -> Option<&CampaignPhaseResult> {
        self.phases.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> FinalReport {
        FinalReport {
            campaign_id: Ulid::new(),
            started_at: Utc::now(),
            completed_at: Utc::now(),
            phases: vec![
                CampaignPhaseResult::new("baseline-analysis", true, 0),
                CampaignPhaseResult::new("high-confidence-pass", true, 7),
            ],
            baseline_candidates: 40,
            remaining_candidates: 33,
            achieved_reduction_pct: 17.5,
            target: TargetPlan {
                recommended_target: 25.0,
                milestones: vec![6.25, 12.5, 18.75, 25.0],
                reasoning: "40 candidates across 12 files, 10% in test files".to_string(),
            },
            target_achieved: false,
            build_stable: true,
            success: true,
            recommendations: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    #[test]
    fn totals_and_lookup() {
        let report = sample_report();
        assert_eq!(report.total_edits_applied(), 7);
        assert!(report.phase("baseline-analysis").is_some());
        assert!(report.phase("missing").is_none());
    }

    #[test]
    fn report_serializes_as_plain_data() {
        let report = sample_report();
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("high-confidence-pass"));
        assert!(json.contains("achieved_reduction_pct"));
    }
}
