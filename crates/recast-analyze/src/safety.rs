//! Safety scoring for proposed edits
//!
//! Independent of classification confidence: a structural risk estimate
//! for performing one specific edit, gating whether it is attempted at
//! all. Pure function of (edit, context, policy); never mutates files or
//! state.

use crate::candidate::{CandidateCategory, Edit, FileRole, MutationCandidate};
use crate::classify::Classification;
use serde::{Deserialize, Serialize};

/// Safety thresholds and factor weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyPolicy {
    /// Minimum score for an edit to be attempted
    pub min_safety_score: f64,
    /// Bonus for edits inside test files
    pub test_file_bonus: f64,
    /// Bonus for structurally simple collection-element edits
    pub collection_bonus: f64,
    /// Penalty for edits inside error-handling context
    pub error_context_penalty: f64,
    /// Penalty for function-parameter edits (behavior-sensitive)
    pub parameter_penalty: f64,
    /// Bonus when type-definition keywords surround the site
    pub type_keyword_bonus: f64,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            min_safety_score: 0.5,
            test_file_bonus: 0.1,
            collection_bonus: 0.1,
            error_context_penalty: 0.2,
            parameter_penalty: 0.15,
            type_keyword_bonus: 0.05,
        }
    }
}

impl SafetyPolicy {
    /// With a minimum score
    #[inline]
    #[must_use]
    pub fn with_min_score(mut self, min: f64) -> Self {
        self.min_safety_score = min.clamp(0.0, 1.0);
        self
    }

    /// Tightened copy of this policy (raised minimum score)
    ///
    /// Used by broader passes that take on riskier categories.
    #[inline]
    #[must_use]
    pub fn tightened(&self, delta: f64) -> Self {
        let mut policy = self.clone();
        policy.min_safety_score = (policy.min_safety_score + delta).clamp(0.0, 1.0);
        policy
    }
}

/// Structural context of one proposed edit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditContext {
    /// Role of the file being edited
    pub file_role: FileRole,
    /// Category of the underlying candidate
    pub category: CandidateCategory,
    /// Whether the site sits inside error-handling flow
    pub in_error_handling: bool,
    /// Raw surrounding text (keyword checks)
    pub surrounding_text: String,
}

impl EditContext {
    /// Build context from a candidate and its classification
    #[must_use]
    pub fn from_candidate(candidate: &MutationCandidate, classification: &Classification) -> Self {
        let lower = candidate.surrounding_context.to_lowercase();
        Self {
            file_role: candidate.file_role(),
            category: classification.category,
            in_error_handling: classification.category == CandidateCategory::ErrorHandling
                || lower.contains("catch")
                || lower.contains("throw"),
            surrounding_text: candidate.surrounding_context.clone(),
        }
    }

    /// Whether type-definition keywords appear near the site
    #[must_use]
    pub fn near_type_definition(&self) -> bool {
        let lower = self.surrounding_text.to_lowercase();
        ["interface ", "type ", "class ", "struct ", "enum "]
            .iter()
            .any(|kw| lower.contains(kw))
    }
}

/// Risk assessment for one proposed edit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyAssessment {
    /// Final clamped score, [0, 1]
    pub score: f64,
    /// True iff score meets the policy minimum
    pub is_valid: bool,
    /// Non-blocking observations
    pub warnings: Vec<String>,
    /// Suggested follow-ups for the operator
    pub recommendations: Vec<String>,
    /// Reproducible reasons the edit was rejected (empty when valid)
    pub validation_errors: Vec<String>,
}

/// Safety Scorer
///
/// Starts from the edit's classification confidence and adjusts by
/// structural factors, clamping to [0, 1].
#[derive(Debug, Clone)]
pub struct SafetyScorer {
    policy: SafetyPolicy,
}

impl SafetyScorer {
    /// Create scorer with a policy
    #[inline]
    #[must_use]
    pub fn new(policy: SafetyPolicy) -> Self {
        Self { policy }
    }

    /// Current policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &SafetyPolicy {
        &self.policy
    }

    /// Score one proposed edit
    #[must_use]
    pub fn score(&self, edit: &Edit, context: &EditContext) -> SafetyAssessment {
        let mut score = edit.confidence;
        let mut warnings = Vec::new();
        let mut recommendations = Vec::new();

        if context.file_role.is_test() {
            score += self.policy.test_file_bonus;
        }
        if context.category == CandidateCategory::CollectionElement {
            score += self.policy.collection_bonus;
        }
        if context.in_error_handling {
            score -= self.policy.error_context_penalty;
            warnings.push("edit sits inside error-handling flow".to_string());
        }
        if context.category == CandidateCategory::FunctionParameter {
            score -= self.policy.parameter_penalty;
            warnings.push("function-parameter edits can change call contracts".to_string());
            recommendations.push("verify all call sites after this batch".to_string());
        }
        if context.near_type_definition() {
            score += self.policy.type_keyword_bonus;
        }

        let score = score.clamp(0.0, 1.0);
        let is_valid = score >= self.policy.min_safety_score;

        let validation_errors = if is_valid {
            Vec::new()
        } else {
            vec![format!(
                "safety score {score:.2} below minimum {:.2}",
                self.policy.min_safety_score
            )]
        };

        SafetyAssessment {
            score,
            is_valid,
            warnings,
            recommendations,
            validation_errors,
        }
    }
}

impl Default for SafetyScorer {
    fn default() -> Self {
        Self::new(SafetyPolicy::default())
    }
}
