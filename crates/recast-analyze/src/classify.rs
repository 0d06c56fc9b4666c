//! Candidate classification
//!
//! Decides whether a discovered site is an intentional construct to
//! preserve or a candidate for replacement, with a confidence score.
//! Deterministic within a run and cached per `(file, location)`.

use crate::candidate::{CandidateCategory, MutationCandidate, SourceLocation};
use crate::domain::{AnalysisContext, DomainAnalyzer, NullAnalyzer};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Classifier weighting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Confidence when no signal is present
    pub neutral_confidence: f64,
    /// Hard floor for any reported confidence
    pub confidence_floor: f64,
    /// Weight of a nearby human-authored explanation
    pub explanation_weight: f64,
    /// Weight of the category prior
    pub prior_weight: f64,
    /// Weight of domain analyzer signals
    pub domain_weight: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            neutral_confidence: 0.5,
            confidence_floor: 0.3,
            explanation_weight: 0.2,
            prior_weight: 0.15,
            domain_weight: 0.2,
        }
    }
}

/// Verdict for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// True if the site looks intentional and should be preserved
    pub is_intentional: bool,
    /// Confidence in the verdict, [0, 1]
    pub confidence: f64,
    /// Category assigned to the site
    pub category: CandidateCategory,
    /// Human-readable account of the signals used
    pub reasoning: String,
    /// Concrete replacement when the verdict is "replace"
    pub suggested_replacement: Option<String>,
    /// True if a preserved site lacks a nearby rationale
    pub requires_documentation: bool,
}

/// Candidate Classifier
///
/// Combines nearby-explanation quality, category priors, and advisory
/// domain signals into a [`Classification`]. Never fails: internal
/// lookup problems produce a low-confidence review verdict instead.
pub struct Classifier {
    config: ClassifierConfig,
    analyzer: Arc<dyn DomainAnalyzer>,
    cache: DashMap<(PathBuf, SourceLocation), Classification>,
}

impl Classifier {
    /// Create classifier with the default (null) domain analyzer
    #[inline]
    #[must_use]
    pub fn new(config: ClassifierConfig) -> Self {
        Self::with_analyzer(config, Arc::new(NullAnalyzer))
    }

    /// Create classifier with a domain analyzer
    #[inline]
    #[must_use]
    pub fn with_analyzer(config: ClassifierConfig, analyzer: Arc<dyn DomainAnalyzer>) -> Self {
        Self {
            config,
            analyzer,
            cache: DashMap::new(),
        }
    }

    /// Classify a candidate
    ///
    /// Same candidate and context yield the same classification within
    /// one run; results are cached by `(file, location)`.
    pub fn classify(&self, candidate: &MutationCandidate) -> Classification {
        if let Some(hit) = self.cache.get(&candidate.key()) {
            return hit.clone();
        }
        let classification = self.classify_uncached(candidate);
        self.cache.insert(candidate.key(), classification.clone());
        classification
    }

    /// Number of cached classifications
    #[inline]
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    fn classify_uncached(&self, candidate: &MutationCandidate) -> Classification {
        if candidate.snippet.is_empty() {
            return self.review_fallback("candidate snippet was empty");
        }

        let category = Self::categorize(candidate);
        let explanation = Self::explanation_quality(&candidate.surrounding_context);
        let report = self.analyzer.analyze(&AnalysisContext {
            file_path: &candidate.file_path,
            snippet: &candidate.snippet,
            surrounding: &candidate.surrounding_context,
            hints: &candidate.domain_hints,
        });

        let mut preserve = 0.0_f64;
        let mut replace = 0.0_f64;
        let mut signals: Vec<&str> = Vec::new();

        if let Some(quality) = explanation {
            preserve += self.config.explanation_weight * quality;
            signals.push("explained by a nearby comment");
        }
        if category.prefers_preservation() {
            preserve += self.config.prior_weight;
            signals.push("category defaults to preserve");
        } else if category.is_structurally_simple() {
            replace += self.config.prior_weight;
            signals.push("structurally simple category");
        }
        if !report.preservation_reasons.is_empty() {
            preserve += self.config.domain_weight;
            signals.push("domain analyzer recommends preserving");
        }
        if !report.suggested_types.is_empty() {
            replace += self.config.domain_weight;
            signals.push("domain analyzer suggests a concrete type");
        }

        let no_signal = signals.is_empty();
        let is_intentional = if no_signal {
            category.prefers_preservation()
        } else {
            preserve >= replace
        };

        let confidence = if no_signal {
            self.config.neutral_confidence
        } else {
            (self.config.neutral_confidence + (preserve - replace).abs())
                .clamp(self.config.confidence_floor, 1.0)
        };

        let suggested_replacement = if is_intentional {
            None
        } else {
            Self::suggest_replacement(candidate, &report)
        };

        let reasoning = if no_signal {
            "no discovery signals; neutral default".to_string()
        } else {
            signals.join("; ")
        };

        tracing::debug!(
            file = %candidate.file_path.display(),
            location = %candidate.location,
            ?category,
            is_intentional,
            confidence,
            "candidate classified"
        );

        Classification {
            is_intentional,
            confidence,
            category,
            reasoning,
            suggested_replacement,
            requires_documentation: is_intentional && explanation.is_none(),
        }
    }

    /// Category from the surrounding context, producer hints, then
    /// lexical heuristics
    ///
    /// Error-handling context outranks the lexical shape of the match:
    /// a parameter annotation inside a catch block is still an
    /// error-handling site.
    fn categorize(candidate: &MutationCandidate) -> CandidateCategory {
        let context = candidate.surrounding_context.to_lowercase();
        if context.contains("catch") || context.contains("throw") {
            return CandidateCategory::ErrorHandling;
        }
        if candidate.file_role().is_test() {
            return CandidateCategory::TestFixture;
        }

        for hint in &candidate.domain_hints {
            if let Some(name) = hint.strip_prefix("category:") {
                return match name {
                    "ErrorHandling" => CandidateCategory::ErrorHandling,
                    "ExternalBoundary" => CandidateCategory::ExternalBoundary,
                    "CollectionElement" => CandidateCategory::CollectionElement,
                    "FunctionParameter" => CandidateCategory::FunctionParameter,
                    "TypeAnnotation" => CandidateCategory::TypeAnnotation,
                    "TestFixture" => CandidateCategory::TestFixture,
                    _ => CandidateCategory::Unknown,
                };
            }
        }

        if context.contains("fetch") || context.contains("response") || context.contains(".json(")
        {
            CandidateCategory::ExternalBoundary
        } else if candidate.snippet.contains("[]") || candidate.snippet.contains("Array<") {
            CandidateCategory::CollectionElement
        } else if candidate.snippet.contains(':') {
            CandidateCategory::TypeAnnotation
        } else {
            CandidateCategory::Unknown
        }
    }

    /// Quality of a nearby human-authored explanation, if any
    ///
    /// Comment lines with at least three words count; quality grows with
    /// length and saturates at 1.0.
    fn explanation_quality(surrounding: &str) -> Option<f64> {
        let words: usize = surrounding
            .lines()
            .map(str::trim)
            .filter(|line| {
                line.starts_with("//") || line.starts_with('*') || line.starts_with("/*")
            })
            .map(|line| line.split_whitespace().count().saturating_sub(1))
            .sum();

        if words >= 3 {
            Some((words as f64 / 12.0).min(1.0))
        } else {
            None
        }
    }

    fn suggest_replacement(
        candidate: &MutationCandidate,
        report: &crate::domain::DomainReport,
    ) -> Option<String> {
        if let Some(suggested) = report.suggested_types.first() {
            return Some(candidate.snippet.replace("any", suggested));
        }
        for hint in &candidate.domain_hints {
            if let Some(replacement) = hint.strip_prefix("replace-with:") {
                return Some(replacement.to_string());
            }
        }
        if candidate.snippet.contains("any") {
            return Some(candidate.snippet.replace("any", "unknown"));
        }
        None
    }

    fn review_fallback(&self, reason: &str) -> Classification {
        Classification {
            is_intentional: true,
            confidence: self.config.confidence_floor,
            category: CandidateCategory::Unknown,
            reasoning: format!("{reason}; flagged for manual review"),
            suggested_replacement: None,
            requires_documentation: true,
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainReport;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    #[derive(Debug)]
    struct SuggestingAnalyzer;

    impl DomainAnalyzer for SuggestingAnalyzer {
        fn analyze(&self, _context: &AnalysisContext<'_>) -> DomainReport {
            DomainReport {
                domain: Some("http-api".to_string()),
                suggested_types: vec!["ApiResponse".to_string()],
                preservation_reasons: Vec::new(),
                hints: Vec::new(),
            }
        }

        fn name(&self) -> &'static str {
            "suggesting"
        }
    }

    fn candidate_at(line: u32, snippet: &str, context: &str) -> MutationCandidate {
        MutationCandidate::new("src/a.ts", SourceLocation::new(line, 1), snippet)
            .with_context(context)
    }

    #[test]
    fn classification_is_cached_and_deterministic() {
        let classifier = Classifier::default();
        let candidate = candidate_at(3, ": any", "const a: any = 1;");

        let first = classifier.classify(&candidate);
        let second = classifier.classify(&candidate);
        assert_eq!(first, second);
        assert_eq!(classifier.cached_count(), 1);
    }

    #[test]
    fn documented_error_handling_is_preserved() {
        let classifier = Classifier::default();
        let candidate = candidate_at(
            8,
            ": any",
            "// errors from the gateway have no stable shape here\ntry {\n} catch (e: any) {",
        );

        let result = classifier.classify(&candidate);
        assert!(result.is_intentional);
        assert!(!result.requires_documentation);
        assert_eq!(result.category, CandidateCategory::ErrorHandling);
        assert!(result.confidence > 0.5);
    }

    #[test]
    fn undocumented_preserve_requires_documentation() {
        let classifier = Classifier::default();
        let candidate = candidate_at(8, ": any", "try {\n} catch (e: any) {");

        let result = classifier.classify(&candidate);
        assert!(result.is_intentional);
        assert!(result.requires_documentation);
    }

    #[test]
    fn collection_sites_lean_replace() {
        let classifier = Classifier::default();
        let candidate = candidate_at(2, "any[]", "const xs: any[] = [];");

        let result = classifier.classify(&candidate);
        assert!(!result.is_intentional);
        assert_eq!(result.category, CandidateCategory::CollectionElement);
        assert_eq!(result.suggested_replacement.as_deref(), Some("unknown[]"));
    }

    #[test]
    fn no_signal_floors_at_neutral_default() {
        let classifier = Classifier::default();
        let candidate = MutationCandidate::new(
            "src/misc.ts",
            SourceLocation::new(1, 1),
            "something",
        );

        let result = classifier.classify(&candidate);
        assert_eq!(result.confidence, 0.5);
        assert!(result.reasoning.contains("neutral default"));
    }

    #[test]
    fn empty_snippet_yields_review_fallback() {
        let classifier = Classifier::default();
        let candidate =
            MutationCandidate::new(Path::new("src/a.ts"), SourceLocation::new(1, 1), "");

        let result = classifier.classify(&candidate);
        assert!(result.is_intentional);
        assert!(result.requires_documentation);
        assert_eq!(result.confidence, 0.3);
        assert!(result.reasoning.contains("review"));
    }

    #[test]
    fn domain_suggestion_drives_replacement() {
        let classifier = Classifier::with_analyzer(
            ClassifierConfig::default(),
            Arc::new(SuggestingAnalyzer),
        );
        let candidate = candidate_at(4, ": any", "const res: any = await call();");

        let result = classifier.classify(&candidate);
        assert!(!result.is_intentional);
        assert_eq!(
            result.suggested_replacement.as_deref(),
            Some(": ApiResponse")
        );
    }

    #[test]
    fn producer_category_hint_wins() {
        let classifier = Classifier::default();
        let candidate = candidate_at(4, ": any", "const xs = [];")
            .with_hint("category:CollectionElement");

        let result = classifier.classify(&candidate);
        assert_eq!(result.category, CandidateCategory::CollectionElement);
    }
}
