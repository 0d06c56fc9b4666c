//! Candidate producers
//!
//! Discovery is a pluggable strategy: the engine consumes
//! [`CandidateProducer`] as a pure iterator over a file's contents and
//! never depends on how sites are found. [`LexicalProducer`] is the
//! default pattern-based strategy; a parser-backed producer can replace
//! it without touching the engine.

use crate::candidate::{CandidateCategory, MutationCandidate, SourceLocation};
use regex::Regex;

/// Lines of context captured around each match
const CONTEXT_LINES: usize = 2;

/// Producer errors (configuration only; discovery itself is infallible)
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    /// A discovery pattern failed to compile
    #[error("invalid discovery pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Regex compile error
        #[source]
        source: regex::Error,
    },
}

/// Pluggable candidate discovery strategy
pub trait CandidateProducer: Send + Sync {
    /// Find all candidates in one file's contents
    ///
    /// Must yield stable `(file_path, location)` identities for a given
    /// input, ordered by position.
    fn find(&self, file_path: &std::path::Path, content: &str) -> Vec<MutationCandidate>;

    /// Producer name (for debugging/reporting)
    fn name(&self) -> &'static str;
}

/// One lexical discovery rule
#[derive(Debug, Clone)]
pub struct LexicalRule {
    pattern: Regex,
    category: CandidateCategory,
    replacement_hint: Option<String>,
}

impl LexicalRule {
    /// Compile a rule from a pattern
    ///
    /// # Errors
    /// Returns `ProducerError::InvalidPattern` if the pattern is invalid
    pub fn new(
        pattern: &str,
        category: CandidateCategory,
    ) -> Result<Self, ProducerError> {
        let pattern = Regex::new(pattern).map_err(|source| ProducerError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern,
            category,
            replacement_hint: None,
        })
    }

    /// With a replacement hint attached to every match
    #[inline]
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.replacement_hint = Some(hint.into());
        self
    }

    /// Category this rule assigns
    #[inline]
    #[must_use]
    pub fn category(&self) -> CandidateCategory {
        self.category
    }
}

/// Pattern-based candidate producer
#[derive(Debug, Clone)]
pub struct LexicalProducer {
    rules: Vec<LexicalRule>,
}

impl LexicalProducer {
    /// Create producer from rules
    ///
    /// Rule order matters: when two rules match the same location, the
    /// earlier rule wins (put specific rules before general ones).
    #[inline]
    #[must_use]
    pub fn new(rules: Vec<LexicalRule>) -> Self {
        Self { rules }
    }

    /// Default rule set for loosely-typed annotation sites
    ///
    /// # Errors
    /// Never in practice; patterns are fixed and valid
    pub fn loose_type_rules() -> Result<Self, ProducerError> {
        let rules = vec![
            LexicalRule::new(r"\(\s*\w+\s*:\s*any\b", CandidateCategory::FunctionParameter)?,
            LexicalRule::new(r"Array<any>", CandidateCategory::CollectionElement)?
                .with_hint("Array<unknown>"),
            LexicalRule::new(r"\bany\[\]", CandidateCategory::CollectionElement)?
                .with_hint("unknown[]"),
            LexicalRule::new(r"\bas any\b", CandidateCategory::TypeAnnotation)?,
            LexicalRule::new(r":\s*any\b", CandidateCategory::TypeAnnotation)?,
        ];
        Ok(Self::new(rules))
    }

    fn context_around(lines: &[&str], idx: usize) -> String {
        let start = idx.saturating_sub(CONTEXT_LINES);
        let end = (idx + CONTEXT_LINES + 1).min(lines.len());
        lines[start..end].join("\n")
    }
}

impl CandidateProducer for LexicalProducer {
    fn find(&self, file_path: &std::path::Path, content: &str) -> Vec<MutationCandidate> {
        let lines: Vec<&str> = content.lines().collect();
        let mut found: Vec<(SourceLocation, MutationCandidate)> = Vec::new();

        for (idx, line) in lines.iter().enumerate() {
            // Spans already claimed on this line; earlier rules win overlaps
            let mut claimed: Vec<(usize, usize)> = Vec::new();

            for rule in &self.rules {
                for m in rule.pattern.find_iter(line) {
                    if claimed
                        .iter()
                        .any(|&(start, end)| m.start() < end && start < m.end())
                    {
                        continue;
                    }
                    claimed.push((m.start(), m.end()));

                    let location =
                        SourceLocation::new((idx + 1) as u32, (m.start() + 1) as u32);
                    let mut candidate =
                        MutationCandidate::new(file_path, location, m.as_str())
                            .with_context(Self::context_around(&lines, idx))
                            .with_hint(format!("category:{:?}", rule.category));
                    if let Some(hint) = &rule.replacement_hint {
                        candidate = candidate.with_hint(format!("replace-with:{hint}"));
                    }
                    found.push((location, candidate));
                }
            }
        }

        found.sort_by_key(|(loc, _)| *loc);
        found.into_iter().map(|(_, c)| c).collect()
    }

    fn name(&self) -> &'static str {
        "lexical"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn finds_annotation_sites_in_order() {
        let producer = LexicalProducer::loose_type_rules().unwrap();
        let content = "const a: any = 1;\nconst xs: any[] = [];\nconst b = c as any;\n";

        let candidates = producer.find(Path::new("src/a.ts"), content);
        assert_eq!(candidates.len(), 3);
        assert!(candidates.windows(2).all(|w| w[0].location < w[1].location));
        assert_eq!(candidates[0].location.line, 1);
    }

    #[test]
    fn parameter_rule_wins_over_annotation_rule() {
        let producer = LexicalProducer::loose_type_rules().unwrap();
        let content = "function f(x: any) { return x; }\n";

        let candidates = producer.find(Path::new("src/a.ts"), content);
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0]
            .domain_hints
            .iter()
            .any(|h| h.contains("FunctionParameter")));
    }

    #[test]
    fn collection_rule_attaches_replacement_hint() {
        let producer = LexicalProducer::loose_type_rules().unwrap();
        let content = "let xs: Array<any> = [];\n";

        let candidates = producer.find(Path::new("src/a.ts"), content);
        assert!(candidates[0]
            .domain_hints
            .iter()
            .any(|h| h == "replace-with:Array<unknown>"));
    }

    #[test]
    fn overlapping_matches_yield_one_candidate() {
        let producer = LexicalProducer::loose_type_rules().unwrap();
        let content = "const xs: any[] = [];\n";

        let candidates = producer.find(Path::new("src/a.ts"), content);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].snippet, "any[]");
    }

    #[test]
    fn stable_identity_for_same_input() {
        let producer = LexicalProducer::loose_type_rules().unwrap();
        let content = "const a: any = 1;\n";

        let first = producer.find(Path::new("src/a.ts"), content);
        let second = producer.find(Path::new("src/a.ts"), content);
        assert_eq!(first, second);
    }

    #[test]
    fn invalid_pattern_rejected() {
        let result = LexicalRule::new(r"(\unclosed", CandidateCategory::Unknown);
        assert!(matches!(result, Err(ProducerError::InvalidPattern { .. })));
    }

    #[test]
    fn empty_file_yields_nothing() {
        let producer = LexicalProducer::loose_type_rules().unwrap();
        assert!(producer.find(Path::new("src/a.ts"), "").is_empty());
    }
}
