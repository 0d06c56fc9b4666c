//! Domain analyzer boundary
//!
//! Advisory capability consumed by the classifier and scorer. The engine
//! must function (with degraded accuracy) when an analyzer returns the
//! default report.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Context handed to a domain analyzer for one candidate
#[derive(Debug, Clone, Copy)]
pub struct AnalysisContext<'a> {
    /// File containing the candidate
    pub file_path: &'a Path,
    /// The matched text
    pub snippet: &'a str,
    /// Nearby lines
    pub surrounding: &'a str,
    /// Hints attached at discovery time
    pub hints: &'a [String],
}

/// Advisory output of a domain analyzer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainReport {
    /// Detected domain (e.g. "http-api", "persistence"), if any
    pub domain: Option<String>,
    /// Concrete type suggestions for the site
    pub suggested_types: Vec<String>,
    /// Reasons the site should be preserved as-is
    pub preservation_reasons: Vec<String>,
    /// Free-form advisory hints
    pub hints: Vec<String>,
}

impl DomainReport {
    /// Empty report (no signal)
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the report carries any signal at all
    #[inline]
    #[must_use]
    pub fn has_signal(&self) -> bool {
        self.domain.is_some()
            || !self.suggested_types.is_empty()
            || !self.preservation_reasons.is_empty()
    }
}

/// Pluggable domain analysis capability
///
/// Output is advisory only: the classifier weights it, never obeys it
/// blindly.
pub trait DomainAnalyzer: Send + Sync {
    /// Analyze a candidate's context
    fn analyze(&self, context: &AnalysisContext<'_>) -> DomainReport;

    /// Analyzer name (for debugging/reporting)
    fn name(&self) -> &'static str;
}

/// Analyzer that reports no signal
///
/// Default wiring when no domain analyzer is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAnalyzer;

impl DomainAnalyzer for NullAnalyzer {
    fn analyze(&self, _context: &AnalysisContext<'_>) -> DomainReport {
        DomainReport::empty()
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_analyzer_has_no_signal() {
        let analyzer = NullAnalyzer;
        let context = AnalysisContext {
            file_path: Path::new("src/a.ts"),
            snippet: ": any",
            surrounding: "",
            hints: &[],
        };
        let report = analyzer.analyze(&context);
        assert!(!report.has_signal());
        assert_eq!(analyzer.name(), "null");
    }

    #[test]
    fn report_signal_detection() {
        let mut report = DomainReport::empty();
        assert!(!report.has_signal());
        report.suggested_types.push("ApiResponse".to_string());
        assert!(report.has_signal());
    }
}
