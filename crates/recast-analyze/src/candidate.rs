//! Candidate and edit model
//!
//! Defines the fundamental types of the rewriting pipeline:
//! - Source locations and file roles
//! - Mutation candidates (discovered rewrite opportunities)
//! - Edits (the unit the atomic replacer operates on)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Position of a candidate within a file (1-based line and column)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SourceLocation {
    /// 1-based line number
    pub line: u32,
    /// 1-based column number
    pub column: u32,
}

impl SourceLocation {
    /// Create new location
    #[inline]
    #[must_use]
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Role a file plays in the target project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileRole {
    /// Production source
    Source,
    /// Test code (lower-risk edit target, lower-value reduction)
    Test,
    /// Configuration file
    Config,
}

impl FileRole {
    /// Classify a path by its components and extension
    #[must_use]
    pub fn of_path(path: &Path) -> Self {
        let lower = path.display().to_string().to_lowercase();
        if lower.contains("/test")
            || lower.contains("/tests/")
            || lower.contains("__tests__")
            || lower.contains(".test.")
            || lower.contains(".spec.")
            || lower.starts_with("test")
        {
            return Self::Test;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some("json" | "yaml" | "yml" | "toml" | "ini") => Self::Config,
            _ => Self::Source,
        }
    }

    /// Whether this is a test file
    #[inline]
    #[must_use]
    pub fn is_test(&self) -> bool {
        matches!(self, Self::Test)
    }
}

/// Category of a discovered rewrite site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateCategory {
    /// Inside error handling (catch/except blocks, error values)
    ErrorHandling,
    /// At an external boundary (API responses, deserialized payloads)
    ExternalBoundary,
    /// Element type of a collection
    CollectionElement,
    /// Function parameter annotation (behavior-sensitive)
    FunctionParameter,
    /// Plain variable/member type annotation
    TypeAnnotation,
    /// Fixture or helper inside test code
    TestFixture,
    /// Could not be categorized
    Unknown,
}

impl CandidateCategory {
    /// Whether sites in this category are preserved by default
    ///
    /// Error-handling and external-boundary sites usually carry an
    /// intentional loose type.
    #[inline]
    #[must_use]
    pub fn prefers_preservation(&self) -> bool {
        matches!(self, Self::ErrorHandling | Self::ExternalBoundary)
    }

    /// Whether an edit in this category is structurally simple
    #[inline]
    #[must_use]
    pub fn is_structurally_simple(&self) -> bool {
        matches!(self, Self::CollectionElement | Self::TypeAnnotation | Self::TestFixture)
    }
}

/// A discovered, located opportunity to rewrite a piece of source text
///
/// Immutable once discovered; `(file_path, location)` is a stable identity
/// for the duration of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationCandidate {
    /// File containing the site
    pub file_path: PathBuf,
    /// Position of the site
    pub location: SourceLocation,
    /// The matched text itself
    pub snippet: String,
    /// Nearby lines, used for classification signals
    pub surrounding_context: String,
    /// Advisory hints from the producer or domain analyzer
    pub domain_hints: Vec<String>,
}

impl MutationCandidate {
    /// Create new candidate
    #[inline]
    #[must_use]
    pub fn new(
        file_path: impl Into<PathBuf>,
        location: SourceLocation,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            location,
            snippet: snippet.into(),
            surrounding_context: String::new(),
            domain_hints: Vec::new(),
        }
    }

    /// With surrounding context
    #[inline]
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.surrounding_context = context.into();
        self
    }

    /// With a domain hint
    #[inline]
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.domain_hints.push(hint.into());
        self
    }

    /// Stable identity for caching within a run
    #[inline]
    #[must_use]
    pub fn key(&self) -> (PathBuf, SourceLocation) {
        (self.file_path.clone(), self.location)
    }

    /// Role of the containing file
    #[inline]
    #[must_use]
    pub fn file_role(&self) -> FileRole {
        FileRole::of_path(&self.file_path)
    }
}

/// A concrete text replacement, the unit the atomic replacer operates on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edit {
    /// File to edit
    pub file_path: PathBuf,
    /// Where the original text must be found
    pub location: SourceLocation,
    /// Text expected at the location (mismatch aborts the edit)
    pub original_text: String,
    /// Replacement text
    pub replacement_text: String,
    /// Classification confidence carried along for safety scoring
    pub confidence: f64,
}

impl Edit {
    /// Create new edit
    #[inline]
    #[must_use]
    pub fn new(
        file_path: impl Into<PathBuf>,
        location: SourceLocation,
        original_text: impl Into<String>,
        replacement_text: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            location,
            original_text: original_text.into(),
            replacement_text: replacement_text.into(),
            confidence: 0.5,
        }
    }

    /// With confidence
    #[inline]
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}
