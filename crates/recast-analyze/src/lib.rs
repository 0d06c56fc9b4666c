//! RECAST Analysis - candidate model, classification, safety scoring
//!
//! The decision half of the rewriting pipeline:
//! - Candidate and edit data model
//! - Pluggable discovery ([`CandidateProducer`], default [`LexicalProducer`])
//! - Advisory domain analysis boundary ([`DomainAnalyzer`])
//! - Intentional-vs-replace classification with per-run caching
//! - Independent per-edit safety scoring against a policy
//!
//! Nothing in this crate mutates files; classification and scoring are
//! deterministic for a given input within one run.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod candidate;
pub mod classify;
pub mod domain;
pub mod producer;
pub mod safety;

pub use candidate::{CandidateCategory, Edit, FileRole, MutationCandidate, SourceLocation};
pub use classify::{Classification, Classifier, ClassifierConfig};
pub use domain::{AnalysisContext, DomainAnalyzer, DomainReport, NullAnalyzer};
pub use producer::{CandidateProducer, LexicalProducer, LexicalRule, ProducerError};
pub use safety::{EditContext, SafetyAssessment, SafetyPolicy, SafetyScorer};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
