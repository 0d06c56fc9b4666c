//! RECAST Atomic Replacer
//!
//! Applies edits to one file as a single all-or-nothing unit:
//! - Snapshot before touching the file (fail closed without a backup)
//! - Abort untouched on stale candidates (content mismatch)
//! - Verify through the gateway; commit or restore byte-exact
//! - Bounded retry for transient failures
//! - Fatal [`SafetyProtocolError`] when a rollback itself fails
//!
//! # Example
//!
//! ```rust,ignore
//! use recast_replace::{AtomicReplacer, ReplacerConfig};
//!
//! # async fn example(store: std::sync::Arc<recast_checkpoint::CheckpointStore>,
//! #                  verifier: std::sync::Arc<dyn recast_verify::VerifierGateway>,
//! #                  edits: Vec<recast_analyze::Edit>) {
//! let replacer = AtomicReplacer::new(ReplacerConfig::default(), store, verifier);
//! let outcome = replacer.apply_to_file(&edits).await;
//! # let _ = outcome;
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod replacer;

pub use error::SafetyProtocolError;
pub use replacer::{AtomicReplacer, EditPhase, ReplaceOutcome, ReplacerConfig};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
