//! RECAST Engine - adaptive batch coordination and campaign execution
//!
//! The orchestration half of the rewriting pipeline:
//! - Groups admitted edits into batches, one rollback unit each
//! - Verifies build stability after every batch and every phase
//! - Adapts batch size and confidence thresholds from batch history
//! - Runs the fixed six-phase campaign and assembles the final report
//!
//! # Example
//!
//! ```rust,ignore
//! use recast_engine::{CampaignConfig, CampaignExecutor, EngineConfig};
//!
//! # async fn example(producer: std::sync::Arc<dyn recast_analyze::CandidateProducer>,
//! #                  analyzer: std::sync::Arc<dyn recast_analyze::DomainAnalyzer>,
//! #                  checkpoints: std::sync::Arc<recast_checkpoint::CheckpointStore>,
//! #                  verifier: std::sync::Arc<dyn recast_verify::VerifierGateway>,
//! #                  files: Vec<std::path::PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
//! let mut campaign = CampaignExecutor::new(
//!     CampaignConfig::new(),
//!     EngineConfig::new(),
//!     producer,
//!     analyzer,
//!     checkpoints,
//!     verifier,
//! );
//! let report = campaign.run(&files).await?;
//! println!("reduction: {:.1}%", report.achieved_reduction_pct);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod adaptive;
pub mod batch;
pub mod campaign;
pub mod config;
pub mod error;
pub mod report;

pub use adaptive::{adapt_strategy, monitor_progress, set_realistic_targets, ProgressSignal, TargetPlan};
pub use batch::{BatchCoordinator, BatchHistory, BatchResult, ScoredEdit};
pub use campaign::CampaignExecutor;
pub use config::{AdaptiveBounds, AdaptiveConfig, CampaignConfig, EngineConfig, SafetyLevel};
pub use error::EngineError;
pub use report::{CampaignPhaseResult, FinalReport};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running rewrite campaigns
    pub use crate::{
        AdaptiveConfig, BatchCoordinator, BatchResult, CampaignConfig, CampaignExecutor,
        EngineConfig, EngineError, FinalReport, ScoredEdit,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
