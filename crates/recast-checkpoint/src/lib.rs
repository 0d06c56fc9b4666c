//! RECAST Checkpoint Store
//!
//! Pre-edit file snapshots with verified, idempotent restore:
//! - Snapshot one or more files into a dedicated backup directory
//! - Verify backup integrity (hash) before trusting it for rollback
//! - Restore byte-exact contents on verification failure
//! - Discard backups on commit; retention cleanup for the rest
//!
//! # Example
//!
//! ```rust,ignore
//! use recast_checkpoint::{CheckpointConfig, CheckpointStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = CheckpointStore::new(CheckpointConfig::new(".recast-backups")).await?;
//! let token = store.snapshot(&[std::path::PathBuf::from("src/a.ts")]).await?;
//! // ... edit src/a.ts, verify the build ...
//! store.restore(&token).await?; // or store.discard(token).await on success
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod hash;
pub mod store;

pub use error::CheckpointError;
pub use hash::ContentHash;
pub use store::{CheckpointConfig, CheckpointId, CheckpointStore, CheckpointToken};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
