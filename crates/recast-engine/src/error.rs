//! Error types for the RECAST engine
//!
//! Aggregates the component errors. Only the safety-protocol class is
//! fatal: it halts further mutation for the run and carries the list of
//! files whose on-disk state can no longer be guaranteed.

use recast_checkpoint::CheckpointError;
use recast_replace::SafetyProtocolError;
use recast_verify::VerifyError;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Checkpoint Store failure (snapshots are required before any edit)
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Verifier transport failure that survived retries
    #[error("verifier error: {0}")]
    Verify(#[from] VerifyError),

    /// Fatal: a rollback could not restore original content
    #[error("safety protocol: {0}")]
    SafetyProtocol(#[from] SafetyProtocolError),

    /// Build was not stable where a phase required it
    #[error("build unstable: {0}")]
    UnstableBuild(String),

    /// File I/O failure outside the checkpoint store
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Whether this error must halt all further mutation
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SafetyProtocol(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn safety_protocol_is_fatal() {
        let err = EngineError::SafetyProtocol(SafetyProtocolError::new(
            vec![PathBuf::from("src/a.ts")],
            "backup missing",
        ));
        assert!(err.is_fatal());
        assert!(!EngineError::UnstableBuild("phase gate".to_string()).is_fatal());
    }
}
