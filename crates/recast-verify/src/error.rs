//! Error types for the Verifier Gateway
//!
//! Only transport-level failures are errors here. A failing or timed-out
//! build is a successful gateway call with `success == false`, because
//! callers treat both identically (rollback).

/// Verifier Gateway errors
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// External verifier process could not be started
    #[error("failed to spawn verifier `{program}`: {source}")]
    Spawn {
        /// Program that could not be spawned
        program: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Verifier process output could not be collected
    #[error("failed to collect verifier output: {0}")]
    Output(#[from] std::io::Error),

    /// Gateway misconfiguration
    #[error("verifier configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = VerifyError::Config("empty program".to_string());
        assert!(err.to_string().contains("configuration error"));
    }
}
