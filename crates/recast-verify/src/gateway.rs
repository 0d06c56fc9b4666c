//! Verifier Gateway trait and result types
//!
//! The single boundary between the mutation engine and the external
//! correctness oracle (a build or test run). Implementations must be safe
//! to call repeatedly and must never mutate source files.

use crate::error::VerifyError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// What the oracle should check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerifyScope {
    /// Specific files (fast, post-edit check)
    Files(Vec<PathBuf>),
    /// Whole-project build
    Project,
    /// Whole-project build plus the test suite (extended check)
    ProjectWithTests,
}

impl VerifyScope {
    /// Scope covering a single file
    #[inline]
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::Files(vec![path.into()])
    }

    /// Whether this scope includes the test suite
    #[inline]
    #[must_use]
    pub fn includes_tests(&self) -> bool {
        matches!(self, Self::ProjectWithTests)
    }
}

/// Structured outcome of one oracle invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    /// Whether the oracle accepted the current state
    pub success: bool,
    /// Number of error diagnostics reported
    pub error_count: usize,
    /// Raw diagnostic lines (for reporting, never parsed further here)
    pub diagnostics: Vec<String>,
    /// Wall-clock duration of the oracle run
    pub duration: Duration,
}

impl Verification {
    /// Successful verification
    #[inline]
    #[must_use]
    pub fn passed(duration: Duration) -> Self {
        Self {
            success: true,
            error_count: 0,
            diagnostics: Vec::new(),
            duration,
        }
    }

    /// Failed verification with diagnostics
    #[inline]
    #[must_use]
    pub fn failed(error_count: usize, diagnostics: Vec<String>, duration: Duration) -> Self {
        Self {
            success: false,
            error_count,
            diagnostics,
            duration,
        }
    }

    /// Timed-out verification
    ///
    /// Reported as a failure, not an error: callers roll back on timeout
    /// exactly as they would on a broken build.
    #[inline]
    #[must_use]
    pub fn timed_out(timeout: Duration) -> Self {
        Self {
            success: false,
            error_count: 1,
            diagnostics: vec![format!("verification timed out after {:?}", timeout)],
            duration: timeout,
        }
    }
}

/// External correctness oracle
///
/// Implement this trait to plug in a build system, compiler, linter, or a
/// scripted stand-in for tests. The engine never depends on the concrete
/// invocation mechanism.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait VerifierGateway: Send + Sync {
    /// Run the oracle over `scope`, bounded by `timeout`
    ///
    /// # Errors
    /// Only transport failures (spawn, output collection) are errors; a
    /// failing or timed-out check returns `Ok` with `success == false`.
    async fn verify(
        &self,
        scope: VerifyScope,
        timeout: Duration,
    ) -> Result<Verification, VerifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_scope_helper() {
        let scope = VerifyScope::file("src/a.ts");
        assert_eq!(scope, VerifyScope::Files(vec![PathBuf::from("src/a.ts")]));
        assert!(!scope.includes_tests());
        assert!(VerifyScope::ProjectWithTests.includes_tests());
    }

    #[test]
    fn timed_out_is_failure() {
        let v = Verification::timed_out(Duration::from_secs(30));
        assert!(!v.success);
        assert_eq!(v.error_count, 1);
        assert!(v.diagnostics[0].contains("timed out"));
    }

    #[tokio::test]
    async fn mock_gateway_verifies() {
        let mut mock = MockVerifierGateway::new();
        mock.expect_verify()
            .returning(|_, _| Ok(Verification::passed(Duration::from_millis(5))));

        let result = mock
            .verify(VerifyScope::Project, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(result.success);
    }
}
