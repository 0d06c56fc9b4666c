//! Testing utilities for the RECAST workspace
//!
//! Shared fixtures: temp source trees, a scripted verifier gateway, and
//! candidate/edit factories.

#![allow(missing_docs)]

use parking_lot::Mutex;
use recast_analyze::{Edit, MutationCandidate, SourceLocation};
use recast_verify::{Verification, VerifierGateway, VerifyError, VerifyScope};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Verifier gateway that replays a programmed sequence of outcomes
///
/// Once the script is exhausted, every further call returns the fallback
/// verification. All received scopes are recorded for assertions.
pub struct ScriptedVerifier {
    script: Mutex<VecDeque<Result<Verification, VerifyError>>>,
    fallback: Verification,
    seen: Mutex<Vec<VerifyScope>>,
}

impl ScriptedVerifier {
    pub fn from_script(script: Vec<Result<Verification, VerifyError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Verification::passed(Duration::from_millis(1)),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn always_passing() -> Self {
        Self::from_script(Vec::new())
    }

    pub fn always_failing() -> Self {
        let mut verifier = Self::from_script(Vec::new());
        verifier.fallback =
            Verification::failed(1, vec!["error: scripted failure".to_string()], Duration::from_millis(1));
        verifier
    }

    /// Script entry: a passing verification
    pub fn pass() -> Result<Verification, VerifyError> {
        Ok(Verification::passed(Duration::from_millis(1)))
    }

    /// Script entry: a failing verification with `error_count` errors
    pub fn fail(error_count: usize) -> Result<Verification, VerifyError> {
        Ok(Verification::failed(
            error_count,
            vec!["error: scripted failure".to_string()],
            Duration::from_millis(1),
        ))
    }

    /// Script entry: a transport-level error (retryable by callers)
    pub fn transport_error(message: &str) -> Result<Verification, VerifyError> {
        Err(VerifyError::Output(std::io::Error::other(message.to_string())))
    }

    /// Number of verify calls received so far
    pub fn calls(&self) -> usize {
        self.seen.lock().len()
    }

    /// Scopes received so far, in order
    pub fn scopes(&self) -> Vec<VerifyScope> {
        self.seen.lock().clone()
    }
}

#[async_trait::async_trait]
impl VerifierGateway for ScriptedVerifier {
    async fn verify(
        &self,
        scope: VerifyScope,
        _timeout: Duration,
    ) -> Result<Verification, VerifyError> {
        self.seen.lock().push(scope);
        match self.script.lock().pop_front() {
            Some(outcome) => outcome,
            None => Ok(self.fallback.clone()),
        }
    }
}

/// Temp directory posing as a target project
pub struct TempProject {
    dir: TempDir,
}

impl TempProject {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp project"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub async fn write_file(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.expect("create parent dirs");
        }
        tokio::fs::write(&path, content).await.expect("write fixture file");
        path
    }

    pub async fn read_file(&self, rel: &str) -> String {
        tokio::fs::read_to_string(self.dir.path().join(rel))
            .await
            .expect("read fixture file")
    }
}

impl Default for TempProject {
    fn default() -> Self {
        Self::new()
    }
}

pub fn create_candidate(file: &Path, line: u32, column: u32, snippet: &str) -> MutationCandidate {
    MutationCandidate::new(file, SourceLocation::new(line, column), snippet)
}

pub fn create_edit(
    file: &Path,
    line: u32,
    column: u32,
    original: &str,
    replacement: &str,
    confidence: f64,
) -> Edit {
    Edit::new(file, SourceLocation::new(line, column), original, replacement)
        .with_confidence(confidence)
}
