//! Command-backed verifier
//!
//! Wraps an external build/test command behind [`VerifierGateway`]. The
//! process is spawned with kill-on-drop so an expired timeout also
//! terminates the child.

use crate::error::VerifyError;
use crate::gateway::{Verification, VerifierGateway, VerifyScope};
use regex::Regex;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

/// Configuration for [`CommandVerifier`]
#[derive(Debug, Clone)]
pub struct CommandVerifierConfig {
    /// Program to run (e.g. a compiler or build driver)
    pub program: String,
    /// Arguments for a build-only check
    pub build_args: Vec<String>,
    /// Arguments for the extended build-plus-tests check
    pub test_args: Vec<String>,
    /// Working directory of the target project
    pub working_dir: PathBuf,
    /// Pattern that marks a diagnostic line as an error
    pub error_pattern: String,
}

impl CommandVerifierConfig {
    /// Create config for a program run in `working_dir`
    #[inline]
    #[must_use]
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            build_args: Vec::new(),
            test_args: Vec::new(),
            working_dir: working_dir.into(),
            error_pattern: r"(?i)\berror\b".to_string(),
        }
    }

    /// With build arguments
    #[inline]
    #[must_use]
    pub fn with_build_args(mut self, args: Vec<String>) -> Self {
        self.build_args = args;
        self
    }

    /// With extended-check arguments
    #[inline]
    #[must_use]
    pub fn with_test_args(mut self, args: Vec<String>) -> Self {
        self.test_args = args;
        self
    }

    /// With a custom error-line pattern
    #[inline]
    #[must_use]
    pub fn with_error_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.error_pattern = pattern.into();
        self
    }
}

/// Production [`VerifierGateway`] backed by an external process
pub struct CommandVerifier {
    config: CommandVerifierConfig,
    error_line: Regex,
}

impl CommandVerifier {
    /// Create verifier from config
    ///
    /// # Errors
    /// Returns `VerifyError::Config` if the program is empty or the error
    /// pattern is not a valid regex
    pub fn new(config: CommandVerifierConfig) -> Result<Self, VerifyError> {
        if config.program.is_empty() {
            return Err(VerifyError::Config("verifier program is empty".to_string()));
        }
        let error_line = Regex::new(&config.error_pattern)
            .map_err(|e| VerifyError::Config(format!("bad error pattern: {e}")))?;
        Ok(Self { config, error_line })
    }

    /// Arguments for the given scope
    ///
    /// File scopes run the plain build: the oracle decides what a scoped
    /// check means; extra file paths are appended as arguments.
    fn args_for(&self, scope: &VerifyScope) -> Vec<String> {
        match scope {
            VerifyScope::Files(files) => {
                let mut args = self.config.build_args.clone();
                args.extend(files.iter().map(|f| f.display().to_string()));
                args
            }
            VerifyScope::Project => self.config.build_args.clone(),
            VerifyScope::ProjectWithTests => self.config.test_args.clone(),
        }
    }

    fn parse_output(&self, stdout: &str, stderr: &str, ok: bool, duration: Duration) -> Verification {
        let diagnostics: Vec<String> = stdout
            .lines()
            .chain(stderr.lines())
            .filter(|line| self.error_line.is_match(line))
            .map(str::to_string)
            .collect();
        let error_count = diagnostics.len();

        if ok && error_count == 0 {
            Verification::passed(duration)
        } else {
            // A non-zero exit with no matching lines still counts as one error
            Verification::failed(error_count.max(usize::from(!ok)), diagnostics, duration)
        }
    }
}

#[async_trait::async_trait]
impl VerifierGateway for CommandVerifier {
    async fn verify(
        &self,
        scope: VerifyScope,
        timeout: Duration,
    ) -> Result<Verification, VerifyError> {
        let args = self.args_for(&scope);
        let start = Instant::now();

        tracing::debug!(
            program = %self.config.program,
            ?scope,
            "invoking external verifier"
        );

        let child = tokio::process::Command::new(&self.config.program)
            .args(&args)
            .current_dir(&self.config.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| VerifyError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let duration = start.elapsed();
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                let verification =
                    self.parse_output(&stdout, &stderr, output.status.success(), duration);
                let elapsed_ms = duration.as_millis() as u64;
                tracing::info!(
                    success = verification.success,
                    errors = verification.error_count,
                    elapsed_ms,
                    "verification finished"
                );
                Ok(verification)
            }
            Ok(Err(e)) => Err(VerifyError::Output(e)),
            // Dropping the output future kills the child (kill_on_drop)
            Err(_) => {
                tracing::warn!(?timeout, "verification timed out");
                Ok(Verification::timed_out(timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier(program: &str, dir: &std::path::Path) -> CommandVerifier {
        CommandVerifier::new(CommandVerifierConfig::new(program, dir)).unwrap()
    }

    #[test]
    fn empty_program_rejected() {
        let result = CommandVerifier::new(CommandVerifierConfig::new("", "."));
        assert!(matches!(result, Err(VerifyError::Config(_))));
    }

    #[test]
    fn parse_output_counts_error_lines() {
        let dir = tempfile::tempdir().unwrap();
        let v = verifier("true", dir.path());
        let out = v.parse_output(
            "src/a.ts(3,5): error TS2322: type mismatch\nnote: see above",
            "error: build failed",
            false,
            Duration::from_millis(10),
        );
        assert!(!out.success);
        assert_eq!(out.error_count, 2);
    }

    #[test]
    fn nonzero_exit_without_diagnostics_is_one_error() {
        let dir = tempfile::tempdir().unwrap();
        let v = verifier("false", dir.path());
        let out = v.parse_output("", "", false, Duration::from_millis(1));
        assert!(!out.success);
        assert_eq!(out.error_count, 1);
    }

    #[tokio::test]
    async fn successful_command_passes() {
        let dir = tempfile::tempdir().unwrap();
        let v = verifier("true", dir.path());
        let result = v
            .verify(VerifyScope::Project, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.error_count, 0);
    }

    #[tokio::test]
    async fn failing_command_fails() {
        let dir = tempfile::tempdir().unwrap();
        let v = verifier("false", dir.path());
        let result = v
            .verify(VerifyScope::Project, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn timeout_reports_failure_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = CommandVerifierConfig::new("sleep", dir.path())
            .with_build_args(vec!["5".to_string()]);
        let v = CommandVerifier::new(config).unwrap();

        let result = v
            .verify(VerifyScope::Project, Duration::from_millis(50))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.diagnostics[0].contains("timed out"));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let v = verifier("recast-no-such-binary", dir.path());
        let result = v.verify(VerifyScope::Project, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(VerifyError::Spawn { .. })));
    }
}
