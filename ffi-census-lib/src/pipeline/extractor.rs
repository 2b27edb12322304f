use super::{FailureKind, RawMetrics, StepFailure};
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;

const LOG_TARGET: &str = " extractor";

/// Wall-clock bound on a single metrics tool invocation.
pub const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Produces raw metrics for a local workspace.
pub trait Extractor: Send + Sync + 'static {
    fn extract(&self, workspace: &Path) -> impl Future<Output = Result<RawMetrics, StepFailure>> + Send;
}

/// Runs an external metrics tool as `<tool> <workspace>` and parses its JSON payload.
#[derive(Debug, Clone)]
pub struct ToolExtractor {
    tool: PathBuf,
    timeout: Duration,
}

impl ToolExtractor {
    #[must_use]
    pub fn new(tool: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            timeout: EXTRACTION_TIMEOUT,
        }
    }

    #[cfg(test)]
    const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn tool(&self) -> &Path {
        &self.tool
    }
}

impl Extractor for ToolExtractor {
    async fn extract(&self, workspace: &Path) -> Result<RawMetrics, StepFailure> {
        let start_time = Instant::now();

        let child = Command::new(&self.tool)
            .arg(workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .into_app_err_with(|| format!("could not spawn metrics tool '{}'", self.tool.display()))
            .map_err(|e| StepFailure::new(FailureKind::ExtractionFailed, e))?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result
                .into_app_err_with(|| format!("waiting for metrics tool on '{}'", workspace.display()))
                .map_err(|e| StepFailure::new(FailureKind::ExtractionFailed, e))?,
            Err(_) => {
                return Err(StepFailure::new(
                    FailureKind::ExtractionTimedOut,
                    app_err!(
                        "metrics tool timed out after {} seconds on '{}'",
                        self.timeout.as_secs_f64(),
                        workspace.display()
                    ),
                ));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StepFailure::new(
                FailureKind::ExtractionFailed,
                app_err!("metrics tool exited with {} on '{}': {}", output.status, workspace.display(), stderr.trim()),
            ));
        }

        let metrics = RawMetrics::from_payload(&output.stdout).map_err(|e| StepFailure::new(FailureKind::ExtractionMalformed, e))?;

        log::debug!(
            target: LOG_TARGET,
            "Extracted metrics for '{}' in {:.3}s",
            workspace.display(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(metrics)
    }
}
