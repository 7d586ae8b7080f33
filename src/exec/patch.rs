use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use crate::errors::AutopatchError;
use crate::models::{PackageSpecification, ShellStep};
use super::runner::CommandRunner;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Step,
    Validation,
}

/// Counts of commands run by a successful patch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchReport {
    pub steps_run: usize,
    pub validations_run: usize,
}

/// Applies a specification's steps, then its validations, against one project.
pub struct PatchExecutor {
    runner: Arc<dyn CommandRunner>,
    working_dir: PathBuf,
    timeout: Duration,
}

impl PatchExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>, working_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            runner,
            working_dir: working_dir.into(),
            timeout,
        }
    }

    /// Run every step in order, stopping at the first failure, then every
    /// validation under the same policy. Partially applied steps are not
    /// rolled back.
    pub async fn apply(
        &self,
        spec: &PackageSpecification,
        package_dir: &Path,
    ) -> Result<PatchReport, AutopatchError> {
        if spec.steps.is_empty() {
            warn!(package = %spec.package, version = %spec.version, "No remediation steps to run");
        }

        let steps_run = self.run_all(&spec.steps, package_dir, Stage::Step).await?;
        let validations_run = self.run_all(&spec.validations, package_dir, Stage::Validation).await?;

        info!(
            package = %spec.package,
            version = %spec.version,
            steps_run,
            validations_run,
            "Patch applied"
        );
        Ok(PatchReport { steps_run, validations_run })
    }

    async fn run_all(
        &self,
        steps: &[ShellStep],
        package_dir: &Path,
        stage: Stage,
    ) -> Result<usize, AutopatchError> {
        for step in steps {
            let resolved = step.resolve(package_dir, &self.working_dir);
            let failure = match self.runner.run(&resolved, self.timeout).await {
                Ok(output) if output.success() => None,
                Ok(output) => Some(output.failure_detail()),
                // Timeouts and spawn errors count as a failed command
                Err(e) => Some(e.to_string()),
            };

            if let Some(detail) = failure {
                warn!(
                    step = %resolved.name,
                    command = %resolved.command_line,
                    detail = %detail,
                    "Command failed, aborting remediation"
                );
                return Err(match stage {
                    Stage::Step => AutopatchError::StepFailed {
                        step: resolved.name,
                        command: resolved.command_line,
                        detail,
                    },
                    Stage::Validation => AutopatchError::ValidationFailed {
                        step: resolved.name,
                        command: resolved.command_line,
                        detail,
                    },
                });
            }
        }
        Ok(steps.len())
    }
}
