use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use crate::config::{AutopatchConfig, RemediationMode};
use crate::errors::AutopatchError;
use crate::exec::{CommandRunner, PatchExecutor, ShellRunner};
use crate::git::{ChangeComposer, CheckoutLeases};
use crate::models::{OutcomeStatus, RemediationOutcome, RolloutPlan, VulnerabilityRecord};
use crate::notify::Notifier;
use crate::report::{parse_report, SeverityFilter};
use crate::rollout::build_plan;
use crate::trust::{verify_specification, TrustStore};
use crate::usage::UsageDetector;
use super::state::{FailureKind, FindingState, FindingTracker, RunSummary};

enum Remediation {
    Applied { branch: Option<String> },
    Skipped,
}

/// Run blocking filesystem or git work off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, AutopatchError>
where
    F: FnOnce() -> Result<T, AutopatchError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AutopatchError::Internal(format!("Blocking task failed: {}", e)))?
}

/// Sequences usage detection, resolution, verification and application for
/// each finding, one outcome per finding, in input order.
pub struct Orchestrator {
    config: AutopatchConfig,
    trust: TrustStore,
    usage: UsageDetector,
    composer: ChangeComposer,
    runner: Arc<dyn CommandRunner>,
    notifier: Notifier,
    leases: Arc<CheckoutLeases>,
    run_id: String,
}

impl Orchestrator {
    pub fn new(config: AutopatchConfig) -> Self {
        let notifier = Notifier::new(config.webhook_url.clone(), config.notify_timeout());
        Self {
            trust: TrustStore::new(&config.trust_root),
            usage: UsageDetector::new(&config.project_dir),
            composer: ChangeComposer::new(&config.project_dir, &config.lib_dir),
            runner: Arc::new(ShellRunner),
            notifier,
            leases: Arc::new(CheckoutLeases::new()),
            run_id: uuid::Uuid::new_v4().to_string(),
            config,
        }
    }

    /// Replace the process runner used in execute mode.
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Share checkout leases with other orchestrators in the same process.
    pub fn with_leases(mut self, leases: Arc<CheckoutLeases>) -> Self {
        self.leases = leases;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &AutopatchConfig {
        &self.config
    }

    /// Parse a report and remediate every usable finding.
    ///
    /// Fails only for run-level conditions: an unreadable or malformed
    /// report, or one with no usable findings.
    pub async fn run_report(&self, path: &Path) -> Result<Vec<RemediationOutcome>, AutopatchError> {
        let started_at = Utc::now();
        let filter = if self.config.critical_only {
            SeverityFilter::CriticalOnly
        } else {
            SeverityFilter::All
        };

        let records = parse_report(path, filter).await?;
        if records.is_empty() {
            warn!(report = %path.display(), "No vulnerabilities found");
            return Err(AutopatchError::NoFindings);
        }

        info!(
            run_id = %self.run_id,
            window = self.config.window.as_deref().unwrap_or("-"),
            mode = %self.config.mode,
            findings = records.len(),
            "Remediation run started"
        );

        let outcomes = self.run(records).await;

        let summary = RunSummary::from_outcomes(&self.run_id, started_at, &outcomes);
        info!(
            run_id = %summary.run_id,
            total = summary.total_findings,
            applied = summary.count(OutcomeStatus::Applied),
            skipped = summary.count(OutcomeStatus::SkippedNotUsed),
            failed = summary.failures(),
            duration_ms = summary.duration_ms,
            "Remediation run finished"
        );
        Ok(outcomes)
    }

    /// Remediate findings independently; a failure never stops the rest.
    pub async fn run(&self, records: Vec<VulnerabilityRecord>) -> Vec<RemediationOutcome> {
        let workers = self.config.workers.max(1);
        stream::iter(records.iter())
            .map(|record| self.process_finding(record))
            .buffered(workers)
            .collect::<Vec<_>>()
            .await
    }

    pub async fn process_finding(&self, record: &VulnerabilityRecord) -> RemediationOutcome {
        let span = info_span!(
            "finding",
            cve = %record.identifier,
            package = %record.package,
            version = %record.fixed_version
        );

        async {
            let mut tracker = FindingTracker::new(&record.identifier);
            let mut plan = None;

            match self.remediate(record, &mut tracker, &mut plan).await {
                Ok(Remediation::Applied { branch }) => {
                    self.notifier.notify("success", &self.success_detail(record, branch.as_deref()));
                    RemediationOutcome {
                        identifier: record.identifier.clone(),
                        package: record.package.clone(),
                        status: OutcomeStatus::Applied,
                        plan,
                        branch,
                        error: None,
                    }
                }
                Ok(Remediation::Skipped) => {
                    info!(signature = %record.vulnerable_signature(), "Skipped: vulnerable artifact not present in project");
                    RemediationOutcome {
                        identifier: record.identifier.clone(),
                        package: record.package.clone(),
                        status: OutcomeStatus::SkippedNotUsed,
                        plan: None,
                        branch: None,
                        error: None,
                    }
                }
                Err(e) => {
                    let status = e.outcome_status();
                    tracker.fail(FailureKind::from(status));
                    let class = e.classify();
                    error!(
                        error_type = class.error_type,
                        status = %status,
                        current_version = %record.current_version,
                        error = %e,
                        "Remediation failed"
                    );
                    RemediationOutcome {
                        identifier: record.identifier.clone(),
                        package: record.package.clone(),
                        status,
                        plan,
                        branch: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn remediate(
        &self,
        record: &VulnerabilityRecord,
        tracker: &mut FindingTracker,
        plan: &mut Option<RolloutPlan>,
    ) -> Result<Remediation, AutopatchError> {
        if self.config.detect_usage {
            let detector = self.usage.clone();
            let package = record.package.clone();
            let used = if record.names_target_only() {
                debug!(
                    target_version = %record.fixed_version,
                    "No deployed version in report; matching any other version of the package"
                );
                let target = record.fixed_version.clone();
                blocking(move || Ok(detector.project_uses_other_version(&package, &target))).await?
            } else {
                let version = record.current_version.clone();
                blocking(move || Ok(detector.project_uses(&package, &version))).await?
            };
            if !used {
                tracker.advance(FindingState::Skipped)?;
                return Ok(Remediation::Skipped);
            }
        }

        tracker.advance(FindingState::Resolving)?;
        let trust = self.trust.clone();
        let package = record.package.clone();
        let version = record.fixed_version.clone();
        let resolved = blocking(move || trust.resolve(&package, &version)).await?;
        tracker.advance(FindingState::Resolved)?;
        *plan = Some(build_plan(&resolved.spec));

        tracker.advance(FindingState::Verifying)?;
        let spec = resolved.spec.clone();
        blocking(move || verify_specification(&spec)).await?;
        tracker.advance(FindingState::Verified)?;

        tracker.advance(FindingState::Executing)?;
        let _lease = self.leases.acquire(&self.config.project_dir).await;
        let branch = match self.config.mode {
            RemediationMode::Execute => {
                let executor = PatchExecutor::new(
                    self.runner.clone(),
                    &self.config.project_dir,
                    self.config.step_timeout(),
                );
                executor.apply(&resolved.spec, &resolved.dir).await?;
                None
            }
            RemediationMode::Commit => {
                let composer = self.composer.clone();
                let spec = resolved.spec.clone();
                let identifier = record.identifier.clone();
                let change = blocking(move || composer.compose(&spec, &identifier)).await?;
                Some(change.branch)
            }
        };
        tracker.advance(FindingState::Applied)?;
        Ok(Remediation::Applied { branch })
    }

    fn success_detail(&self, record: &VulnerabilityRecord, branch: Option<&str>) -> String {
        let mut detail = match branch {
            Some(branch) => format!("Branch {} created", branch),
            None => format!("{}-{} applied", record.package, record.fixed_version),
        };
        if let Some(window) = &self.config.window {
            detail.push_str(&format!(" (window {})", window));
        }
        detail
    }

    /// Wait for outstanding notifications before the process exits.
    pub async fn shutdown(&self) {
        self.notifier.drain().await;
    }
}
