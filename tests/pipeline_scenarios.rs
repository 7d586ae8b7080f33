use async_trait::async_trait;
use autopatch::config::{AutopatchConfig, RemediationMode};
use autopatch::errors::AutopatchError;
use autopatch::exec::{CommandOutput, CommandRunner};
use autopatch::models::{OutcomeStatus, ResolvedStep};
use autopatch::pipeline::Orchestrator;
use git2::{BranchType, Repository, Signature};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const JAR_BYTES: &[u8] = b"log4j 2.17.0 fixed build";

/// Records every step it is asked to run and reports success.
#[derive(Default)]
struct RecordingRunner {
    calls: Mutex<Vec<String>>,
}

impl RecordingRunner {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, step: &ResolvedStep, _timeout: Duration) -> Result<CommandOutput, AutopatchError> {
        self.calls.lock().unwrap().push(step.command_line.clone());
        Ok(CommandOutput {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

struct Fixture {
    _dir: TempDir,
    project: PathBuf,
    trust_root: PathBuf,
    report: PathBuf,
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn commit_all(repo: &Repository, message: &str) {
    let mut index = repo.index().unwrap();
    index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None).unwrap();
    index.write().unwrap();
    let tree_oid = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_oid).unwrap();
    let sig = Signature::now("test", "test@localhost").unwrap();
    let parents = match repo.head() {
        Ok(head) => vec![head.peel_to_commit().unwrap()],
        Err(_) => vec![],
    };
    let parent_refs: Vec<_> = parents.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs).unwrap();
}

fn write_package(trust_root: &Path, checksum: &str, validate: &str) {
    let pkg = trust_root.join("log4j-2.17.0");
    fs::create_dir_all(&pkg).unwrap();
    fs::write(pkg.join("log4j-2.17.0.jar"), JAR_BYTES).unwrap();
    let spec = format!(
        r#"checksum: "{checksum}"
steps:
  - name: remove vulnerable jar
    shell: rm -f libs/log4j-*.jar
  - name: install fixed jar
    shell: cp {{{{ playbook_dir }}}}/log4j-2.17.0.jar libs/
validate:
  - name: fixed jar present
    shell: {validate}
"#
    );
    fs::write(pkg.join("AGENT.yaml"), spec).unwrap();
}

fn write_report(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
}

const LOG4J_REPORT: &str = r#"[{
    "package": "log4j",
    "current_version": "2.14.1",
    "fixed_version": "2.17.0",
    "severity": "critical",
    "hosts": ["web-1"],
    "cve": "CVE-2021-44228"
}]"#;

/// Project repo with `libs/log4j-2.14.1.jar` committed, and a trust store
/// holding log4j 2.17.0 with the given checksum.
fn fixture(checksum: Option<String>) -> Fixture {
    let dir = TempDir::new().unwrap();
    let project = dir.path().join("vulnerable-app");
    fs::create_dir_all(project.join("libs")).unwrap();
    fs::write(project.join("libs/log4j-2.14.1.jar"), b"log4j 2.14.1").unwrap();
    fs::write(project.join("README.md"), b"app\n").unwrap();
    let repo = Repository::init(&project).unwrap();
    commit_all(&repo, "initial");

    let trust_root = dir.path().join("approved-packages");
    let checksum = checksum.unwrap_or_else(|| format!("sha256:{}", sha256_hex(JAR_BYTES)));
    write_package(&trust_root, &checksum, "test -f libs/log4j-2.17.0.jar");

    let report = dir.path().join("report.json");
    write_report(&report, LOG4J_REPORT);

    Fixture { _dir: dir, project, trust_root, report }
}

fn config(fx: &Fixture, mode: RemediationMode) -> AutopatchConfig {
    AutopatchConfig {
        trust_root: fx.trust_root.clone(),
        project_dir: fx.project.clone(),
        mode,
        window: Some("mw-test".into()),
        ..AutopatchConfig::default()
    }
}

#[tokio::test]
async fn test_vulnerable_project_gets_remediation_branch() {
    let fx = fixture(None);
    let orchestrator = Orchestrator::new(config(&fx, RemediationMode::Commit));

    let outcomes = orchestrator.run_report(&fx.report).await.unwrap();
    orchestrator.shutdown().await;

    assert_eq!(outcomes.len(), 1);
    let outcome = &outcomes[0];
    assert_eq!(outcome.status, OutcomeStatus::Applied);
    assert_eq!(outcome.identifier, "CVE-2021-44228");
    assert_eq!(outcome.branch.as_deref(), Some("autopatch-cve-2021-44228"));

    let plan = outcome.plan.as_ref().expect("plan for applied finding");
    assert_eq!(plan.canary.host_fraction.as_percent(), 10);
    assert_eq!(plan.batch.host_fraction.as_percent(), 30);
    assert_eq!(plan.canary.tasks.len(), 2);

    let repo = Repository::open(&fx.project).unwrap();
    let branch = repo.find_branch("autopatch-cve-2021-44228", BranchType::Local).unwrap();
    let commit = branch.get().peel_to_commit().unwrap();
    assert_eq!(commit.message(), Some("AUTO-PATCH: CVE-2021-44228"));

    let tree = commit.tree().unwrap();
    assert!(tree.get_path(Path::new("libs/log4j-2.17.0.jar")).is_ok());
    assert!(tree.get_path(Path::new("libs/log4j-2.14.1.jar")).is_err());
    assert!(tree.get_path(Path::new("README.md")).is_ok());

    // checkout is back on the original branch with the vulnerable jar
    assert!(repo.head().unwrap().is_branch());
    assert_ne!(repo.head().unwrap().shorthand(), Some("autopatch-cve-2021-44228"));
    assert!(fx.project.join("libs/log4j-2.14.1.jar").exists());
    assert!(!fx.project.join("libs/log4j-2.17.0.jar").exists());

    let json = serde_json::to_value(outcome).unwrap();
    assert_eq!(json["status"], "applied");
    assert_eq!(json["cve"], "CVE-2021-44228");
}

#[tokio::test]
async fn test_unused_package_is_skipped() {
    let fx = fixture(None);
    fs::remove_file(fx.project.join("libs/log4j-2.14.1.jar")).unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let orchestrator = Orchestrator::new(config(&fx, RemediationMode::Execute))
        .with_runner(runner.clone());

    let outcomes = orchestrator.run_report(&fx.report).await.unwrap();

    assert_eq!(outcomes[0].status, OutcomeStatus::SkippedNotUsed);
    assert!(outcomes[0].plan.is_none());
    assert!(outcomes[0].branch.is_none());
    assert!(runner.calls().is_empty());

    let repo = Repository::open(&fx.project).unwrap();
    assert!(repo.find_branch("autopatch-cve-2021-44228", BranchType::Local).is_err());
}

#[tokio::test]
async fn test_checksum_mismatch_runs_nothing() {
    let fx = fixture(Some(format!("sha256:{}", "0".repeat(64))));
    let runner = Arc::new(RecordingRunner::default());
    let orchestrator = Orchestrator::new(config(&fx, RemediationMode::Execute))
        .with_runner(runner.clone());

    let outcomes = orchestrator.run_report(&fx.report).await.unwrap();

    assert_eq!(outcomes[0].status, OutcomeStatus::FailedIntegrity);
    assert!(outcomes[0].error.is_some());
    assert!(runner.calls().is_empty());
    assert!(fx.project.join("libs/log4j-2.14.1.jar").exists());
}

#[tokio::test]
async fn test_checksum_mismatch_creates_no_branch() {
    let fx = fixture(Some(format!("sha256:{}", "0".repeat(64))));
    let orchestrator = Orchestrator::new(config(&fx, RemediationMode::Commit));

    let outcomes = orchestrator.run_report(&fx.report).await.unwrap();

    assert_eq!(outcomes[0].status, OutcomeStatus::FailedIntegrity);
    let repo = Repository::open(&fx.project).unwrap();
    assert!(repo.find_branch("autopatch-cve-2021-44228", BranchType::Local).is_err());
}

#[tokio::test]
async fn test_empty_report_is_no_findings() {
    let fx = fixture(None);
    write_report(&fx.report, "[]");
    let orchestrator = Orchestrator::new(config(&fx, RemediationMode::Commit));

    let err = orchestrator.run_report(&fx.report).await.unwrap_err();
    assert!(matches!(err, AutopatchError::NoFindings));
    assert_eq!(err.exit_code(), 2);
    assert_eq!(err.to_string(), "No vulnerabilities found");
}

#[tokio::test]
async fn test_critical_only_filters_everything() {
    let fx = fixture(None);
    write_report(
        &fx.report,
        r#"[{"package": "log4j", "current_version": "2.14.1", "fixed_version": "2.17.0",
             "severity": "high", "hosts": [], "cve": "CVE-2021-44228"}]"#,
    );
    let mut cfg = config(&fx, RemediationMode::Commit);
    cfg.critical_only = true;
    let orchestrator = Orchestrator::new(cfg);

    let err = orchestrator.run_report(&fx.report).await.unwrap_err();
    assert!(matches!(err, AutopatchError::NoFindings));
}

#[tokio::test]
async fn test_malformed_report_is_run_fatal() {
    let fx = fixture(None);
    write_report(&fx.report, "{not json");
    let orchestrator = Orchestrator::new(config(&fx, RemediationMode::Commit));

    let err = orchestrator.run_report(&fx.report).await.unwrap_err();
    assert!(matches!(err, AutopatchError::MalformedReport(_)));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_second_run_reports_existing_branch() {
    let fx = fixture(None);
    let orchestrator = Orchestrator::new(config(&fx, RemediationMode::Commit));

    let first = orchestrator.run_report(&fx.report).await.unwrap();
    assert_eq!(first[0].status, OutcomeStatus::Applied);

    let second = orchestrator.run_report(&fx.report).await.unwrap();
    assert_eq!(second[0].status, OutcomeStatus::FailedVersionControl);
    assert!(second[0].error.as_deref().unwrap().contains("already exists"));
}

#[tokio::test]
async fn test_failures_do_not_stop_other_findings() {
    let fx = fixture(None);
    write_report(
        &fx.report,
        r#"{"vulnerabilities": [
            {"package": "struts", "current_version": "2.5.1", "fixed_version": "2.5.33",
             "severity": "critical", "hosts": [], "cve": "CVE-2017-5638"},
            {"package": "log4j", "current_version": "2.14.1", "fixed_version": "2.17.0",
             "severity": "critical", "hosts": ["web-1"], "cve": "CVE-2021-44228"}
        ]}"#,
    );
    fs::write(fx.project.join("libs/struts-2.5.1.jar"), b"struts").unwrap();
    commit_all(&Repository::open(&fx.project).unwrap(), "add struts");

    let orchestrator = Orchestrator::new(config(&fx, RemediationMode::Commit));
    let outcomes = orchestrator.run_report(&fx.report).await.unwrap();

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].identifier, "CVE-2017-5638");
    assert_eq!(outcomes[0].status, OutcomeStatus::FailedResolve);
    assert!(outcomes[0].plan.is_none());
    assert_eq!(outcomes[1].identifier, "CVE-2021-44228");
    assert_eq!(outcomes[1].status, OutcomeStatus::Applied);
}

#[tokio::test]
async fn test_execute_mode_runs_steps_in_project() {
    let fx = fixture(None);
    let orchestrator = Orchestrator::new(config(&fx, RemediationMode::Execute));

    let outcomes = orchestrator.run_report(&fx.report).await.unwrap();

    assert_eq!(outcomes[0].status, OutcomeStatus::Applied);
    assert!(outcomes[0].branch.is_none());
    assert!(fx.project.join("libs/log4j-2.17.0.jar").exists());
    assert!(!fx.project.join("libs/log4j-2.14.1.jar").exists());
    assert_eq!(fs::read(fx.project.join("libs/log4j-2.17.0.jar")).unwrap(), JAR_BYTES);
}

#[tokio::test]
async fn test_execute_mode_failed_validation() {
    let fx = fixture(None);
    write_package(&fx.trust_root, &format!("sha256:{}", sha256_hex(JAR_BYTES)), "test -f libs/missing.jar");
    let orchestrator = Orchestrator::new(config(&fx, RemediationMode::Execute));

    let outcomes = orchestrator.run_report(&fx.report).await.unwrap();

    assert_eq!(outcomes[0].status, OutcomeStatus::FailedExecution);
    assert!(outcomes[0].plan.is_some());
    assert!(outcomes[0].error.as_deref().unwrap().contains("fixed jar present"));
}

#[tokio::test]
async fn test_playbook_dir_is_substituted_before_running() {
    let fx = fixture(None);
    let runner = Arc::new(RecordingRunner::default());
    let orchestrator = Orchestrator::new(config(&fx, RemediationMode::Execute))
        .with_runner(runner.clone());

    let outcomes = orchestrator.run_report(&fx.report).await.unwrap();
    assert_eq!(outcomes[0].status, OutcomeStatus::Applied);

    let calls = runner.calls();
    assert_eq!(calls.len(), 3);
    let package_dir = fx.trust_root.join("log4j-2.17.0").canonicalize().unwrap();
    assert_eq!(calls[1], format!("cp {}/log4j-2.17.0.jar libs/", package_dir.display()));
    assert!(calls.iter().all(|c| !c.contains("playbook_dir")));
}

#[tokio::test]
async fn test_tenable_shape_with_default_config() {
    let fx = fixture(None);
    write_report(
        &fx.report,
        r#"{"vulnerabilities": [{"pkg": "log4j", "version": "2.17.0", "hosts": ["web-1"], "cve": "CVE-2021-44228"}]}"#,
    );
    let orchestrator = Orchestrator::new(config(&fx, RemediationMode::Commit));

    let outcomes = orchestrator.run_report(&fx.report).await.unwrap();
    assert_eq!(outcomes[0].status, OutcomeStatus::Applied);
    assert_eq!(outcomes[0].package, "log4j");
    assert_eq!(outcomes[0].branch.as_deref(), Some("autopatch-cve-2021-44228"));
}

#[tokio::test]
async fn test_tenable_shape_skipped_when_already_on_target() {
    let fx = fixture(None);
    let repo = Repository::open(&fx.project).unwrap();
    fs::remove_file(fx.project.join("libs/log4j-2.14.1.jar")).unwrap();
    fs::write(fx.project.join("libs/log4j-2.17.0.jar"), JAR_BYTES).unwrap();
    let mut index = repo.index().unwrap();
    index.remove_path(Path::new("libs/log4j-2.14.1.jar")).unwrap();
    index.write().unwrap();
    commit_all(&repo, "upgrade log4j");
    write_report(
        &fx.report,
        r#"{"vulnerabilities": [{"pkg": "log4j", "version": "2.17.0", "hosts": [], "cve": "CVE-2021-44228"}]}"#,
    );
    let orchestrator = Orchestrator::new(config(&fx, RemediationMode::Commit));

    let outcomes = orchestrator.run_report(&fx.report).await.unwrap();
    assert_eq!(outcomes[0].status, OutcomeStatus::SkippedNotUsed);
}

#[tokio::test]
async fn test_parallel_findings_share_checkout() {
    let fx = fixture(None);
    let struts_jar: &[u8] = b"struts 2.5.33 fixed build";
    let pkg = fx.trust_root.join("struts-2.5.33");
    fs::create_dir_all(&pkg).unwrap();
    fs::write(pkg.join("struts-2.5.33.jar"), struts_jar).unwrap();
    fs::write(
        pkg.join("AGENT.yaml"),
        format!("checksum: \"sha256:{}\"\nsteps: []\n", sha256_hex(struts_jar)),
    )
    .unwrap();
    fs::write(fx.project.join("libs/struts-2.5.1.jar"), b"struts").unwrap();
    let repo = Repository::open(&fx.project).unwrap();
    commit_all(&repo, "add struts");
    let original_head = repo.head().unwrap().name().unwrap().to_string();

    write_report(
        &fx.report,
        r#"[
            {"package": "log4j", "current_version": "2.14.1", "fixed_version": "2.17.0",
             "severity": "critical", "hosts": [], "cve": "CVE-2021-44228"},
            {"package": "struts", "current_version": "2.5.1", "fixed_version": "2.5.33",
             "severity": "critical", "hosts": [], "cve": "CVE-2017-5638"}
        ]"#,
    );
    let mut cfg = config(&fx, RemediationMode::Commit);
    cfg.workers = 2;
    let orchestrator = Orchestrator::new(cfg);

    let outcomes = orchestrator.run_report(&fx.report).await.unwrap();

    assert_eq!(outcomes[0].identifier, "CVE-2021-44228");
    assert_eq!(outcomes[1].identifier, "CVE-2017-5638");
    assert!(outcomes.iter().all(|o| o.status == OutcomeStatus::Applied));

    let repo = Repository::open(&fx.project).unwrap();
    let log4j = repo.find_branch("autopatch-cve-2021-44228", BranchType::Local).unwrap();
    let struts = repo.find_branch("autopatch-cve-2017-5638", BranchType::Local).unwrap();
    let log4j_tree = log4j.get().peel_to_commit().unwrap().tree().unwrap();
    let struts_tree = struts.get().peel_to_commit().unwrap().tree().unwrap();
    assert!(log4j_tree.get_path(Path::new("libs/log4j-2.17.0.jar")).is_ok());
    assert!(log4j_tree.get_path(Path::new("libs/struts-2.5.1.jar")).is_ok());
    assert!(struts_tree.get_path(Path::new("libs/struts-2.5.33.jar")).is_ok());
    assert!(struts_tree.get_path(Path::new("libs/log4j-2.14.1.jar")).is_ok());

    assert_eq!(repo.head().unwrap().name(), Some(original_head.as_str()));
    assert!(fx.project.join("libs/log4j-2.14.1.jar").exists());
    assert!(fx.project.join("libs/struts-2.5.1.jar").exists());
}
